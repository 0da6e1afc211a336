//! Diagram and tracker options
//!
//! Both option sets are plain data read from RON. Angles are in degrees,
//! distances in kilometers and sizes on the page in points.

use std::path::Path;

use glam::DVec3;
use pv_renderer::LineColor;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// Most moons a diagram or tracker plot accepts
pub const MAX_MOONS: usize = 40;
/// Most rings a diagram accepts
pub const MAX_RINGS: usize = 40;
/// Most time steps a tracker plot accepts
pub const MAX_TRACKER_STEPS: usize = 10_000;
/// Default horizontal caption alignment, points from the left margin
pub const DEFAULT_ALIGN_LOC: f64 = 180.0;
/// Identifier of the Sun
pub const SUN_ID: i32 = 10;

fn yes() -> bool {
    true
}

/// One caption line: a right-aligned label and left-aligned text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Text ending at the alignment column
    pub left: String,
    /// Text starting at the alignment column
    pub right: String,
}

impl Caption {
    /// Caption line from its two halves
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// The central planet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetSpec {
    /// Ephemeris identifier
    pub id: i32,
    /// Display name
    pub name: String,
    /// Measure ring and tracker geometry from the south pole instead of the
    /// north pole (Uranus)
    #[serde(default)]
    pub reverse_pole: bool,
}

impl Default for PlanetSpec {
    fn default() -> Self {
        Self {
            id: 699,
            name: "Saturn".into(),
            reverse_pole: false,
        }
    }
}

/// A moon to draw or track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoonSpec {
    /// Ephemeris identifier
    pub id: i32,
    /// Label
    pub name: String,
    /// Whether the moon is included
    #[serde(default = "yes")]
    pub show: bool,
}

impl MoonSpec {
    /// A shown moon
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            show: true,
        }
    }
}

/// An elliptical ring around the planet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingSpec {
    /// Semi-major axis, km
    pub radius: f64,
    /// Offset along the planet pole, km
    #[serde(default)]
    pub elevation: f64,
    /// Eccentricity
    #[serde(default)]
    pub eccentricity: f64,
    /// Inclination to the planet equator, degrees
    #[serde(default)]
    pub inclination: f64,
    /// Longitude of pericenter, degrees
    #[serde(default)]
    pub periapsis: f64,
    /// Longitude of ascending node, degrees
    #[serde(default)]
    pub node: f64,
    /// Additional offset of the ring center, km
    #[serde(default)]
    pub offset: DVec3,
    /// The ring hides what lies behind it
    #[serde(default)]
    pub opaque: bool,
    /// Draw dashed
    #[serde(default)]
    pub dashed: bool,
    /// Whether the ring is drawn
    #[serde(default = "yes")]
    pub show: bool,
}

impl RingSpec {
    /// Circular equatorial ring of radius `radius`
    pub fn circular(radius: f64) -> Self {
        Self {
            radius,
            elevation: 0.0,
            eccentricity: 0.0,
            inclination: 0.0,
            periapsis: 0.0,
            node: 0.0,
            offset: DVec3::ZERO,
            opaque: false,
            dashed: false,
            show: true,
        }
    }
}

/// A longitude span of a ring drawn as a thick arc
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcSpec {
    /// Index of the ring in [`DiagramOptions::rings`]
    pub ring: usize,
    /// Starting longitude, degrees
    pub min_lon: f64,
    /// Ending longitude, degrees
    pub max_lon: f64,
    /// Whether the arc is drawn
    #[serde(default = "yes")]
    pub show: bool,
}

/// A background star
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSpec {
    /// Right ascension, degrees
    pub ra: f64,
    /// Declination, degrees
    pub dec: f64,
    /// Label
    #[serde(default)]
    pub name: String,
}

/// How rings interact with the bodies they pass in front of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RingMethod {
    /// Rings hide nothing
    #[default]
    Transparent,
    /// Bodies behind the outermost opaque ring are drawn unlit
    SemiTransparent,
    /// Bodies behind the outermost opaque ring are hidden
    Opaque,
}

/// Where the field of view points
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum ViewCenter {
    /// The planet
    #[default]
    Planet,
    /// Another body of the ephemeris
    Body(i32),
    /// A fixed sky position, degrees
    RaDec {
        /// Right ascension
        ra: f64,
        /// Declination
        dec: f64,
    },
}

/// Line colors used by the planetary view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStyles {
    /// Sunlit limbs, grids and rings
    pub lit: LineColor,
    /// Unlit limbs and grids, dark ring sides
    pub dark: LineColor,
    /// Parts of rings inside a shadow
    pub shadow: LineColor,
    /// Box frame and ticks
    pub axis: LineColor,
    /// Star glyphs
    pub star: LineColor,
}

impl Default for LineStyles {
    fn default() -> Self {
        Self {
            lit: LineColor::BLACK,
            dark: LineColor(7),
            shadow: LineColor(10),
            axis: LineColor::BLACK,
            star: LineColor::BLACK,
        }
    }
}

/// Meridian and latitude-circle counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    /// Meridians
    pub meridians: usize,
    /// Latitude circles
    pub latitudes: usize,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            meridians: 12,
            latitudes: 11,
        }
    }
}

/// Everything needed to draw one planetary view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramOptions {
    /// Observation time, parsed by the active time system
    pub time: String,
    /// Full width of the square field of view, degrees
    pub fov: f64,
    /// Field of view center
    pub center: ViewCenter,
    /// Central planet
    pub planet: PlanetSpec,
    /// Identifier of the illuminating star
    pub sun_id: i32,
    /// Draw limbs and terminators only, without grids
    pub blank_disks: bool,
    /// Width in points of the heavy outline drawn under each limb; zero for none
    pub prime_pts: f64,
    /// Planet grid
    pub planet_grid: Grid,
    /// Moon grid
    pub moon_grid: Grid,
    /// Moons
    pub moons: Vec<MoonSpec>,
    /// Moon label size in points; zero for no labels
    pub moon_label_pts: f64,
    /// Smallest apparent moon diameter in points
    pub moon_diam_pts: f64,
    /// Rings, innermost first
    pub rings: Vec<RingSpec>,
    /// How rings hide bodies
    pub ring_method: RingMethod,
    /// Ring arcs
    pub arcs: Vec<ArcSpec>,
    /// Arc line width, points
    pub arc_width: f64,
    /// Stars
    pub stars: Vec<StarSpec>,
    /// Label stars with their names
    pub star_labels: bool,
    /// Star glyph size, points
    pub star_diam_pts: f64,
    /// Title centered above the plot
    pub title: String,
    /// Caption lines below the plot
    pub captions: Vec<Caption>,
    /// Caption alignment column, points
    pub align_loc: f64,
    /// Line colors
    pub lines: LineStyles,
}

impl Default for DiagramOptions {
    fn default() -> Self {
        Self {
            time: "2000-01-01 12:00:00".into(),
            fov: 0.1,
            center: ViewCenter::Planet,
            planet: PlanetSpec::default(),
            sun_id: SUN_ID,
            blank_disks: false,
            prime_pts: 0.0,
            planet_grid: Grid::default(),
            moon_grid: Grid::default(),
            moons: Vec::new(),
            moon_label_pts: 0.0,
            moon_diam_pts: 0.0,
            rings: Vec::new(),
            ring_method: RingMethod::Transparent,
            arcs: Vec::new(),
            arc_width: 4.0,
            stars: Vec::new(),
            star_labels: false,
            star_diam_pts: 24.0,
            title: String::new(),
            captions: Vec::new(),
            align_loc: DEFAULT_ALIGN_LOC,
            lines: LineStyles::default(),
        }
    }
}

impl DiagramOptions {
    /// Reject options the driver cannot honor
    pub fn validate(&self) -> DriverResult<()> {
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(DriverError::Config(format!(
                "field of view must be between 0 and 180 degrees, got {}",
                self.fov
            )));
        }
        if self.moons.len() > MAX_MOONS {
            return Err(DriverError::Config(format!(
                "{} moons requested (maximum {MAX_MOONS})",
                self.moons.len()
            )));
        }
        if self.rings.len() > MAX_RINGS {
            return Err(DriverError::Config(format!(
                "{} rings requested (maximum {MAX_RINGS})",
                self.rings.len()
            )));
        }
        for (i, ring) in self.rings.iter().enumerate() {
            if !(ring.radius >= 0.0 && (0.0..1.0).contains(&ring.eccentricity)) {
                return Err(DriverError::Config(format!(
                    "ring {i} has radius {} and eccentricity {}",
                    ring.radius, ring.eccentricity
                )));
            }
        }
        if let Some(arc) = self.arcs.iter().find(|a| a.ring >= self.rings.len()) {
            return Err(DriverError::Config(format!(
                "arc refers to ring {} but only {} rings are defined",
                arc.ring,
                self.rings.len()
            )));
        }
        Ok(())
    }

    /// Parse options from RON text
    pub fn from_ron_str(text: &str) -> DriverResult<Self> {
        ron::from_str(text).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// Serialize the options as pretty RON
    pub fn to_ron_string(&self) -> DriverResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| DriverError::Config(e.to_string()))
    }

    /// Load an options file
    pub fn load(path: impl AsRef<Path>) -> DriverResult<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| DriverError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the options to a file
    pub fn save(&self, path: impl AsRef<Path>) -> DriverResult<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| DriverError::Io(e.to_string()))
    }
}

/// Unit of a tracker time step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Seconds
    Seconds,
    /// Minutes
    Minutes,
    /// Hours
    #[default]
    Hours,
    /// Days
    Days,
}

/// Tracker time step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Number of units
    pub value: f64,
    /// Unit
    #[serde(default)]
    pub unit: TimeUnit,
}

impl Interval {
    /// Step length in seconds, never below one second
    pub fn seconds(&self) -> f64 {
        let scale = match self.unit {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86_400.0,
        };
        (self.value.abs() * scale).max(1.0)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            value: 1.0,
            unit: TimeUnit::Hours,
        }
    }
}

/// A ring zone drawn as a gray band on the tracker plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRing {
    /// Outer radius, km
    pub radius: f64,
    /// Gray level, 0 black to 1 white
    pub gray: f64,
    /// Whether the band is drawn
    #[serde(default = "yes")]
    pub show: bool,
}

/// Everything needed to draw one moon tracker plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerOptions {
    /// Central planet
    pub planet: PlanetSpec,
    /// Moons to track
    pub moons: Vec<MoonSpec>,
    /// First time, parsed by the active time system
    pub start: String,
    /// Last time
    pub stop: String,
    /// Time step
    pub interval: Interval,
    /// Half-width of the x axis, arcsec or planet radii; `None` to fit the limb
    pub x_range: Option<f64>,
    /// Measure the x axis in planet radii instead of arcsec
    pub x_scaled: bool,
    /// Ring bands, innermost first
    pub rings: Vec<TrackerRing>,
    /// Gray level of the planet band
    pub planet_gray: f64,
    /// Label the time axis with day of year instead of month and day
    pub day_of_year_labels: bool,
    /// Title centered above the plot
    pub title: String,
    /// Caption lines below the plot
    pub captions: Vec<Caption>,
    /// Caption alignment column, points
    pub align_loc: f64,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            planet: PlanetSpec::default(),
            moons: Vec::new(),
            start: "2000-01-01 00:00:00".into(),
            stop: "2000-01-03 00:00:00".into(),
            interval: Interval::default(),
            x_range: None,
            x_scaled: false,
            rings: Vec::new(),
            planet_gray: 0.5,
            day_of_year_labels: false,
            title: String::new(),
            captions: Vec::new(),
            align_loc: DEFAULT_ALIGN_LOC,
        }
    }
}

impl TrackerOptions {
    /// Reject options the driver cannot honor
    pub fn validate(&self) -> DriverResult<()> {
        if self.moons.len() > MAX_MOONS {
            return Err(DriverError::Config(format!(
                "{} moons requested (maximum {MAX_MOONS})",
                self.moons.len()
            )));
        }
        if let Some(x) = self.x_range
            && !(x > 0.0 && x.is_finite())
        {
            return Err(DriverError::Config(format!("x range must be positive, got {x}")));
        }
        Ok(())
    }

    /// Parse options from RON text
    pub fn from_ron_str(text: &str) -> DriverResult<Self> {
        ron::from_str(text).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// Serialize the options as pretty RON
    pub fn to_ron_string(&self) -> DriverResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| DriverError::Config(e.to_string()))
    }

    /// Load an options file
    pub fn load(path: impl AsRef<Path>) -> DriverResult<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| DriverError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the options to a file
    pub fn save(&self, path: impl AsRef<Path>) -> DriverResult<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| DriverError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partial_diagram_options_fill_defaults() {
        let options = DiagramOptions::from_ron_str(
            r#"(
                fov: 0.05,
                moons: [(id: 601, name: "Mimas")],
                rings: [(radius: 136780.0, opaque: true)],
                ring_method: Opaque,
            )"#,
        )
        .expect("partial options parse");
        assert_relative_eq!(options.fov, 0.05);
        assert!(options.moons[0].show, "moons are shown unless hidden");
        assert!(options.rings[0].opaque);
        assert_eq!(options.rings[0].offset, DVec3::ZERO);
        assert_eq!(options.ring_method, RingMethod::Opaque);
        assert_eq!(options.planet_grid, Grid::default());
        assert_eq!(options.lines.dark, LineColor(7));
        options.validate().unwrap();
    }

    #[test]
    fn test_diagram_validation() {
        let mut options = DiagramOptions {
            fov: 0.0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(DriverError::Config(_))));

        options.fov = 1.0;
        options.arcs.push(ArcSpec {
            ring: 0,
            min_lon: 0.0,
            max_lon: 10.0,
            show: true,
        });
        assert!(options.validate().is_err(), "arc without a ring");

        options.rings.push(RingSpec::circular(1000.0));
        options.validate().unwrap();

        options.rings[0].eccentricity = 1.0;
        assert!(options.validate().is_err(), "parabolic ring");

        options.rings = vec![RingSpec::circular(1.0); MAX_RINGS + 1];
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_diagram_options_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.ron");
        let options = DiagramOptions {
            title: "Saturn (ring plane crossing)".into(),
            captions: vec![Caption::new("Ephemeris:", "SAT415")],
            center: ViewCenter::RaDec {
                ra: 10.0,
                dec: -5.0,
            },
            stars: vec![StarSpec {
                ra: 10.0,
                dec: -5.0,
                name: "HD 1".into(),
            }],
            ..Default::default()
        };
        options.save(&path).unwrap();
        assert_eq!(DiagramOptions::load(&path).unwrap(), options);
    }

    #[test]
    fn test_interval_seconds() {
        let i = Interval {
            value: -2.0,
            unit: TimeUnit::Minutes,
        };
        assert_relative_eq!(i.seconds(), 120.0);
        let tiny = Interval {
            value: 0.0,
            unit: TimeUnit::Days,
        };
        assert_relative_eq!(tiny.seconds(), 1.0);
    }

    #[test]
    fn test_tracker_options_round_trip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.ron");
        let options = TrackerOptions {
            moons: vec![MoonSpec::new(606, "Titan")],
            rings: vec![TrackerRing {
                radius: 136780.0,
                gray: 0.75,
                show: true,
            }],
            x_range: Some(200.0),
            ..Default::default()
        };
        options.save(&path).unwrap();
        let loaded = TrackerOptions::load(&path).unwrap();
        assert_eq!(loaded, options);
        loaded.validate().unwrap();

        let bad = TrackerOptions {
            x_range: Some(-1.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
