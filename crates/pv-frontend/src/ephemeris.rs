//! Ephemeris service
//!
//! Body positions, orientations and shapes come from an [`Ephemeris`]. All
//! vectors are in one inertial frame (J2000 equatorial in practice), in
//! kilometers and kilometers per second, at epochs given in seconds on the
//! scale of the active [`TimeSystem`](crate::time::TimeSystem).
//!
//! [`StaticEphemeris`] is a small table of bodies moving in straight lines,
//! loaded from RON. It is enough for tests and for diagrams over short
//! spans; anything better plugs in through the trait.

use std::path::Path;

use glam::{DMat3, DVec3};
use pv_core::math::{radrec, rotate_about, vhat};
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};
use crate::time::SECONDS_PER_DAY;

/// Speed of light in km/s
pub const SPEED_OF_LIGHT: f64 = 299_792.458;

/// Light-time iterations used by the default apparent-state lookup
const LIGHT_TIME_ITERATIONS: usize = 3;

/// Position and velocity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateVector {
    /// km
    pub position: DVec3,
    /// km/s
    pub velocity: DVec3,
}

/// Aberration correction applied to apparent states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Correction {
    /// Where the body is at the observation epoch
    #[default]
    Geometric,
    /// Where the body was when the light seen at the observation epoch left it
    LightTime,
}

/// Source of body states, orientations and shapes
pub trait Ephemeris {
    /// State of the observer at `time`
    fn observer_state(&self, time: f64) -> DriverResult<StateVector>;

    /// Geometric state of `body` at `time`
    fn state(&self, body: i32, time: f64) -> DriverResult<StateVector>;

    /// Body-fixed axes of `body` at `time` as matrix columns, or `None` when
    /// the body has no rotation model
    fn rotation(&self, body: i32, time: f64) -> DriverResult<Option<DMat3>>;

    /// Triaxial radii of `body`
    fn radii(&self, body: i32) -> DriverResult<DVec3>;

    /// State of `body` relative to `observer` as seen at `time`, and the
    /// one-way light time in seconds.
    fn apparent(
        &self,
        body: i32,
        time: f64,
        observer: &StateVector,
        correction: Correction,
    ) -> DriverResult<(StateVector, f64)> {
        let mut target = self.state(body, time)?;
        if correction == Correction::LightTime {
            for _ in 0..LIGHT_TIME_ITERATIONS {
                let lt = (target.position - observer.position).length() / SPEED_OF_LIGHT;
                target = self.state(body, time - lt)?;
            }
        }
        let relative = StateVector {
            position: target.position - observer.position,
            velocity: target.velocity - observer.velocity,
        };
        Ok((relative, relative.position.length() / SPEED_OF_LIGHT))
    }
}

/// Orientation model: pole direction plus a uniformly rotating prime meridian
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoleModel {
    /// Right ascension of the north pole, degrees
    pub ra: f64,
    /// Declination of the north pole, degrees
    pub dec: f64,
    /// Prime meridian angle at the table epoch, degrees
    #[serde(default)]
    pub w0: f64,
    /// Prime meridian rate, degrees per day
    #[serde(default)]
    pub w_rate: f64,
}

impl PoleModel {
    fn axes(&self, days: f64) -> DMat3 {
        let z = radrec(1.0, self.ra.to_radians(), self.dec.to_radians());
        let cross = DVec3::Z.cross(z);
        let node = if cross.length() < 1.0e-12 {
            DVec3::X
        } else {
            vhat(cross)
        };
        let w = (self.w0 + self.w_rate * days).to_radians();
        let x = rotate_about(node, z, w);
        DMat3::from_cols(x, z.cross(x), z)
    }
}

/// One body of a [`StaticEphemeris`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    /// Numeric identifier
    pub id: i32,
    /// Display name
    pub name: String,
    /// Position at the table epoch
    pub position: DVec3,
    /// Constant velocity
    #[serde(default)]
    pub velocity: DVec3,
    /// Triaxial radii
    pub radii: DVec3,
    /// Orientation, if known
    #[serde(default)]
    pub pole: Option<PoleModel>,
}

/// Bodies in uniform straight-line motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticEphemeris {
    /// Epoch of the tabulated positions
    #[serde(default)]
    pub epoch: f64,
    /// Body the diagrams are seen from
    pub observer: i32,
    /// Body table
    pub bodies: Vec<BodyRecord>,
}

impl StaticEphemeris {
    /// Empty table observed from `observer`
    pub fn new(observer: i32, epoch: f64) -> Self {
        Self {
            epoch,
            observer,
            bodies: Vec::new(),
        }
    }

    /// Add a body
    pub fn with_body(mut self, body: BodyRecord) -> Self {
        self.bodies.push(body);
        self
    }

    /// Look up a body record
    pub fn body(&self, id: i32) -> DriverResult<&BodyRecord> {
        self.bodies
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| DriverError::Ephemeris(format!("body {id} is not in the ephemeris")))
    }

    /// Display name of a body
    pub fn name(&self, id: i32) -> Option<&str> {
        self.body(id).ok().map(|b| b.name.as_str())
    }

    /// Reject tables with unusable entries
    pub fn validate(&self) -> DriverResult<()> {
        self.body(self.observer)?;
        for b in &self.bodies {
            let finite = b.position.is_finite() && b.velocity.is_finite();
            if !finite {
                return Err(DriverError::Ephemeris(format!(
                    "body {} ({}) has a non-finite state",
                    b.id, b.name
                )));
            }
            if !(b.radii.is_finite() && b.radii.min_element() > 0.0) {
                return Err(DriverError::Ephemeris(format!(
                    "body {} ({}) has invalid radii {:?}",
                    b.id, b.name, b.radii
                )));
            }
        }
        Ok(())
    }

    /// Parse a table from RON text
    pub fn from_ron_str(text: &str) -> DriverResult<Self> {
        let table: Self = ron::from_str(text).map_err(|e| DriverError::Config(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    /// Serialize the table as pretty RON
    pub fn to_ron_string(&self) -> DriverResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| DriverError::Config(e.to_string()))
    }

    /// Load a table file
    pub fn load(path: impl AsRef<Path>) -> DriverResult<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| DriverError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the table to a file
    pub fn save(&self, path: impl AsRef<Path>) -> DriverResult<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| DriverError::Io(e.to_string()))
    }
}

impl Ephemeris for StaticEphemeris {
    fn observer_state(&self, time: f64) -> DriverResult<StateVector> {
        self.state(self.observer, time)
    }

    fn state(&self, body: i32, time: f64) -> DriverResult<StateVector> {
        let b = self.body(body)?;
        Ok(StateVector {
            position: b.position + b.velocity * (time - self.epoch),
            velocity: b.velocity,
        })
    }

    fn rotation(&self, body: i32, time: f64) -> DriverResult<Option<DMat3>> {
        let days = (time - self.epoch) / SECONDS_PER_DAY;
        Ok(self.body(body)?.pole.map(|p| p.axes(days)))
    }

    fn radii(&self, body: i32) -> DriverResult<DVec3> {
        Ok(self.body(body)?.radii)
    }
}
