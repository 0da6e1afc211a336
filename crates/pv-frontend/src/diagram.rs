//! Planetary view diagram
//!
//! Draws the planet, its moons and rings as seen by the observer at one
//! instant, inside a square field of view with right ascension and
//! declination ticks around the frame.
//!
//! Layout follows the camera convention of the renderer: the optic axis
//! points at the view center, declination increases up the page and right
//! ascension increases to the left.
//!
//! Body 0 of every scene is the planet and body 1 is a one-kilometer dummy
//! on the optic axis far behind it. Moons follow in option order. The
//! planet and the dummy are never labeled.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::io::Write;
use std::ops::Range;

use glam::{DMat3, DVec3};
use pv_core::Axes;
use pv_core::math::{
    camera_frame, opposite_signs, radrec, recrad, rotate_about, round_half_away, to_frame, vhat,
};
use pv_renderer::{
    BodyDrawable, Device, DocumentInfo, DrawSink, Ellipsoid, FovWindow, LineColor,
    OverlayDrawable, PostScriptSink, RendererConfig, RingDrawable, Scene, SceneBuilder, Shading,
    StarDrawable, ViewGeometry,
};

use crate::ephemeris::{Correction, Ephemeris, StateVector};
use crate::error::{DriverError, DriverResult};
use crate::options::{ArcSpec, DiagramOptions, Grid, RingMethod, RingSpec, ViewCenter};
use crate::preamble::{ps_string, view_headings, view_prolog};
use crate::time::{TimeSystem, generated_stamp};

/// Width of the plotted field of view, points
pub const FOV_PTS: f64 = 504.0;
/// Thickness given to an opaque ring when it stands in as a body, km
const RING_THICKNESS: f64 = 1.0;
/// Radial width of each arc loop, km
const LOOP_WIDTH: f64 = 1.0;
/// Longitude step between arc loops, radians
const LOOP_STEP: f64 = 0.01;
/// Most arc loops per diagram
const MAX_LOOPS: usize = 80;
/// Cap on the minimum moon diameter, points
const MAX_MIN_DIAM: f64 = 10.0;
/// Cap on the arc line width, points
const MAX_ARC_PTS: f64 = 10.0;
/// Star glyph line width, points
const STAR_WIDTH: f64 = 1.5;
/// Fewest ticks wanted across an axis
const MIN_TICKS: f64 = 3.0;
/// Major and minor tick lengths as fractions of the half field
const MAJOR_TICK: f64 = 0.05;
const MINOR_TICK: f64 = 0.02;
/// Label offset toward the lower right, in units of the body radius
const LABEL_OFFSET: f64 = 0.7070;
/// Seconds in a day (and in 24 hours of right ascension)
const MAX_SECS: f64 = 86_400.0;

/// Candidate major tick spacings in seconds of arc or time. Kept in single
/// precision so tick positions match the published plots.
const TICK_STEPS: [f32; 25] = [
    0.0, 0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0,
    120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0, 18000.0, 36000.0, 72000.0,
];
/// Minor ticks per major tick for each entry of [`TICK_STEPS`]
const TICK_SUBSTEPS: [i64; 25] = [
    0, 5, 4, 5, 5, 4, 5, 5, 4, 5, 5, 4, 5, 5, 6, 6, 4, 5, 5, 6, 6, 4, 5, 5, 6,
];

/// A ring resolved into the inertial frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingGeometry {
    /// Ellipse center
    pub center: DVec3,
    /// Semi-major axis vector, toward pericenter
    pub major: DVec3,
    /// Semi-minor axis vector
    pub minor: DVec3,
    /// Ring pole scaled to the stand-in thickness
    pub thickness: DVec3,
    /// The observer sees the unlit face
    pub dark: bool,
}

impl RingGeometry {
    /// The ring as a flat body that can hide what lies behind it
    pub fn as_body(&self) -> Ellipsoid {
        Ellipsoid {
            center: self.center,
            axes: Axes([self.major, self.minor, self.thickness]),
        }
    }
}

/// Planet-centered reference directions shared by every ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingFrame {
    /// Planet center as seen by the observer
    pub planet: DVec3,
    /// Unit pole of the planet's equator
    pub pole: DVec3,
    /// Observer position
    pub observer: DVec3,
    /// Planet motion during the light time, added when testing which face
    /// the observer sees
    pub drift: DVec3,
    /// Unit vector from the planet toward the sun
    pub sun_direction: DVec3,
    /// Angular radius of the sun seen from the planet
    pub sun_angular_radius: f64,
}

impl RingFrame {
    /// Ascending node of the equator on the inertial xy plane
    fn ascending_node(&self) -> DVec3 {
        let node = DVec3::Z.cross(self.pole);
        if node.length() < 1.0e-12 {
            DVec3::X
        } else {
            node
        }
    }

    /// Resolve a ring.
    pub fn ring(&self, spec: &RingSpec) -> RingGeometry {
        let node = spec.node.to_radians();
        let ring_node = rotate_about(self.ascending_node(), self.pole, node);
        let ring_pole = vhat(rotate_about(self.pole, ring_node, spec.inclination.to_radians()));
        let peri = vhat(rotate_about(
            ring_node,
            ring_pole,
            spec.periapsis.to_radians() - node,
        ));
        let e = spec.eccentricity;
        let major = peri * spec.radius;
        let minor = rotate_about(peri, ring_pole, FRAC_PI_2) * (spec.radius * (1.0 - e * e).sqrt());
        let center = self.planet - major * e + self.pole * spec.elevation + spec.offset;

        let observer_side = -ring_pole.dot(center - self.observer + self.drift);
        let sun_side = ring_pole.dot(self.sun_direction);
        let dark = !spec.dashed
            && opposite_signs(observer_side, sun_side)
            && sun_side.abs() > self.sun_angular_radius;

        RingGeometry {
            center,
            major,
            minor,
            thickness: ring_pole * RING_THICKNESS,
            dark,
        }
    }
}

/// One short ellipse of the series that draws a ring arc
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcLoop {
    /// Index of the ring the arc lies on
    pub ring: usize,
    /// Loop center
    pub center: DVec3,
    /// Half chord along the ring
    pub major: DVec3,
    /// Radial half width
    pub minor: DVec3,
}

/// Break an arc into loops, at most `room` of them.
///
/// Longitudes are measured from the ring's ascending node like the
/// pericenter, so the walk starts at mean anomaly `min_lon - periapsis`.
pub fn arc_loops(
    arc: &ArcSpec,
    spec: &RingSpec,
    ring: &RingGeometry,
    room: usize,
) -> Vec<ArcLoop> {
    let peri = spec.periapsis.to_radians();
    let lon1 = arc.min_lon.to_radians() - peri;
    let mut lon2 = arc.max_lon.to_radians() - peri;
    if lon2 < lon1 {
        lon2 += TAU;
    }
    let steps = (((lon2 - lon1) / LOOP_STEP) as usize).max(1);
    let dlon = (lon2 - lon1) / steps as f64;

    (0..steps.min(room))
        .map(|i| {
            let lon = lon1 + i as f64 * dlon;
            let v1 = ring.major * lon.cos() + ring.minor * lon.sin();
            let v2 = ring.major * (lon + dlon).cos() + ring.minor * (lon + dlon).sin();
            let mid = (v1 + v2) * 0.5;
            ArcLoop {
                ring: arc.ring,
                center: mid + ring.center,
                major: v1 - mid,
                minor: vhat(mid) * LOOP_WIDTH,
            }
        })
        .collect()
}

/// Axis a tick label belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAxis {
    /// Bottom and top edges, hours of right ascension
    RightAscension,
    /// Left and right edges, degrees of declination
    Declination,
}

/// Text of a tick label for `secs` seconds of time or arc, as
/// `h mm ss[.fff]` with trailing zeros of the fraction dropped.
pub fn sky_label(secs: f64, axis: TickAxis) -> String {
    let value = match axis {
        TickAxis::RightAscension => secs.rem_euclid(MAX_SECS),
        TickAxis::Declination => secs,
    };
    let bias = match axis {
        TickAxis::RightAscension => 1.0e-9,
        TickAxis::Declination => 0.0,
    };
    let total_ms = round_half_away(value.abs() * 1000.0 + bias) as i64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let sec = total_sec % 60;
    let min = (total_sec / 60) % 60;
    let deg = total_sec / 3600;

    let text = if ms == 0 {
        format!("{deg} {min:02} {sec:02}")
    } else {
        format!("{deg} {min:02} {sec:02}.{ms:03}")
            .trim_end_matches(['0', ' '])
            .trim_end_matches('.')
            .to_string()
    };
    if value < 0.0 { format!("-{text}") } else { text }
}

/// Index into [`TICK_STEPS`] of the largest spacing giving at least
/// [`MIN_TICKS`] ticks across `2 * half_width`.
fn tick_step_index(half_width: f64) -> usize {
    (2..TICK_STEPS.len())
        .rev()
        .find(|&i| 2.0 * half_width >= MIN_TICKS * f64::from(TICK_STEPS[i]))
        .unwrap_or(1)
}

/// A body placed in the diagram
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBody {
    /// Shape and position
    pub ellipsoid: Ellipsoid,
    /// Label, blank for none
    pub label: String,
    /// Line of sight from the observer
    pub line_of_sight: DVec3,
    /// Apparent diameter, points
    pub diam_pts: f64,
    /// Distance from the planet center, km
    pub planet_distance: f64,
}

/// Geometry of one diagram, independent of how it is drawn
#[derive(Debug, Clone, PartialEq)]
pub struct ViewPlan {
    /// Field of view, radians
    pub fov: f64,
    /// Half width of the image plane window
    pub delta: f64,
    /// Camera axes as columns
    pub camera: DMat3,
    /// Observer position
    pub observer: DVec3,
    /// Sun position and radius
    pub sun: (DVec3, f64),
    /// Planet, dummy and moons
    pub bodies: Vec<PlacedBody>,
    /// Rings in option order; `None` for hidden rings
    pub rings: Vec<Option<RingGeometry>>,
    /// Arc loops, grouped by ring
    pub loops: Vec<ArcLoop>,
    /// Outermost shown opaque ring
    pub last_opaque: Option<usize>,
}

impl ViewPlan {
    /// Look up every body and resolve the rings for `options` at `time`.
    pub fn new(options: &DiagramOptions, ephemeris: &dyn Ephemeris, time: f64) -> DriverResult<Self> {
        options.validate()?;
        let fov = options.fov.to_radians();
        let delta = (fov / 2.0).tan();
        let planet_id = options.planet.id;

        let observer = ephemeris.observer_state(time)?;
        let (planet_rel, planet_lt) =
            ephemeris.apparent(planet_id, time, &observer, Correction::LightTime)?;
        let planet_time = time - planet_lt;
        let planet_state = ephemeris.state(planet_id, planet_time)?;
        let planet_rot = ephemeris.rotation(planet_id, planet_time)?.ok_or_else(|| {
            DriverError::Ephemeris(format!(
                "{} ({planet_id}) has no rotation model",
                options.planet.name
            ))
        })?;
        let planet_radii = ephemeris.radii(planet_id)?;

        let (sun_rel, _) =
            ephemeris.apparent(options.sun_id, planet_time, &planet_state, Correction::LightTime)?;
        let sun_loc = planet_state.position + sun_rel.position;
        let sun_radius = ephemeris.radii(options.sun_id)?.x;

        let center_dir = match options.center {
            ViewCenter::Planet => planet_rel.position,
            ViewCenter::Body(id) => {
                ephemeris
                    .apparent(id, time, &observer, Correction::LightTime)?
                    .0
                    .position
            }
            ViewCenter::RaDec { ra, dec } => radrec(1.0, ra.to_radians(), dec.to_radians()),
        };
        let (_, center_ra, center_dec) = recrad(center_dir);
        let camera = camera_frame(center_ra, center_dec);

        let planet_loc = observer.position + planet_rel.position;
        let mut bodies = vec![
            PlacedBody {
                ellipsoid: Ellipsoid {
                    center: planet_loc,
                    axes: Axes::from_frame(&planet_rot, planet_radii),
                },
                label: String::new(),
                line_of_sight: DVec3::ZERO,
                diam_pts: 0.0,
                planet_distance: 0.0,
            },
            PlacedBody {
                ellipsoid: Ellipsoid {
                    center: observer.position
                        + camera.z_axis * (2.0 * planet_rel.position.length()),
                    axes: Axes::from_frame(&planet_rot, DVec3::ONE),
                },
                label: String::new(),
                line_of_sight: DVec3::ZERO,
                diam_pts: 0.0,
                planet_distance: 0.0,
            },
        ];
        for moon in options.moons.iter().filter(|m| m.show) {
            match place_moon(ephemeris, moon.id, &moon.name, time, &observer, &planet_rot, fov) {
                Ok(mut body) => {
                    body.planet_distance = (body.ellipsoid.center - planet_loc).length();
                    bodies.push(body);
                }
                Err(e) => tracing::warn!("Skipping moon {} ({}): {}", moon.name, moon.id, e),
            }
        }

        let mut pole = vhat(planet_rot.z_axis);
        if options.planet.reverse_pole {
            pole = -pole;
        }
        let sun_distance = sun_rel.position.length();
        let frame = RingFrame {
            planet: planet_loc,
            pole,
            observer: observer.position,
            drift: planet_state.velocity * planet_lt,
            sun_direction: vhat(sun_rel.position),
            sun_angular_radius: if sun_distance > 0.0 {
                sun_radius / sun_distance
            } else {
                0.0
            },
        };

        let mut rings = Vec::with_capacity(options.rings.len());
        let mut loops = Vec::new();
        let mut last_opaque = None;
        for (i, spec) in options.rings.iter().enumerate() {
            if !spec.show {
                rings.push(None);
                continue;
            }
            if spec.opaque {
                last_opaque = Some(i);
            }
            let ring = frame.ring(spec);
            for arc in options.arcs.iter().filter(|a| a.show && a.ring == i) {
                let room = MAX_LOOPS - loops.len();
                loops.extend(arc_loops(arc, spec, &ring, room));
            }
            rings.push(Some(ring));
        }
        if loops.len() == MAX_LOOPS {
            tracing::debug!("Arc loops capped at {}", MAX_LOOPS);
        }

        tracing::info!(
            "Planned view of {}: {} bodies, {} rings, {} arc loops",
            options.planet.name,
            bodies.len(),
            rings.iter().flatten().count(),
            loops.len()
        );

        Ok(Self {
            fov,
            delta,
            camera,
            observer: observer.position,
            sun: (sun_loc, sun_radius),
            bodies,
            rings,
            loops,
            last_opaque,
        })
    }

    fn scene(&self, extra: Option<Ellipsoid>) -> DriverResult<Scene> {
        let scene = SceneBuilder::new(self.observer, self.camera)
            .light(self.sun.0, self.sun.1)
            .bodies(self.bodies.iter().map(|b| b.ellipsoid))
            .bodies(extra)
            .build(&ViewGeometry::new(FovWindow::square(self.delta))?)?;
        Ok(scene)
    }
}

fn place_moon(
    ephemeris: &dyn Ephemeris,
    id: i32,
    name: &str,
    time: f64,
    observer: &StateVector,
    planet_rot: &DMat3,
    fov: f64,
) -> DriverResult<PlacedBody> {
    let (rel, lt) = ephemeris.apparent(id, time, observer, Correction::LightTime)?;
    let rot = ephemeris.rotation(id, time - lt)?.unwrap_or(*planet_rot);
    let radii = ephemeris.radii(id)?;
    let distance = rel.position.length();
    Ok(PlacedBody {
        ellipsoid: Ellipsoid {
            center: observer.position + rel.position,
            axes: Axes::from_frame(&rot, radii),
        },
        label: name.to_string(),
        line_of_sight: rel.position,
        diam_pts: 2.0 * radii.x * FOV_PTS / (distance * fov),
        planet_distance: 0.0,
    })
}

/// Line colors of one body pass, for moons outside and inside the
/// occluding ring
#[derive(Debug, Clone, Copy)]
struct BodyPass {
    inner_limit: f64,
    outer: Shading,
    inner: Shading,
    update_labels: bool,
}

fn drawn(shading: &Shading) -> bool {
    shading.lit.is_drawn() || shading.dark.is_drawn() || shading.terminator.is_drawn()
}

fn uniform(color: LineColor) -> Shading {
    Shading {
        lit: color,
        dark: color,
        terminator: color,
    }
}

/// Draws one diagram into a device
struct ViewPainter<'a, S: DrawSink> {
    device: Device<S>,
    plan: &'a ViewPlan,
    options: &'a DiagramOptions,
    labels: Vec<String>,
    planet_grid: Grid,
    moon_grid: Grid,
    normal: Shading,
    min_diam: f64,
}

impl<'a, S: DrawSink> ViewPainter<'a, S> {
    fn new(device: Device<S>, plan: &'a ViewPlan, options: &'a DiagramOptions) -> Self {
        let lines = options.lines;
        let (planet_grid, moon_grid, terminator) = if options.blank_disks {
            let none = Grid {
                meridians: 0,
                latitudes: 0,
            };
            (none, none, lines.lit)
        } else {
            (options.planet_grid, options.moon_grid, lines.dark)
        };
        Self {
            device,
            plan,
            options,
            labels: plan.bodies.iter().map(|b| b.label.clone()).collect(),
            planet_grid,
            moon_grid,
            normal: Shading {
                lit: lines.lit,
                dark: lines.dark,
                terminator,
            },
            min_diam: options.moon_diam_pts.min(MAX_MIN_DIAM),
        }
    }

    fn comment(&mut self, text: &str) -> DriverResult<()> {
        self.device.write_text(text)?;
        Ok(())
    }

    fn draw_bodies(&mut self, scene: &Scene, pass: BodyPass) -> DriverResult<()> {
        let plan = self.plan;
        let prime = self.options.prime_pts;
        let planet_visible = drawn(&pass.outer);
        if planet_visible {
            self.comment("%Draw planet...")?;
        }
        if planet_visible && prime > 0.0 {
            self.device.set_line_width(prime)?;
            BodyDrawable::new(0)
                .with_grid(1, 0)
                .with_shading(Shading {
                    terminator: LineColor::WHITE,
                    ..pass.outer
                })
                .render(scene, &mut self.device)?;
            BodyDrawable::new(0)
                .with_shading(uniform(LineColor::WHITE))
                .render(scene, &mut self.device)?;
        }
        self.device.set_line_width(0.0)?;
        BodyDrawable::new(0)
            .with_grid(self.planet_grid.meridians, self.planet_grid.latitudes)
            .with_shading(pass.outer)
            .render(scene, &mut self.device)?;
        BodyDrawable::new(1)
            .with_grid(2, 1)
            .with_shading(uniform(LineColor::WHITE))
            .render(scene, &mut self.device)?;

        for (index, body) in plan.bodies.iter().enumerate().skip(2) {
            let shading = if body.planet_distance < pass.inner_limit {
                pass.inner
            } else {
                pass.outer
            };
            let visible = drawn(&shading);
            let name = self.labels[index].trim().to_string();
            if visible && !name.is_empty() {
                self.comment(&format!("%Draw {name}..."))?;
            }
            if visible && prime > 0.0 && self.min_diam == 0.0 && body.diam_pts > 0.0 {
                self.device.set_line_width(prime)?;
                BodyDrawable::new(index)
                    .with_grid(1, 0)
                    .with_shading(Shading {
                        terminator: LineColor::WHITE,
                        ..shading
                    })
                    .render(scene, &mut self.device)?;
                BodyDrawable::new(index)
                    .with_shading(uniform(LineColor::WHITE))
                    .render(scene, &mut self.device)?;
            }
            self.device.reset_drawn();
            self.device.set_line_width(self.min_diam - body.diam_pts)?;
            BodyDrawable::new(index)
                .with_grid(self.moon_grid.meridians, self.moon_grid.latitudes)
                .with_shading(shading)
                .render(scene, &mut self.device)?;
            if pass.update_labels && visible && !self.device.has_drawn() {
                tracing::debug!("Moon {} not visible; dropping its label", name);
                self.labels[index].clear();
            }
        }
        self.device.set_line_width(0.0)?;
        Ok(())
    }

    fn draw_rings(&mut self, scene: &Scene, range: Range<usize>) -> DriverResult<()> {
        let plan = self.plan;
        let lines = self.options.lines;
        for i in range.clone() {
            let Some(ring) = plan.rings.get(i).copied().flatten() else {
                continue;
            };
            let dashed = self.options.rings[i].dashed;
            self.comment(&format!("%Draw ring #{:2}...", i + 1))?;
            if dashed {
                self.comment("[30 30] 0 setdash")?;
            }
            RingDrawable::new(ring.center, ring.major, ring.minor)
                .with_colors(if ring.dark { lines.dark } else { lines.lit }, lines.shadow)
                .render(scene, &mut self.device)?;
            if dashed {
                self.comment("[] 0 setdash")?;
            }
        }

        if !plan.loops.is_empty() {
            self.comment("%Draw arcs...")?;
        }
        self.device
            .set_line_width(self.options.arc_width.min(MAX_ARC_PTS))?;
        for arc in plan.loops.iter().filter(|l| range.contains(&l.ring)) {
            let dark = plan.rings[arc.ring].is_some_and(|r| r.dark);
            RingDrawable::new(arc.center, arc.major, arc.minor)
                .with_colors(if dark { lines.dark } else { lines.lit }, lines.shadow)
                .render(scene, &mut self.device)?;
        }
        self.device.set_line_width(0.0)?;
        Ok(())
    }

    /// Bodies and rings, ordered by the ring display method
    fn draw_system(&mut self) -> DriverResult<()> {
        let plan = self.plan;
        let all = 0..plan.rings.len();
        let normal = self.normal;
        let hidden = uniform(LineColor::NONE);

        let opaque = match (self.options.ring_method, plan.last_opaque) {
            (RingMethod::Transparent, _) | (_, None) => None,
            (method, Some(i)) => plan.rings[i].map(|ring| (method, i, ring)),
        };
        let Some((method, last, ring)) = opaque else {
            let scene = plan.scene(None)?;
            self.draw_bodies(
                &scene,
                BodyPass {
                    inner_limit: 0.0,
                    outer: normal,
                    inner: normal,
                    update_labels: true,
                },
            )?;
            return self.draw_rings(&scene, all);
        };

        let limit = self.options.rings[last].radius;
        let open = plan.scene(None)?;
        let blocked = plan.scene(Some(ring.as_body()))?;
        let exterior = last + 1..plan.rings.len();
        let interior = 0..last + 1;

        match method {
            RingMethod::SemiTransparent => {
                // Everything outside the ring first goes down unlit; the
                // second pass relights what the ring does not cover.
                self.draw_bodies(
                    &open,
                    BodyPass {
                        inner_limit: limit,
                        outer: uniform(self.options.lines.dark),
                        inner: normal,
                        update_labels: true,
                    },
                )?;
                self.draw_bodies(
                    &blocked,
                    BodyPass {
                        inner_limit: limit,
                        outer: normal,
                        inner: hidden,
                        update_labels: false,
                    },
                )?;
                self.draw_rings(&blocked, exterior)?;
                self.draw_rings(&open, interior)
            }
            _ => {
                self.draw_bodies(
                    &blocked,
                    BodyPass {
                        inner_limit: limit,
                        outer: normal,
                        inner: hidden,
                        update_labels: true,
                    },
                )?;
                self.draw_rings(&blocked, exterior)?;
                self.draw_bodies(
                    &open,
                    BodyPass {
                        inner_limit: limit,
                        outer: hidden,
                        inner: normal,
                        update_labels: true,
                    },
                )?;
                self.draw_rings(&open, interior)
            }
        }
    }

    /// Write `text` at the lower right of the line of sight `los`, offset
    /// by `radius` image-plane units
    fn annotate(&mut self, text: &str, los: DVec3, radius: f64) -> DriverResult<()> {
        let cam = to_frame(&self.plan.camera, los);
        if cam.z <= 0.0 {
            return Ok(());
        }
        let x = -cam.x / cam.z + LABEL_OFFSET * radius;
        let y = -cam.y / cam.z - LABEL_OFFSET * radius;
        let delta = self.plan.delta;
        if x.abs() < delta && y.abs() < delta {
            OverlayDrawable::new(vec![[[x, y], [x, y]]], self.options.lines.axis)
                .render(&mut self.device)?;
            self.device.move_to_last_point()?;
            self.comment(&format!("{} LabelBody", ps_string(text)))?;
        }
        Ok(())
    }

    fn tick(&mut self, from: [f64; 2], to: [f64; 2]) -> DriverResult<()> {
        OverlayDrawable::new(vec![[from, to]], self.options.lines.axis).render(&mut self.device)?;
        Ok(())
    }

    fn tick_label(&mut self, secs: f64, axis: TickAxis) -> DriverResult<()> {
        let macro_name = match axis {
            TickAxis::RightAscension => "LabelBelow",
            TickAxis::Declination => "LabelLeft",
        };
        self.device.move_to_last_point()?;
        self.comment(&format!("{} {macro_name}", ps_string(&sky_label(secs, axis))))
    }

    /// Right ascension ticks along the bottom and top, declination ticks
    /// along the left and right, labeled at major ticks
    fn draw_sky_ticks(&mut self) -> DriverResult<()> {
        let delta = self.plan.delta;
        let (_, ra, dec) = recrad(self.plan.camera.z_axis);
        let major = MAJOR_TICK * delta;
        let minor = MINOR_TICK * delta;

        for axis in [TickAxis::RightAscension, TickAxis::Declination] {
            let (secs_per_rad, half_width, center) = match axis {
                TickAxis::RightAscension => {
                    let spr = 180.0 / std::f64::consts::PI * 3600.0 / 15.0;
                    let half = if dec.cos().abs() > 1.0e-12 {
                        delta / dec.cos()
                    } else {
                        delta
                    };
                    (spr, half * spr, ra * spr)
                }
                TickAxis::Declination => {
                    let spr = 180.0 / std::f64::consts::PI * 3600.0;
                    (spr, delta * spr, dec * spr)
                }
            };
            let i = tick_step_index(half_width);
            let substeps = TICK_SUBSTEPS[i];
            let step = f64::from(TICK_STEPS[i]) / substeps as f64;
            let k1 = round_half_away((center - half_width) / step + 0.5) as i64;
            let k2 = round_half_away((center + half_width) / step - 0.5) as i64;

            for k in k1..=k2 {
                let secs = k as f64 * step;
                let is_major = k.rem_euclid(substeps) == 0;
                let len = if is_major { major } else { minor };
                let los = match axis {
                    TickAxis::RightAscension => radrec(1.0, secs / secs_per_rad, dec),
                    TickAxis::Declination => radrec(1.0, ra, secs / secs_per_rad),
                };
                let cam = to_frame(&self.plan.camera, los);
                if cam.z <= 1.0e-12 {
                    continue;
                }
                match axis {
                    TickAxis::RightAscension => {
                        let x = -cam.x / cam.z;
                        if x.abs() <= delta {
                            self.tick([x, delta - len], [x, delta])?;
                            if is_major {
                                self.tick_label(secs, axis)?;
                            }
                            self.tick([x, -delta + len], [x, -delta])?;
                        }
                    }
                    TickAxis::Declination => {
                        let y = -cam.y / cam.z;
                        if y.abs() <= delta {
                            self.tick([-delta + len, y], [-delta, y])?;
                            if is_major {
                                self.tick_label(secs, axis)?;
                            }
                            self.tick([delta - len, y], [delta, y])?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Frame, sky ticks, moon labels and stars
    fn draw_frame_and_stars(&mut self) -> DriverResult<()> {
        let plan = self.plan;
        let options = self.options;
        let delta = plan.delta;
        self.comment("%Draw box...")?;
        let corners = [
            [-delta, -delta],
            [-delta, delta],
            [delta, delta],
            [delta, -delta],
        ];
        let edges = (0..4).map(|i| [corners[i], corners[(i + 1) % 4]]).collect();
        OverlayDrawable::new(edges, self.options.lines.axis).render(&mut self.device)?;

        self.draw_sky_ticks()?;

        if options.moon_label_pts > 0.0 {
            self.comment("%Label moons...")?;
            for (index, body) in plan.bodies.iter().enumerate().skip(2) {
                let name = self.labels[index].trim().to_string();
                if name.is_empty() {
                    continue;
                }
                let radius = body.diam_pts.max(self.min_diam) * 0.5 * plan.fov / FOV_PTS;
                self.annotate(&name, body.line_of_sight, radius)?;
            }
        }

        let stars = &options.stars;
        if !stars.is_empty() {
            self.comment("%Draw stars...")?;
            self.device.set_line_width(STAR_WIDTH)?;
        }
        let scale = options.star_diam_pts * delta / FOV_PTS;
        let open = plan.scene(None)?;
        for star in stars {
            let los = radrec(1.0, star.ra.to_radians(), star.dec.to_radians());
            let mut glyph = StarDrawable::new(los, scale);
            glyph.color = options.lines.star;
            glyph.render(&open, &mut self.device)?;
            let name = star.name.trim();
            if options.star_labels && !name.is_empty() {
                self.annotate(name, los, 0.0)?;
            }
        }
        if !stars.is_empty() {
            self.device.set_line_width(0.0)?;
        }
        Ok(())
    }
}

/// Draw a planetary view into `out` and return the writer.
///
/// `name` is the output file name recorded in the document header.
pub fn draw_planetary_view<W: Write>(
    out: W,
    name: &str,
    options: &DiagramOptions,
    ephemeris: &dyn Ephemeris,
    time: &dyn TimeSystem,
) -> DriverResult<W> {
    let epoch = time.parse(&options.time)?;
    let plan = ViewPlan::new(options, ephemeris, epoch)?;

    let planet = options.planet.name.trim();
    let info = DocumentInfo::for_path(
        name,
        &format!("{planet} Viewer, PDS Ring-Moon Systems Node"),
        "Helvetica",
    );
    let sink = PostScriptSink::new(out, &info)?;
    let mut device = Device::new(sink, FovWindow::square(plan.delta), RendererConfig::default())?;
    device.write_text(&view_prolog(options.moon_label_pts))?;
    device.write_text(&view_headings(
        planet,
        &options.title,
        &options.captions,
        options.align_loc,
        &generated_stamp(),
    ))?;

    let mut painter = ViewPainter::new(device, &plan, options);
    painter.draw_system()?;
    painter.draw_frame_and_stars()?;
    painter.device.end_page()?;

    let sink = painter.device.finish()?;
    tracing::info!("Wrote planetary view {}", name);
    Ok(sink.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::{BodyRecord, PoleModel, StaticEphemeris};
    use crate::options::MoonSpec;
    use crate::time::UniformTime;
    use approx::assert_relative_eq;

    fn frame(pole: DVec3, observer: DVec3, sun_direction: DVec3) -> RingFrame {
        RingFrame {
            planet: DVec3::ZERO,
            pole,
            observer,
            drift: DVec3::ZERO,
            sun_direction,
            sun_angular_radius: 1.0e-3,
        }
    }

    #[test]
    fn test_sky_labels() {
        assert_eq!(sky_label(3723.5, TickAxis::RightAscension), "1 02 03.5");
        assert_eq!(sky_label(-10.0, TickAxis::RightAscension), "23 59 50");
        assert_eq!(sky_label(-3600.0, TickAxis::Declination), "-1 00 00");
        assert_eq!(sky_label(0.25, TickAxis::Declination), "0 00 00.25");
    }

    #[test]
    fn test_tick_step_choice() {
        // 10 arcsec across: 2 arcsec majors.
        assert_eq!(TICK_STEPS[tick_step_index(5.0)], 2.0);
        // Huge spans settle on the widest spacing.
        assert_eq!(tick_step_index(1.0e7), TICK_STEPS.len() - 1);
        // Tiny spans fall back to the finest.
        assert_eq!(tick_step_index(1.0e-9), 1);
    }

    #[test]
    fn test_equatorial_ring_axes() {
        let f = frame(DVec3::Z, DVec3::new(0.0, 0.0, 1.0e9), DVec3::Z);
        let ring = f.ring(&RingSpec::circular(1000.0));
        assert!(ring.major.abs_diff_eq(DVec3::X * 1000.0, 1e-9));
        assert!(ring.minor.abs_diff_eq(DVec3::Y * 1000.0, 1e-9));
        assert!(ring.thickness.abs_diff_eq(DVec3::Z * RING_THICKNESS, 1e-12));
        assert!(!ring.dark, "observer and sun on the same side");
    }

    #[test]
    fn test_ring_dark_side() {
        let below = DVec3::new(0.0, 0.0, -1.0e9);
        let ring = frame(DVec3::Z, below, DVec3::Z).ring(&RingSpec::circular(1000.0));
        assert!(ring.dark);

        let dashed = RingSpec {
            dashed: true,
            ..RingSpec::circular(1000.0)
        };
        assert!(!frame(DVec3::Z, below, DVec3::Z).ring(&dashed).dark);

        // Sun grazing the ring plane lights neither face.
        let grazing = vhat(DVec3::new(1.0, 0.0, 1.0e-4));
        assert!(!frame(DVec3::Z, below, grazing).ring(&RingSpec::circular(1000.0)).dark);
    }

    #[test]
    fn test_eccentric_ring_center() {
        let spec = RingSpec {
            eccentricity: 0.5,
            elevation: 10.0,
            ..RingSpec::circular(1000.0)
        };
        let ring = frame(DVec3::Z, DVec3::Z * 1.0e9, DVec3::Z).ring(&spec);
        assert!(ring.center.abs_diff_eq(DVec3::new(-500.0, 0.0, 10.0), 1e-9));
        assert_relative_eq!(ring.minor.length(), 1000.0 * 0.75_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_arc_loops_follow_the_ring() {
        let spec = RingSpec::circular(1000.0);
        let ring = frame(DVec3::Z, DVec3::Z * 1.0e9, DVec3::Z).ring(&spec);
        let arc = ArcSpec {
            ring: 0,
            min_lon: 0.0,
            max_lon: 90.0,
            show: true,
        };
        let all = arc_loops(&arc, &spec, &ring, usize::MAX);
        assert_eq!(all.len(), 157);
        let capped = arc_loops(&arc, &spec, &ring, MAX_LOOPS);
        assert_eq!(capped.len(), MAX_LOOPS);

        let dlon = FRAC_PI_2 / 157.0;
        let first = all[0];
        let mid = DVec3::new((dlon / 2.0).cos(), (dlon / 2.0).sin(), 0.0)
            * (1000.0 * (dlon / 2.0).cos());
        assert!(first.center.abs_diff_eq(mid, 1e-6));
        assert_relative_eq!(first.minor.length(), LOOP_WIDTH, epsilon = 1e-12);
        assert_relative_eq!(
            first.major.length(),
            1000.0 * (dlon / 2.0).sin(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_arc_wraps_through_zero() {
        let spec = RingSpec::circular(1000.0);
        let ring = frame(DVec3::Z, DVec3::Z * 1.0e9, DVec3::Z).ring(&spec);
        let arc = ArcSpec {
            ring: 0,
            min_lon: 350.0,
            max_lon: 10.0,
            show: true,
        };
        assert_eq!(arc_loops(&arc, &spec, &ring, usize::MAX).len(), 34);
    }

    const SATURN_DISTANCE: f64 = 1.4e9;

    fn system() -> StaticEphemeris {
        let body = |id: i32, name: &str, position: DVec3, radius: f64| BodyRecord {
            id,
            name: name.into(),
            position,
            velocity: DVec3::ZERO,
            radii: DVec3::splat(radius),
            pole: None,
        };
        let mut saturn = body(699, "Saturn", DVec3::X * SATURN_DISTANCE, 60268.0);
        saturn.radii.z = 54364.0;
        saturn.pole = Some(PoleModel {
            ra: 40.6,
            dec: 83.5,
            w0: 38.9,
            w_rate: 810.8,
        });
        StaticEphemeris::new(399, 0.0)
            .with_body(body(399, "Earth", DVec3::ZERO, 6378.0))
            .with_body(body(10, "Sun", DVec3::new(-1.5e8, 2.0e7, 0.0), 696_000.0))
            .with_body(saturn)
            .with_body(body(
                606,
                "Titan",
                DVec3::new(SATURN_DISTANCE, 1.2e6, 0.0),
                2575.0,
            ))
            .with_body(body(
                608,
                "Iapetus",
                DVec3::new(SATURN_DISTANCE, 3.5e6, 0.0),
                735.0,
            ))
    }

    fn options() -> DiagramOptions {
        DiagramOptions {
            fov: 0.2,
            moons: vec![MoonSpec::new(606, "Titan"), MoonSpec::new(608, "Iapetus")],
            moon_label_pts: 12.0,
            rings: vec![
                RingSpec {
                    opaque: true,
                    ..RingSpec::circular(136_780.0)
                },
                RingSpec {
                    dashed: true,
                    ..RingSpec::circular(180_000.0)
                },
            ],
            title: "Saturn".into(),
            ..Default::default()
        }
    }

    fn render(options: &DiagramOptions) -> String {
        let out = draw_planetary_view(Vec::new(), "/tmp/saturn.ps", options, &system(), &UniformTime)
            .expect("view renders");
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plan_places_planet_dummy_and_moons() {
        let plan = ViewPlan::new(&options(), &system(), 0.0).unwrap();
        assert_eq!(plan.bodies.len(), 4);
        assert!(plan.bodies[0].label.is_empty());
        assert!(plan.bodies[1].label.is_empty());
        // The dummy sits on the optic axis at twice the planet distance.
        assert!(plan.bodies[1]
            .ellipsoid
            .center
            .abs_diff_eq(DVec3::X * 2.0 * SATURN_DISTANCE, 1.0));
        assert!(plan.camera.z_axis.abs_diff_eq(DVec3::X, 1e-12));
        assert_relative_eq!(plan.bodies[2].planet_distance, 1.2e6, max_relative = 1e-12);
        assert_eq!(plan.last_opaque, Some(0));
        assert_eq!(plan.rings.iter().flatten().count(), 2);
    }

    #[test]
    fn test_hidden_and_unknown_moons_are_skipped() {
        let mut opts = options();
        opts.moons[1].show = false;
        opts.moons.push(MoonSpec::new(699_999, "Nobody"));
        let plan = ViewPlan::new(&opts, &system(), 0.0).unwrap();
        assert_eq!(plan.bodies.len(), 3);
    }

    #[test]
    fn test_planet_without_pole_is_an_error() {
        let mut opts = options();
        opts.planet.id = 606;
        assert!(matches!(
            ViewPlan::new(&opts, &system(), 0.0),
            Err(DriverError::Ephemeris(_))
        ));
    }

    #[test]
    fn test_transparent_view_document() {
        let ps = render(&options());
        assert!(ps.starts_with("%!PS-Adobe-2.0 EPSF-2.0\n%%Title: saturn.ps\n"));
        assert!(ps.contains("%%Creator: Saturn Viewer, PDS Ring-Moon Systems Node"));
        assert!(ps.contains("%%EndProlog"));
        assert!(ps.contains("%Draw planet..."));
        assert!(ps.contains("%Draw ring # 1..."));
        assert!(ps.contains("[30 30] 0 setdash\n"));
        assert!(ps.contains("[] 0 setdash\n"));
        assert!(ps.contains("%Draw box..."));
        assert!(ps.contains(" LabelBelow"));
        assert!(ps.contains(" LabelLeft"));
        assert!(ps.trim_end().ends_with("showpage"));

        // Titan is in the field and labeled; Iapetus is outside it.
        assert!(ps.contains("(Titan) LabelBody"));
        assert!(ps.contains("%Draw Iapetus..."));
        assert!(!ps.contains("(Iapetus) LabelBody"));
    }

    #[test]
    fn test_opaque_view_draws_exterior_rings_first() {
        let opts = DiagramOptions {
            ring_method: RingMethod::Opaque,
            ..options()
        };
        let ps = render(&opts);
        let outer = ps.find("%Draw ring # 2...").expect("outer ring drawn");
        let inner = ps.find("%Draw ring # 1...").expect("inner ring drawn");
        assert!(outer < inner);
        assert!(ps.contains("(Titan) LabelBody"), "outer moons keep their labels");
    }

    #[test]
    fn test_semi_transparent_view_draws_planet_twice() {
        let opts = DiagramOptions {
            ring_method: RingMethod::SemiTransparent,
            ..options()
        };
        let ps = render(&opts);
        assert_eq!(ps.matches("%Draw planet...").count(), 2);
    }

    #[test]
    fn test_stars_and_arcs() {
        let opts = DiagramOptions {
            stars: vec![crate::options::StarSpec {
                ra: 0.02,
                dec: 0.01,
                name: "HD 1".into(),
            }],
            star_labels: true,
            arcs: vec![ArcSpec {
                ring: 1,
                min_lon: 0.0,
                max_lon: 30.0,
                show: true,
            }],
            ..options()
        };
        let ps = render(&opts);
        assert!(ps.contains("%Draw stars..."));
        assert!(ps.contains(" 15 setlinewidth"));
        assert!(ps.contains("(HD 1) LabelBody"));
        assert!(ps.contains("%Draw arcs..."));
        assert!(ps.contains(" 40 setlinewidth"));
    }
}
