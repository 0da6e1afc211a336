//! Body curves: limb, terminators and the optional coordinate grid

use std::f64::consts::PI;

use glam::DVec3;
use pv_core::constants::{MAX_LATITUDES, MAX_MERIDIANS, STANDARD_STEPS};
use pv_core::ellipse::angle_ordered;
use pv_core::math::{lincomb, opposite_signs, vhat};
use pv_core::{Plane, PlaneEllipse, StandardCircle, plane_points, same_side, sort_by_angle};

use super::pass::Pass;
use super::{Emitter, Outcome, Requirement, Segment, Shading};
use crate::device::{Device, DrawSink};
use crate::error::{RenderError, RenderResult};
use crate::scene::{Scene, SceneBody};

/// What a render plane was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneOrigin {
    /// The body's limb
    Limb,
    /// The terminator cast by light `n`
    Terminator(usize),
    /// Meridian `n`
    Meridian(usize),
    /// Latitude circle `n`, counted from the south
    Latitude(usize),
}

/// An ellipse in its plane, tagged with where it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPlane {
    /// The curve
    pub ellipse: PlaneEllipse,
    /// `normal · center`
    pub constant: f64,
    /// Source of the curve
    pub origin: PlaneOrigin,
}

impl RenderPlane {
    fn new(ellipse: PlaneEllipse, origin: PlaneOrigin) -> Self {
        Self {
            constant: ellipse.center.dot(ellipse.normal),
            ellipse,
            origin,
        }
    }

    fn cut(&self) -> Plane {
        Plane {
            normal: self.ellipse.normal,
            constant: self.constant,
        }
    }

    /// Limb curves and grid curves are classified by every light; a
    /// terminator only by the others.
    fn is_terminator(&self) -> bool {
        matches!(self.origin, PlaneOrigin::Terminator(_))
    }
}

/// A body of the scene, drawn with its limb, terminators and grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDrawable {
    /// Index of the body in the scene
    pub index: usize,
    /// Meridians drawn, evenly spaced in longitude
    pub meridians: usize,
    /// Latitude circles drawn, evenly spaced between the poles
    pub latitudes: usize,
    /// Lights that must reach a point for it to count as lit
    pub sources_required: usize,
    /// Line colors
    pub shading: Shading,
}

impl BodyDrawable {
    /// Body `index` with no grid, lit by any single source
    pub fn new(index: usize) -> Self {
        Self {
            index,
            meridians: 0,
            latitudes: 0,
            sources_required: 1,
            shading: Shading::default(),
        }
    }

    /// Draw a coordinate grid.
    pub fn with_grid(mut self, meridians: usize, latitudes: usize) -> Self {
        self.meridians = meridians;
        self.latitudes = latitudes;
        self
    }

    /// Set the number of lights a point needs to be lit.
    pub fn with_sources_required(mut self, n: usize) -> Self {
        self.sources_required = n;
        self
    }

    /// Set line colors.
    pub fn with_shading(mut self, shading: Shading) -> Self {
        self.shading = shading;
        self
    }

    fn validate(&self) -> RenderResult<()> {
        if self.meridians > MAX_MERIDIANS {
            return Err(RenderError::InvalidConfig(format!(
                "{} meridians requested (maximum {MAX_MERIDIANS})",
                self.meridians
            )));
        }
        if self.latitudes > MAX_LATITUDES {
            return Err(RenderError::InvalidConfig(format!(
                "{} latitude circles requested (maximum {MAX_LATITUDES})",
                self.latitudes
            )));
        }
        Ok(())
    }

    /// Resolve the body's visible curves and send them to `device`.
    pub fn render<S: DrawSink>(
        &self,
        scene: &Scene,
        device: &mut Device<S>,
    ) -> RenderResult<Outcome> {
        self.validate()?;
        let body = scene.body(self.index)?;
        Pass::for_body(scene, self.index, body, self).run(device)
    }
}

/// Limb first, then one terminator per light that casts one, then the
/// meridians and latitude circles. Returns the planes and the number of
/// leading limb and terminator planes.
pub(crate) fn build_planes(
    body: &SceneBody,
    meridians: usize,
    latitudes: usize,
) -> (Vec<RenderPlane>, usize) {
    let mut planes = vec![RenderPlane::new(body.limb, PlaneOrigin::Limb)];
    for (ls, cone) in body.cones.iter().enumerate() {
        if cone.exists {
            planes.push(RenderPlane::new(cone.terminator, PlaneOrigin::Terminator(ls)));
        }
    }
    let outline_planes = planes.len();

    let u1 = vhat(body.axes.0[0]);
    let u2 = vhat(body.axes.0[1]);
    let u3 = vhat(body.axes.0[2]);
    let [a, b, c] = body.lengths;

    if meridians > 0 {
        let step = PI / meridians as f64;
        let (base_sin, base_cos) = (step.sin(), step.cos());
        let (mut cos, mut sin) = (1.0, 0.0);
        let a2 = a * a;
        let b2 = b * b;
        for n in 0..meridians {
            let normal = lincomb(-sin, u1, cos, u2);
            let denom = a2 * sin * sin + b2 * cos * cos;
            let t = if denom > 0.0 { (a2 * b2 / denom).sqrt() } else { 1.0 };
            let major = lincomb(cos, u1, sin, u2) * t;
            planes.push(RenderPlane::new(
                PlaneEllipse {
                    normal,
                    major,
                    minor: body.axes.0[2],
                    center: body.center,
                    visible: true,
                },
                PlaneOrigin::Meridian(n),
            ));
            (cos, sin) = (cos * base_cos - sin * base_sin, sin * base_cos + cos * base_sin);
        }
    }

    if latitudes > 0 {
        let step = PI / (latitudes + 1) as f64;
        let (base_sin, base_cos) = (step.sin(), step.cos());
        let (mut cos, mut sin) = (base_sin, -base_cos);
        let a2 = a * a;
        let c2 = c * c;
        let ab = a * b;
        for n in 0..latitudes {
            if cos == 0.0 {
                cos = 1.0e-30;
            }
            let tan = sin / cos;
            let num = c2 * tan;
            let sum = a2 + num * tan;
            let factor = if sum > 0.0 { 1.0 / sum.sqrt() } else { 1.0 };
            let z = num * factor;
            planes.push(RenderPlane::new(
                PlaneEllipse {
                    normal: u3,
                    major: u1 * (a2 * factor),
                    minor: u2 * (ab * factor),
                    center: body.center + u3 * z,
                    visible: true,
                },
                PlaneOrigin::Latitude(n),
            ));
            (cos, sin) = (cos * base_cos - sin * base_sin, sin * base_cos + cos * base_sin);
        }
    }

    (planes, outline_planes)
}

/// Sample plane `e` into segments on the visible side of the limb plane,
/// breaking the curve wherever it meets another plane still being solved.
///
/// `solve` says which planes to intersect with; it is updated so that each
/// outline curve is cut once by every other outline and grid curves only by
/// outlines.
pub(crate) fn sample_plane(
    planes: &[RenderPlane],
    e: usize,
    outline_planes: usize,
    solve: &mut [bool],
    circle: &StandardCircle,
    skip: usize,
) -> Vec<Segment> {
    let plane = &planes[e];
    solve[e] = false;
    let cuts: Vec<Plane> = planes.iter().map(RenderPlane::cut).collect();
    let mut aux = plane_points(&plane.ellipse, &cuts, solve);

    if e + 1 < outline_planes {
        solve[e] = true;
    } else if e + 1 == outline_planes {
        solve[e] = true;
        solve[e + 1..].iter_mut().for_each(|s| *s = false);
    }
    sort_by_angle(&mut aux);

    let limb_normal = planes[0].ellipse.normal;
    let view_side = -planes[0].constant;
    let visible = |p: DVec3| e == 0 || !opposite_signs(p.dot(limb_normal) - planes[0].constant, view_side);

    let ellipse = &plane.ellipse;
    let mut segments = Vec::new();
    let mut begin = ellipse.major + ellipse.center;
    let mut begin_visible = visible(begin);
    let mut step_to = |cos: f64, sin: f64, segments: &mut Vec<Segment>| {
        let end = ellipse.point(cos, sin);
        let end_visible = visible(end);
        if begin_visible && end_visible {
            segments.push(Segment::new(begin, end));
        }
        begin = end;
        begin_visible = end_visible;
    };

    let last = STANDARD_STEPS - 1;
    let mut next_std = skip;
    let mut next_aux = 0;
    while next_std <= last && next_aux < aux.len() {
        let (sc, ss) = (circle.cos(next_std), circle.sin(next_std));
        let [ac, as_] = aux[next_aux];
        if angle_ordered(sc, ss, ac, as_) {
            next_std += skip;
            step_to(sc, ss, &mut segments);
        } else {
            next_aux += 1;
            step_to(ac, as_, &mut segments);
        }
    }
    while next_std <= last {
        step_to(circle.cos(next_std), circle.sin(next_std), &mut segments);
        next_std += skip;
    }
    for &[ac, as_] in &aux[next_aux..] {
        step_to(ac, as_, &mut segments);
    }
    step_to(1.0, 0.0, &mut segments);
    segments
}

/// Classify plane `e`'s segments against each light's terminator on the
/// body itself.
///
/// Dark parts of limb and grid curves and the visible terminator are
/// emitted straight away; segments that may be lit are returned for the
/// eclipse stage.
pub(crate) fn classify_illumination<S: DrawSink>(
    scene: &Scene,
    body: &SceneBody,
    plane: &RenderPlane,
    segments: &[Segment],
    need: Requirement,
    shading: Shading,
    out: &mut Emitter<'_, S>,
) -> RenderResult<Vec<Segment>> {
    let lights = scene.lights();
    let own_terminator = match plane.origin {
        PlaneOrigin::Terminator(ls) => Some(ls),
        _ => None,
    };
    let mut bright = Vec::new();

    for &seg in segments {
        let mut dark = 0_i64;
        let mut lit = 0_i64;
        let mut ls = 0;
        let mut unknown = ls < lights.len();
        while unknown {
            if own_terminator == Some(ls) {
                dark += 1;
            } else {
                let t = &body.cones[ls].terminator;
                if same_side(seg.begin, seg.end, t.normal, t.center, lights[ls].position) {
                    lit += 1;
                } else {
                    dark += 1;
                }
            }
            ls += 1;
            unknown = if plane.is_terminator() {
                lit < need.sources && ls < lights.len()
            } else {
                lit < need.sources && dark < need.dark && ls < lights.len()
            };
        }

        if plane.is_terminator() {
            if dark == need.dark && lit == need.sources - 1 {
                out.emit(seg, shading.terminator)?;
            }
        } else if dark == need.dark {
            out.emit(seg, shading.dark)?;
        } else {
            bright.push(seg);
        }
    }
    Ok(bright)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RendererConfig, ViewRegion};
    use crate::device::{DrawCommand, FovWindow, LineColor, RecordingSink};
    use crate::scene::{Ellipsoid, SceneBuilder, ViewGeometry};
    use approx::assert_relative_eq;
    use pv_core::Axes;

    const LIT: LineColor = LineColor(2);
    const DARK: LineColor = LineColor(6);
    const TERM: LineColor = LineColor(9);

    fn shading() -> Shading {
        Shading {
            lit: LIT,
            dark: DARK,
            terminator: TERM,
        }
    }

    fn device(half: f64) -> Device<RecordingSink> {
        let config = RendererConfig {
            view: ViewRegion::FULL,
            ..Default::default()
        };
        Device::new(RecordingSink::new(), FovWindow::square(half), config).unwrap()
    }

    fn scene(bodies: &[Ellipsoid], light: DVec3) -> Scene {
        SceneBuilder::default()
            .light(light, 10.0)
            .bodies(bodies.iter().copied())
            .build(&ViewGeometry::square(0.2).unwrap())
            .unwrap()
    }

    #[test]
    fn test_sphere_lit_from_behind_observer_is_all_lit() {
        let s = scene(
            &[Ellipsoid::sphere(DVec3::new(0.0, 0.0, 10.0), 1.0)],
            DVec3::new(0.0, 0.0, -1.0e4),
        );
        let mut dev = device(0.2);
        let outcome = BodyDrawable::new(0)
            .with_shading(shading())
            .render(&s, &mut dev)
            .unwrap();
        let Outcome::Drawn { segments } = outcome else {
            panic!("expected segments, got {outcome:?}");
        };
        assert!(segments > 0);
        let sink = dev.finish().unwrap();
        assert_eq!(sink.grays(), vec![2], "only lit limb segments expected");
    }

    #[test]
    fn test_sphere_lit_from_the_side_shows_terminator() {
        let s = scene(
            &[Ellipsoid::sphere(DVec3::new(0.0, 0.0, 10.0), 1.0)],
            DVec3::new(1.0e4, 0.0, 10.0),
        );
        let mut dev = device(0.2);
        BodyDrawable::new(0)
            .with_shading(shading())
            .render(&s, &mut dev)
            .unwrap();
        let grays = dev.finish().unwrap().grays();
        assert!(grays.contains(&2), "lit half of the limb");
        assert!(grays.contains(&6), "dark half of the limb");
        assert!(grays.contains(&9), "terminator");
    }

    #[test]
    fn test_far_small_body_behind_large_one_draws_nothing() {
        let s = scene(
            &[
                Ellipsoid::sphere(DVec3::new(0.0, 0.0, 10.0), 2.0),
                Ellipsoid::sphere(DVec3::new(0.0, 0.0, 30.0), 1.0),
            ],
            DVec3::new(0.0, 0.0, -1.0e4),
        );
        let mut dev = device(0.5);
        assert_eq!(
            BodyDrawable::new(1).render(&s, &mut dev).unwrap(),
            Outcome::Occluded
        );
        assert!(matches!(
            BodyDrawable::new(0).render(&s, &mut dev).unwrap(),
            Outcome::Drawn { .. }
        ));
        assert!(dev.finish().unwrap().stroke_count() > 0);
    }

    #[test]
    fn test_body_outside_view_is_culled() {
        let s = scene(
            &[Ellipsoid::sphere(DVec3::new(50.0, 0.0, 10.0), 1.0)],
            DVec3::new(0.0, 0.0, -1.0e4),
        );
        let mut dev = device(0.2);
        assert_eq!(
            BodyDrawable::new(0).render(&s, &mut dev).unwrap(),
            Outcome::OutsideView
        );
        assert!(dev.sink().commands.is_empty());
    }

    #[test]
    fn test_missing_body_is_an_error() {
        let s = scene(&[], DVec3::new(0.0, 0.0, -1.0e4));
        let mut dev = device(0.2);
        assert_eq!(
            BodyDrawable::new(2).render(&s, &mut dev),
            Err(RenderError::BodyIndex(2))
        );
    }

    #[test]
    fn test_too_many_meridians_rejected() {
        let s = scene(
            &[Ellipsoid::sphere(DVec3::new(0.0, 0.0, 10.0), 1.0)],
            DVec3::new(0.0, 0.0, -1.0e4),
        );
        let mut dev = device(0.2);
        let result = BodyDrawable::new(0)
            .with_grid(MAX_MERIDIANS + 1, 0)
            .render(&s, &mut dev);
        assert!(matches!(result, Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn test_plane_order_and_grid_geometry() {
        let s = scene(
            &[Ellipsoid {
                center: DVec3::new(0.0, 0.0, 10.0),
                axes: Axes([DVec3::X * 2.0, DVec3::Y * 2.0, DVec3::Z]),
            }],
            DVec3::new(0.0, 0.0, -1.0e4),
        );
        let (planes, outlines) = build_planes(&s.bodies()[0], 2, 1);
        assert_eq!(outlines, 2);
        let origins: Vec<PlaneOrigin> = planes.iter().map(|p| p.origin).collect();
        assert_eq!(
            origins,
            vec![
                PlaneOrigin::Limb,
                PlaneOrigin::Terminator(0),
                PlaneOrigin::Meridian(0),
                PlaneOrigin::Meridian(1),
                PlaneOrigin::Latitude(0),
            ]
        );
        // The single latitude circle is the equator.
        let equator = &planes[4].ellipse;
        assert_relative_eq!(equator.major.length(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(equator.center.z, 10.0, epsilon = 1e-12);
        // First meridian contains the x axis.
        assert_relative_eq!(planes[2].ellipse.major.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(planes[2].ellipse.normal.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_limb_sampling_closes_the_curve() {
        let s = scene(
            &[Ellipsoid::sphere(DVec3::new(0.0, 0.0, 10.0), 1.0)],
            DVec3::new(0.0, 0.0, -1.0e4),
        );
        let (planes, outlines) = build_planes(&s.bodies()[0], 0, 0);
        let mut solve = vec![true; planes.len()];
        let segments = sample_plane(&planes, 0, outlines, &mut solve, s.circle(), 1);
        // Terminator coincides with the back of the limb plane, so the limb
        // has no plane crossings: 95 table steps plus the closing step.
        assert_eq!(segments.len(), STANDARD_STEPS);
        let first = segments.first().unwrap().begin;
        let last = segments.last().unwrap().end;
        assert!(first.abs_diff_eq(last, 1e-12));
        assert_eq!(solve, vec![true, true]);
    }

    #[test]
    fn test_grid_lines_are_classified() {
        let s = scene(
            &[Ellipsoid::sphere(DVec3::new(0.0, 0.0, 10.0), 1.0)],
            DVec3::new(0.0, 0.0, -1.0e4),
        );
        let mut dev = device(0.2);
        BodyDrawable::new(0)
            .with_grid(4, 3)
            .with_shading(shading())
            .render(&s, &mut dev)
            .unwrap();
        let sink = dev.finish().unwrap();
        assert!(
            sink.commands
                .iter()
                .all(|c| !matches!(c, DrawCommand::SetGray(g) if *g == 9)),
            "no terminator is visible with the light behind the observer"
        );
        assert!(sink.stroke_count() > 1);
    }
}
