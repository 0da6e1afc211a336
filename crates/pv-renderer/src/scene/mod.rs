//! Scene construction
//!
//! A [`Scene`] is the geometry of one rendered instant expressed in the
//! camera frame: the observer sits at the origin looking down +z. Limbs,
//! terminators and eclipse cones are derived once when the scene is built
//! and never change afterwards. A scene can only be obtained from
//! [`SceneBuilder::build`], so a partially assembled scene is never visible
//! to the visibility engine.

mod view;

pub use view::ViewGeometry;

use glam::{DMat3, DVec3};
use pv_core::constants::{MAX_BODIES, MAX_LIGHTS};
use pv_core::math::to_frame;
use pv_core::{Axes, EclipseCone, PlaneEllipse, StandardCircle, compute_eclipse_cone, compute_limb};

use crate::error::{RenderError, RenderResult};

/// A spherical light source in the parent (inertial) frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    /// Center
    pub position: DVec3,
    /// Radius
    pub radius: f64,
}

/// A triaxial body in the parent (inertial) frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Center
    pub center: DVec3,
    /// Semi-axis vectors
    pub axes: Axes,
}

impl Ellipsoid {
    /// Sphere of the given radius
    pub fn sphere(center: DVec3, radius: f64) -> Self {
        Self {
            center,
            axes: Axes::sphere(radius),
        }
    }
}

/// A light source in camera coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLight {
    /// Center
    pub position: DVec3,
    /// Radius
    pub radius: f64,
}

/// A body in camera coordinates with its derived outlines
#[derive(Debug, Clone, PartialEq)]
pub struct SceneBody {
    /// Center
    pub center: DVec3,
    /// Semi-axis vectors
    pub axes: Axes,
    /// Semi-axis lengths
    pub lengths: [f64; 3],
    /// Longest semi-axis
    pub largest: f64,
    /// Shortest semi-axis
    pub smallest: f64,
    /// Limb as seen from the observer
    pub limb: PlaneEllipse,
    /// Terminator and shadow cone for each light, in light order
    pub cones: Vec<EclipseCone>,
}

impl SceneBody {
    fn new(center: DVec3, axes: Axes, lights: &[SceneLight]) -> Self {
        let lengths = axes.lengths();
        let largest = lengths.iter().copied().fold(f64::MIN, f64::max);
        let smallest = lengths.iter().copied().fold(f64::MAX, f64::min);
        let limb = compute_limb(&axes, center, DVec3::ZERO);
        let cones = lights
            .iter()
            .map(|l| compute_eclipse_cone(&axes, center, l.position, l.radius))
            .collect();
        Self {
            center,
            axes,
            lengths,
            largest,
            smallest,
            limb,
            cones,
        }
    }
}

/// Collects observer, camera, lights and bodies for one scene.
#[derive(Debug, Clone)]
pub struct SceneBuilder {
    observer: DVec3,
    camera: DMat3,
    lights: Vec<LightSource>,
    bodies: Vec<Ellipsoid>,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new(DVec3::ZERO, DMat3::IDENTITY)
    }
}

impl SceneBuilder {
    /// Start a scene seen from `observer` through a camera whose axes are
    /// the columns of `camera`. Camera +z is the optic axis.
    pub fn new(observer: DVec3, camera: DMat3) -> Self {
        Self {
            observer,
            camera,
            lights: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Add a spherical light source.
    pub fn light(mut self, position: DVec3, radius: f64) -> Self {
        self.lights.push(LightSource { position, radius });
        self
    }

    /// Add a body. Bodies are indexed in the order they are added.
    pub fn body(mut self, body: Ellipsoid) -> Self {
        self.bodies.push(body);
        self
    }

    /// Add several bodies.
    pub fn bodies(mut self, bodies: impl IntoIterator<Item = Ellipsoid>) -> Self {
        self.bodies.extend(bodies);
        self
    }

    fn validate(&self) -> RenderResult<()> {
        if self.lights.len() > MAX_LIGHTS {
            return Err(RenderError::TooManyLights {
                count: self.lights.len(),
                max: MAX_LIGHTS,
            });
        }
        if self.bodies.len() > MAX_BODIES {
            return Err(RenderError::TooManyBodies {
                count: self.bodies.len(),
                max: MAX_BODIES,
            });
        }
        if !self.observer.is_finite() || !self.camera.is_finite() {
            return Err(RenderError::InvalidConfig(
                "observer or camera is not finite".into(),
            ));
        }
        for (i, light) in self.lights.iter().enumerate() {
            if !light.position.is_finite() {
                return Err(RenderError::InvalidConfig(format!(
                    "light {i} position is not finite"
                )));
            }
            if !(light.radius.is_finite() && light.radius > 0.0) {
                return Err(RenderError::InvalidConfig(format!(
                    "light {i} radius must be positive, got {}",
                    light.radius
                )));
            }
        }
        for (i, body) in self.bodies.iter().enumerate() {
            if !body.center.is_finite() || body.axes.0.iter().any(|a| !a.is_finite()) {
                return Err(RenderError::InvalidConfig(format!(
                    "body {i} geometry is not finite"
                )));
            }
        }
        Ok(())
    }

    /// Move everything into the camera frame and derive limbs and cones.
    pub fn build(self, view: &ViewGeometry) -> RenderResult<Scene> {
        self.validate()?;
        let camera = self.camera;
        let observer = self.observer;
        let into_camera = |p: DVec3| to_frame(&camera, p - observer);

        let lights: Vec<SceneLight> = self
            .lights
            .iter()
            .map(|l| SceneLight {
                position: into_camera(l.position),
                radius: l.radius,
            })
            .collect();

        let bodies: Vec<SceneBody> = self
            .bodies
            .iter()
            .map(|b| {
                let center = into_camera(b.center);
                let axes = b.axes.map(|a| to_frame(&camera, a));
                SceneBody::new(center, axes, &lights)
            })
            .collect();

        tracing::info!(
            "Scene built: {} bodies, {} light sources",
            bodies.len(),
            lights.len()
        );

        Ok(Scene {
            view: *view,
            observer,
            camera,
            lights,
            bodies,
            circle: StandardCircle::new(),
        })
    }
}

/// Immutable geometry of one rendered instant
#[derive(Debug, Clone)]
pub struct Scene {
    view: ViewGeometry,
    observer: DVec3,
    camera: DMat3,
    lights: Vec<SceneLight>,
    bodies: Vec<SceneBody>,
    circle: StandardCircle,
}

impl Scene {
    /// Field-of-view geometry
    pub fn view(&self) -> &ViewGeometry {
        &self.view
    }

    /// Observer position in the parent frame
    pub fn observer(&self) -> DVec3 {
        self.observer
    }

    /// Camera axes in the parent frame, as columns
    pub fn camera(&self) -> &DMat3 {
        &self.camera
    }

    /// Light sources
    pub fn lights(&self) -> &[SceneLight] {
        &self.lights
    }

    /// Bodies
    pub fn bodies(&self) -> &[SceneBody] {
        &self.bodies
    }

    /// Body `index`, or [`RenderError::BodyIndex`] if there is none
    pub fn body(&self, index: usize) -> RenderResult<&SceneBody> {
        self.bodies.get(index).ok_or(RenderError::BodyIndex(index))
    }

    /// Sampling table shared by every curve in the scene
    pub fn circle(&self) -> &StandardCircle {
        &self.circle
    }

    /// Parent-frame point in camera coordinates
    pub fn to_camera_point(&self, p: DVec3) -> DVec3 {
        to_frame(&self.camera, p - self.observer)
    }

    /// Parent-frame direction in camera coordinates
    pub fn to_camera_vector(&self, v: DVec3) -> DVec3 {
        to_frame(&self.camera, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn view() -> ViewGeometry {
        ViewGeometry::square(0.1).unwrap()
    }

    #[test]
    fn test_bodies_move_into_camera_frame() {
        // Camera looking down parent -x: camera z is parent -x.
        let camera = DMat3::from_cols(DVec3::Y, DVec3::Z, -DVec3::X);
        let scene = SceneBuilder::new(DVec3::new(10.0, 0.0, 0.0), camera)
            .light(DVec3::new(100.0, 0.0, 0.0), 1.0)
            .body(Ellipsoid::sphere(DVec3::ZERO, 1.0))
            .build(&view())
            .unwrap();
        let body = scene.body(0).unwrap();
        assert!(body.center.abs_diff_eq(DVec3::new(0.0, 0.0, 10.0), 1e-12));
        assert!(body.limb.visible);
        assert_eq!(body.cones.len(), 1);
        assert!(body.cones[0].exists);
        assert_relative_eq!(body.largest, 1.0);
        assert_relative_eq!(body.smallest, 1.0);
    }

    #[test]
    fn test_observer_inside_body_hides_limb() {
        let scene = SceneBuilder::default()
            .body(Ellipsoid::sphere(DVec3::new(0.0, 0.0, 0.5), 1.0))
            .build(&view())
            .unwrap();
        assert!(!scene.body(0).unwrap().limb.visible);
    }

    #[test]
    fn test_rejects_nonpositive_light_radius() {
        let result = SceneBuilder::default()
            .light(DVec3::new(0.0, 0.0, -100.0), 0.0)
            .build(&view());
        assert!(matches!(result, Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_too_many_lights() {
        let mut builder = SceneBuilder::default();
        for i in 0..=MAX_LIGHTS {
            builder = builder.light(DVec3::new(i as f64, 0.0, -100.0), 1.0);
        }
        let result = builder.build(&view());
        assert_eq!(
            result.err(),
            Some(RenderError::TooManyLights {
                count: MAX_LIGHTS + 1,
                max: MAX_LIGHTS
            })
        );
    }

    #[test]
    fn test_rejects_too_many_bodies() {
        let bodies = (0..=MAX_BODIES).map(|i| Ellipsoid::sphere(DVec3::new(0.0, i as f64, 50.0), 0.1));
        let result = SceneBuilder::default().bodies(bodies).build(&view());
        assert!(matches!(result, Err(RenderError::TooManyBodies { .. })));
    }

    #[test]
    fn test_missing_body_index() {
        let scene = SceneBuilder::default().build(&view()).unwrap();
        assert_eq!(scene.body(3).err(), Some(RenderError::BodyIndex(3)));
    }
}
