//! Field-of-view geometry shared by every scene drawn into one window

use glam::DVec3;
use pv_core::constants::{LIMIT_FOV, WIDE_FOV_COSINE};
use pv_core::math::vhat;

use crate::device::FovWindow;
use crate::error::{RenderError, RenderResult};

/// Cone bounding the field-of-view window, plus the hard limit cone around
/// the optic axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewGeometry {
    window: FovWindow,
    center: DVec3,
    radius: f64,
    cos_limit: f64,
    tan_limit: f64,
}

impl ViewGeometry {
    /// Bound the image-plane rectangle `window` by a circular cone.
    ///
    /// The cone axis points at the window center and its radius (a tangent)
    /// reaches the farthest corner. When the window is too wide for that to
    /// make sense the cone is centered on the optic axis instead.
    pub fn new(window: FovWindow) -> RenderResult<Self> {
        let FovWindow {
            x_min,
            x_max,
            y_min,
            y_max,
        } = window;
        if [x_min, x_max, y_min, y_max].iter().any(|v| !v.is_finite()) {
            return Err(RenderError::InvalidConfig(format!(
                "field of view is not finite: {window:?}"
            )));
        }
        if x_max == x_min {
            return Err(RenderError::InvalidConfig(format!(
                "field of view has zero width: x {x_min}..{x_max}"
            )));
        }
        if y_max == y_min {
            return Err(RenderError::InvalidConfig(format!(
                "field of view has zero height: y {y_min}..{y_max}"
            )));
        }

        let corners = [
            vhat(DVec3::new(-x_min, -y_min, 1.0)),
            vhat(DVec3::new(-x_min, -y_max, 1.0)),
            vhat(DVec3::new(-x_max, -y_min, 1.0)),
            vhat(DVec3::new(-x_max, -y_max, 1.0)),
        ];
        let mut center = vhat(DVec3::new(
            -0.5 * (x_min + x_max),
            -0.5 * (y_min + y_max),
            1.0,
        ));

        let mut min_cos = 2.0_f64;
        let mut last_cos = 0.0;
        for c in &corners {
            last_cos = c.dot(center);
            min_cos = min_cos.min(last_cos);
        }

        // The wide-window test looks at the last corner only.
        if last_cos <= WIDE_FOV_COSINE {
            min_cos = corners.iter().map(|c| c.z).fold(2.0, f64::min);
            center = DVec3::Z;
        }

        let radius = (1.0 - min_cos * min_cos).sqrt() / min_cos;
        tracing::debug!("View cone: center {:?}, radius {:.6}", center, radius);

        Ok(Self {
            window,
            center,
            radius,
            cos_limit: LIMIT_FOV.cos(),
            tan_limit: LIMIT_FOV.tan(),
        })
    }

    /// Square window of half-width `half` around the optic axis
    pub fn square(half: f64) -> RenderResult<Self> {
        Self::new(FovWindow::square(half))
    }

    /// The image-plane window
    pub fn window(&self) -> FovWindow {
        self.window
    }

    /// Unit vector at the center of the bounding cone
    pub fn center(&self) -> DVec3 {
        self.center
    }

    /// Tangent of the bounding cone's half-angle
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Cosine of the limit cone half-angle
    pub fn cos_limit(&self) -> f64 {
        self.cos_limit
    }

    /// Tangent of the limit cone half-angle
    pub fn tan_limit(&self) -> f64 {
        self.tan_limit
    }
}
