//! Elliptical rings and arcs
//!
//! A ring is a curve, not a volume. It casts no shadow and has no
//! terminator; a point on it is dark only when other bodies' shadows cut
//! off enough light sources.

use glam::DVec3;
use pv_core::StandardCircle;
use pv_core::constants::STANDARD_STEPS;
use pv_core::math::lincomb;

use super::pass::Pass;
use super::{Outcome, Segment};
use crate::device::{Device, DrawSink, LineColor};
use crate::error::RenderResult;
use crate::scene::Scene;

/// An ellipse in the parent frame. `major` and `minor` are semi-axis
/// vectors and are expected to be perpendicular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingDrawable {
    /// Center
    pub center: DVec3,
    /// Semi-major axis
    pub major: DVec3,
    /// Semi-minor axis
    pub minor: DVec3,
    /// Lights that must reach a point for it to count as lit
    pub sources_required: usize,
    /// Color of lit parts
    pub lit: LineColor,
    /// Color of shadowed parts
    pub dark: LineColor,
}

impl RingDrawable {
    /// Ring drawn black whether lit or not
    pub fn new(center: DVec3, major: DVec3, minor: DVec3) -> Self {
        Self {
            center,
            major,
            minor,
            sources_required: 1,
            lit: LineColor::BLACK,
            dark: LineColor::BLACK,
        }
    }

    /// Set the lit and dark colors.
    pub fn with_colors(mut self, lit: LineColor, dark: LineColor) -> Self {
        self.lit = lit;
        self.dark = dark;
        self
    }

    /// Set the number of lights a point needs to be lit.
    pub fn with_sources_required(mut self, n: usize) -> Self {
        self.sources_required = n;
        self
    }

    /// Resolve the ring's visible parts and send them to `device`.
    pub fn render<S: DrawSink>(
        &self,
        scene: &Scene,
        device: &mut Device<S>,
    ) -> RenderResult<Outcome> {
        Pass::for_ring(scene, self).run(device)
    }
}

/// Walk the whole ring in table steps of `skip`, starting and ending at the
/// tip of the major axis.
pub(crate) fn sample_ring(
    center: DVec3,
    major: DVec3,
    minor: DVec3,
    circle: &StandardCircle,
    skip: usize,
) -> Vec<Segment> {
    let start = center + major;
    let mut segments = Vec::with_capacity(STANDARD_STEPS / skip + 1);
    let mut begin = start;
    let mut n = skip;
    while n < STANDARD_STEPS {
        let end = center + lincomb(circle.cos(n), major, circle.sin(n), minor);
        segments.push(Segment::new(begin, end));
        begin = end;
        n += skip;
    }
    segments.push(Segment::new(begin, start));
    segments
}
