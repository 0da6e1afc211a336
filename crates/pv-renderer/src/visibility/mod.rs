//! Visible-surface resolution
//!
//! Every drawable entity is pushed through the same sequence of stages:
//!
//! ```text
//! FieldOfView ─► Occlusion ─► Planes ─┬─► CandidateArcs(e) ─► OccluderClip(e)
//!                                     │        ▲                    │
//!                                     │        │                    ▼
//!                                     │   Eclipse(e) ◄──── Illumination(e)
//!                                     │        │
//!                                     └────────┴──► Done
//! ```
//!
//! A body walks the loop once per plane curve (limb, terminators,
//! meridians, latitude circles). A ring walks it once and skips the
//! illumination stage. Stars and overlay segments bypass the engine and are
//! drawn directly.

mod body;
mod overlay;
mod pass;
mod ring;
mod shadow;

pub use body::{BodyDrawable, PlaneOrigin, RenderPlane};
pub use overlay::{Glyph, OverlayDrawable, StarDrawable};
pub use ring::RingDrawable;

use glam::DVec3;
use pv_core::SubSegment;
use pv_core::clip_to_fov_cone;

use crate::device::{Device, DrawSink, LineColor};
use crate::error::RenderResult;
use crate::scene::Scene;

/// Colors for the three classes of visible curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shading {
    /// Sunlit
    pub lit: LineColor,
    /// Unlit or eclipsed
    pub dark: LineColor,
    /// Terminator curves
    pub terminator: LineColor,
}

impl Default for Shading {
    fn default() -> Self {
        Self {
            lit: LineColor::BLACK,
            dark: LineColor::BLACK,
            terminator: LineColor::BLACK,
        }
    }
}

/// Where an entity is in its visibility pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Testing the entity against the field-of-view cone
    FieldOfView,
    /// Looking for nearer bodies that may hide it
    Occlusion,
    /// Building the plane curves to sample
    Planes,
    /// Sampling curve `e` into candidate segments
    CandidateArcs(usize),
    /// Removing the parts of curve `e` hidden by occluders
    OccluderClip(usize),
    /// Classifying curve `e` against each light's terminator
    Illumination(usize),
    /// Splitting lit parts of curve `e` by other bodies' shadows
    Eclipse(usize),
    /// Finished
    Done,
}

/// How an entity's pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing of the entity falls in the field of view
    OutsideView,
    /// A nearer body hides the entity completely
    Occluded,
    /// Segments were handed to the device
    Drawn {
        /// Segments emitted, including ones the device later clipped away
        segments: usize,
    },
}

/// One closed set of things to draw
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    /// A body of the scene
    Body(BodyDrawable),
    /// An elliptical ring
    Ring(RingDrawable),
    /// A star glyph
    Star(StarDrawable),
    /// Image-plane segments
    Overlay(OverlayDrawable),
}

impl Drawable {
    /// Resolve visibility and send the result to `device`.
    pub fn render<S: DrawSink>(
        &self,
        scene: &Scene,
        device: &mut Device<S>,
    ) -> RenderResult<Outcome> {
        match self {
            Self::Body(b) => b.render(scene, device),
            Self::Ring(r) => r.render(scene, device),
            Self::Star(s) => s.render(scene, device),
            Self::Overlay(o) => o.render(device),
        }
    }

    /// True for entities whose curves include terminators
    pub fn has_terminator(&self) -> bool {
        matches!(self, Self::Body(_))
    }

    /// True for entities that nearer bodies can hide
    pub fn can_be_occluded(&self) -> bool {
        matches!(self, Self::Body(_) | Self::Ring(_))
    }
}

/// A straight piece of curve in camera coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Start point
    pub begin: DVec3,
    /// End point
    pub end: DVec3,
}

impl Segment {
    /// Segment from `begin` to `end`
    pub fn new(begin: DVec3, end: DVec3) -> Self {
        Self { begin, end }
    }
}

impl From<SubSegment> for Segment {
    fn from(s: SubSegment) -> Self {
        Self::new(s.begin, s.end)
    }
}

/// Light counts needed to call a segment lit or dark.
///
/// `dark` can be zero or negative when more sources are required than the
/// scene has, in which case everything is dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Requirement {
    pub sources: i64,
    pub dark: i64,
}

impl Requirement {
    pub fn new(sources_required: usize, lights: usize) -> Self {
        let sources = sources_required as i64;
        Self {
            sources,
            dark: 1 + lights as i64 - sources,
        }
    }
}

/// Forwards accepted segments to the device, clipping them to the limit
/// cone first when the entity reaches outside it.
pub(crate) struct Emitter<'d, S: DrawSink> {
    device: &'d mut Device<S>,
    cone_clip: Option<f64>,
    count: usize,
}

impl<'d, S: DrawSink> Emitter<'d, S> {
    pub fn new(device: &'d mut Device<S>) -> Self {
        Self {
            device,
            cone_clip: None,
            count: 0,
        }
    }

    /// Clip every later segment to the cone of cosine `cos_limit`.
    pub fn clip_to_cone(&mut self, cos_limit: f64) {
        self.cone_clip = Some(cos_limit);
    }

    pub fn emit(&mut self, seg: Segment, color: LineColor) -> RenderResult<()> {
        let (b, e) = match self.cone_clip {
            Some(cos) => clip_to_fov_cone(seg.begin, seg.end, cos),
            None => (seg.begin, seg.end),
        };
        self.count += 1;
        self.device.draw(b, e, color)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn flush(&mut self) -> RenderResult<()> {
        self.device.flush()
    }
}
