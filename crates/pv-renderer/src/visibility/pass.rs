//! The per-entity stage machine shared by bodies and rings

use glam::DVec3;
use pv_core::{DiskOverlap, disk_overlap, skip_count};

use super::body::{BodyDrawable, RenderPlane, build_planes, classify_illumination, sample_plane};
use super::ring::{RingDrawable, sample_ring};
use super::shadow::{
    DepthRule, Eclipsers, Occluders, Silhouette, clip_occluded, find_eclipsers, find_occluders,
    resolve_eclipses,
};
use super::{Emitter, Outcome, Requirement, Segment, Shading, Stage};
use crate::device::{Device, DrawSink};
use crate::error::RenderResult;
use crate::scene::{Scene, SceneBody};

/// Camera-frame geometry of the entity being drawn
enum Shape<'s> {
    Body {
        index: usize,
        body: &'s SceneBody,
        meridians: usize,
        latitudes: usize,
    },
    Ring {
        center: DVec3,
        major: DVec3,
        minor: DVec3,
        largest: f64,
    },
}

impl Shape<'_> {
    /// Center and radius of the disk tested against the field of view
    fn view_disk(&self) -> (DVec3, f64) {
        match self {
            Self::Body { body, .. } => (body.limb.center, body.largest),
            Self::Ring { center, largest, .. } => (*center, *largest),
        }
    }

    /// Ratio used to pull a ring's disk test toward the observer. Bodies
    /// are tested at their limb center instead.
    fn ring_shrink(center: DVec3, largest: f64) -> f64 {
        let distance = center.length();
        let ratio = if distance > 0.0 { largest / distance } else { 1.0 };
        1.0 - ratio * ratio
    }

    fn silhouette(&self) -> Silhouette {
        match self {
            Self::Body { index, body, .. } => Silhouette {
                disk: Some(body.limb.center),
                radius: body.largest,
                distance: body.center.length(),
                exclude: Some(*index),
                depth: DepthRule::CenterNearer,
            },
            Self::Ring { center, largest, .. } => {
                let shrink = Self::ring_shrink(*center, *largest);
                Silhouette {
                    disk: (shrink > 0.0).then(|| *center * shrink),
                    radius: *largest,
                    distance: center.length(),
                    exclude: None,
                    depth: DepthRule::WholeNearer,
                }
            }
        }
    }

    /// True when the entity reaches outside the limit cone, so segments
    /// must be clipped to it before projection.
    fn beyond_limit(&self, tan_limit: f64) -> bool {
        match self {
            Self::Body { body, .. } => {
                disk_overlap(body.limb.center, body.largest, DVec3::Z, tan_limit)
                    != DiskOverlap::FirstInsideSecond
            }
            Self::Ring { center, largest, .. } => {
                Self::ring_shrink(*center, *largest) < 0.0
                    || disk_overlap(*center, *largest, DVec3::Z, tan_limit)
                        != DiskOverlap::FirstInsideSecond
            }
        }
    }

    fn eclipse_target(&self) -> (DVec3, f64, Option<usize>) {
        match self {
            Self::Body { index, body, .. } => (body.center, body.largest, Some(*index)),
            Self::Ring { center, largest, .. } => (*center, *largest, None),
        }
    }

    fn own_body(&self) -> Option<&SceneBody> {
        match self {
            Self::Body { body, .. } => Some(body),
            Self::Ring { .. } => None,
        }
    }
}

/// One entity's trip through the stages
pub(crate) struct Pass<'s> {
    scene: &'s Scene,
    shape: Shape<'s>,
    shading: Shading,
    need: Requirement,
    stage: Stage,
    beyond_limit: bool,
    occluders: Vec<usize>,
    eclipsers: Eclipsers,
    planes: Vec<RenderPlane>,
    outline_planes: usize,
    solve: Vec<bool>,
    skip: usize,
    segments: Vec<Segment>,
    bright: Vec<Segment>,
}

impl<'s> Pass<'s> {
    fn new(scene: &'s Scene, shape: Shape<'s>, shading: Shading, sources_required: usize) -> Self {
        Self {
            scene,
            shape,
            shading,
            need: Requirement::new(sources_required, scene.lights().len()),
            stage: Stage::FieldOfView,
            beyond_limit: false,
            occluders: Vec::new(),
            eclipsers: Eclipsers::default(),
            planes: Vec::new(),
            outline_planes: 0,
            solve: Vec::new(),
            skip: 1,
            segments: Vec::new(),
            bright: Vec::new(),
        }
    }

    pub fn for_body(
        scene: &'s Scene,
        index: usize,
        body: &'s SceneBody,
        drawable: &BodyDrawable,
    ) -> Self {
        let shape = Shape::Body {
            index,
            body,
            meridians: drawable.meridians,
            latitudes: drawable.latitudes,
        };
        Self::new(scene, shape, drawable.shading, drawable.sources_required)
    }

    pub fn for_ring(scene: &'s Scene, ring: &RingDrawable) -> Self {
        let major = scene.to_camera_vector(ring.major);
        let shape = Shape::Ring {
            center: scene.to_camera_point(ring.center),
            major,
            minor: scene.to_camera_vector(ring.minor),
            largest: major.length(),
        };
        let shading = Shading {
            terminator: ring.dark,
            lit: ring.lit,
            dark: ring.dark,
        };
        Self::new(scene, shape, shading, ring.sources_required)
    }

    /// Number of curves the entity is sampled into
    fn curve_count(&self) -> usize {
        match self.shape {
            Shape::Body { .. } => self.planes.len(),
            Shape::Ring { .. } => 1,
        }
    }

    /// Drive the entity through every stage.
    pub fn run<S: DrawSink>(mut self, device: &mut Device<S>) -> RenderResult<Outcome> {
        let mut out = Emitter::new(device);
        loop {
            if let Some(outcome) = self.step(&mut out)? {
                return Ok(outcome);
            }
        }
    }

    /// Perform the current stage and move to the next. Returns the outcome
    /// once the pass has finished.
    fn step<S: DrawSink>(&mut self, out: &mut Emitter<'_, S>) -> RenderResult<Option<Outcome>> {
        let view = self.scene.view();
        match self.stage {
            Stage::FieldOfView => {
                if let Shape::Body { body, index, .. } = self.shape
                    && !body.limb.visible
                {
                    tracing::debug!("Body {} limb not visible", index);
                    self.stage = Stage::Done;
                    return Ok(Some(Outcome::OutsideView));
                }
                let (center, radius) = self.shape.view_disk();
                if disk_overlap(center, radius, view.center(), view.radius()) == DiskOverlap::Disjoint
                {
                    tracing::debug!("Entity at {:?} outside field of view", center);
                    self.stage = Stage::Done;
                    return Ok(Some(Outcome::OutsideView));
                }
                self.stage = Stage::Occlusion;
            }
            Stage::Occlusion => {
                match find_occluders(self.scene, &self.shape.silhouette()) {
                    Occluders::Hidden(by) => {
                        tracing::debug!("Entity hidden by body {}", by);
                        self.stage = Stage::Done;
                        return Ok(Some(Outcome::Occluded));
                    }
                    Occluders::Candidates(c) => self.occluders = c,
                }
                self.beyond_limit = self.shape.beyond_limit(view.tan_limit());
                if self.beyond_limit {
                    out.clip_to_cone(view.cos_limit());
                }
                let (center, radius, exclude) = self.shape.eclipse_target();
                self.eclipsers = find_eclipsers(self.scene, center, radius, exclude);
                self.stage = Stage::Planes;
            }
            Stage::Planes => {
                match self.shape {
                    Shape::Body {
                        body,
                        meridians,
                        latitudes,
                        ..
                    } => {
                        (self.planes, self.outline_planes) =
                            build_planes(body, meridians, latitudes);
                        self.solve = vec![true; self.planes.len()];
                        self.skip = skip_count(body.largest, body.center, view.radius());
                    }
                    Shape::Ring {
                        center, largest, ..
                    } => {
                        self.skip = skip_count(largest, center, view.radius());
                    }
                }
                self.stage = Stage::CandidateArcs(0);
            }
            Stage::CandidateArcs(e) => {
                self.segments = match self.shape {
                    Shape::Body { .. } => sample_plane(
                        &self.planes,
                        e,
                        self.outline_planes,
                        &mut self.solve,
                        self.scene.circle(),
                        self.skip,
                    ),
                    Shape::Ring {
                        center,
                        major,
                        minor,
                        ..
                    } => sample_ring(center, major, minor, self.scene.circle(), self.skip),
                };
                self.stage = Stage::OccluderClip(e);
            }
            Stage::OccluderClip(e) => {
                let segments = std::mem::take(&mut self.segments);
                self.segments = clip_occluded(self.scene, segments, &self.occluders)?;
                self.stage = Stage::Illumination(e);
            }
            Stage::Illumination(e) => {
                let segments = std::mem::take(&mut self.segments);
                self.bright = match self.shape {
                    Shape::Body { body, .. } => classify_illumination(
                        self.scene,
                        body,
                        &self.planes[e],
                        &segments,
                        self.need,
                        self.shading,
                        out,
                    )?,
                    Shape::Ring { .. } => segments,
                };
                self.stage = Stage::Eclipse(e);
            }
            Stage::Eclipse(e) => {
                let bright = std::mem::take(&mut self.bright);
                resolve_eclipses(
                    self.scene,
                    bright,
                    &self.eclipsers,
                    self.need,
                    self.shape.own_body(),
                    self.shading,
                    out,
                )?;
                self.stage = if e + 1 < self.curve_count() {
                    Stage::CandidateArcs(e + 1)
                } else {
                    Stage::Done
                };
            }
            Stage::Done => {
                out.flush()?;
                return Ok(Some(Outcome::Drawn {
                    segments: out.count(),
                }));
            }
        }
        Ok(None)
    }
}
