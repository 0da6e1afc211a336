//! Occluder and eclipse searches, and the clips that apply them

use glam::DVec3;
use pv_core::constants::MAX_SEGMENTS;
use pv_core::{DiskOverlap, SubSegment, clip_segment_to_ellipse, disk_overlap, same_side};

use super::{Emitter, Requirement, Segment, Shading};
use crate::device::DrawSink;
use crate::error::{RenderError, RenderResult};
use crate::scene::{Scene, SceneBody};

/// Which test decides that a containing body is wholly in front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepthRule {
    /// The occluder's center is nearer than the entity's near side
    CenterNearer,
    /// The occluder's far side is nearer than the entity's near side
    WholeNearer,
}

/// How an entity looks from the observer, for occluder searches
#[derive(Debug, Clone, Copy)]
pub(crate) struct Silhouette {
    /// Direction of the disk compared against other limbs. `None` means the
    /// observer is too close for a disk test and every nearby body counts.
    pub disk: Option<DVec3>,
    pub radius: f64,
    pub distance: f64,
    pub exclude: Option<usize>,
    pub depth: DepthRule,
}

/// Result of an occluder search
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Occluders {
    /// One body hides the entity entirely
    Hidden(usize),
    /// Bodies whose limbs may cover part of the entity
    Candidates(Vec<usize>),
}

/// Find bodies that may hide part or all of an entity.
pub(crate) fn find_occluders(scene: &Scene, target: &Silhouette) -> Occluders {
    let far = target.distance + target.radius;
    let near = target.distance - target.radius;
    let mut candidates = Vec::new();

    for (i, other) in scene.bodies().iter().enumerate() {
        if Some(i) == target.exclude || !other.limb.visible {
            continue;
        }
        let other_distance = other.center.length();
        if other_distance - other.largest >= far {
            continue;
        }
        let Some(disk) = target.disk else {
            candidates.push(i);
            continue;
        };
        match disk_overlap(disk, target.radius, other.limb.center, other.largest) {
            DiskOverlap::SecondInsideFirst | DiskOverlap::Partial => candidates.push(i),
            DiskOverlap::FirstInsideSecond => {
                candidates.push(i);
                let in_front = match target.depth {
                    DepthRule::CenterNearer => other_distance < near,
                    DepthRule::WholeNearer => other_distance + other.smallest < near,
                };
                if in_front
                    && disk_overlap(disk, target.radius, other.center, other.smallest)
                        == DiskOverlap::FirstInsideSecond
                {
                    return Occluders::Hidden(i);
                }
            }
            DiskOverlap::Disjoint | DiskOverlap::Degenerate => {}
        }
    }
    Occluders::Candidates(candidates)
}

/// Bodies that may shadow an entity, per light source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Eclipsers {
    /// Candidate bodies for each light, in body order
    pub candidates: Vec<Vec<usize>>,
    /// Lights that some body cuts off from the whole entity
    pub eclipsed: Vec<bool>,
}

impl Eclipsers {
    /// Lights with at least one candidate
    pub fn partial(&self) -> i64 {
        self.candidates.iter().filter(|c| !c.is_empty()).count() as i64
    }

    /// Lights that are blocked entirely
    pub fn total(&self) -> i64 {
        self.eclipsed.iter().filter(|e| **e).count() as i64
    }
}

/// Find, for each light, the bodies whose shadow cones may reach the
/// sphere of `radius` around `center`.
pub(crate) fn find_eclipsers(
    scene: &Scene,
    center: DVec3,
    radius: f64,
    exclude: Option<usize>,
) -> Eclipsers {
    let mut result = Eclipsers::default();

    for (j, light) in scene.lights().iter().enumerate() {
        let distance = (center - light.position).length();
        let far = distance + radius;
        let near = distance - radius;
        let mut candidates = Vec::new();
        let mut eclipsed = false;

        for (i, other) in scene.bodies().iter().enumerate() {
            if eclipsed {
                break;
            }
            let cone = &other.cones[j];
            if Some(i) == exclude || !cone.exists {
                continue;
            }
            let other_distance = (other.center - light.position).length();
            if other_distance - other.largest >= far {
                continue;
            }

            let from_vertex = center - cone.vertex;
            let length = from_vertex.length();
            let ratio = if length > 0.0 { radius / length } else { 1.0 };
            let shrink = 1.0 - ratio * ratio;
            if shrink <= 0.0 {
                candidates.push(i);
                continue;
            }

            let disk = from_vertex * shrink;
            let shadow = cone.terminator.center - cone.vertex;
            match disk_overlap(disk, radius, shadow, other.largest) {
                DiskOverlap::SecondInsideFirst | DiskOverlap::Partial => candidates.push(i),
                DiskOverlap::FirstInsideSecond => {
                    candidates.push(i);
                    if other_distance + other.smallest < near {
                        eclipsed = disk_overlap(disk, radius, other.center - cone.vertex, other.smallest)
                            == DiskOverlap::FirstInsideSecond;
                    }
                }
                DiskOverlap::Disjoint | DiskOverlap::Degenerate => {}
            }
        }

        result.candidates.push(candidates);
        result.eclipsed.push(eclipsed);
    }
    result
}

pub(crate) fn check_budget(count: usize) -> RenderResult<()> {
    if count > MAX_SEGMENTS {
        return Err(RenderError::SegmentBudgetExceeded {
            count,
            max: MAX_SEGMENTS,
        });
    }
    Ok(())
}

fn hidden(s: &SubSegment) -> bool {
    s.behind && s.inside
}

/// Remove the parts of `segments` that lie behind any occluder's limb.
///
/// Pieces split off by one occluder go back on the work list and are tested
/// against every occluder again.
pub(crate) fn clip_occluded(
    scene: &Scene,
    mut segments: Vec<Segment>,
    occluders: &[usize],
) -> RenderResult<Vec<Segment>> {
    let mut kept = Vec::with_capacity(segments.len());
    let mut i = 0;
    while i < segments.len() {
        let mut seg = segments[i];
        let mut saved = true;

        for &j in occluders {
            let limb = &scene.bodies()[j].limb;
            let pieces = clip_segment_to_ellipse(seg.begin, seg.end, limb, DVec3::ZERO);
            match pieces.iter().position(|p| !hidden(p)) {
                Some(first) => {
                    seg = pieces[first].into();
                    segments.extend(
                        pieces[first + 1..]
                            .iter()
                            .filter(|p| !hidden(p))
                            .map(|p| Segment::from(*p)),
                    );
                }
                None => {
                    saved = false;
                    break;
                }
            }
        }
        check_budget(segments.len())?;

        if saved {
            kept.push(seg);
        }
        i += 1;
    }
    Ok(kept)
}

/// Emit `bright` segments as lit or dark according to the shadows cast on
/// them.
///
/// `own` is the body the segments belong to; its own terminator is checked
/// before any other body's shadow. Ring segments pass `None`.
pub(crate) fn resolve_eclipses<S: DrawSink>(
    scene: &Scene,
    mut bright: Vec<Segment>,
    eclipsers: &Eclipsers,
    need: Requirement,
    own: Option<&SceneBody>,
    shading: Shading,
    out: &mut Emitter<'_, S>,
) -> RenderResult<()> {
    if eclipsers.total() >= need.dark {
        for seg in bright {
            out.emit(seg, shading.dark)?;
        }
        return Ok(());
    }
    if eclipsers.partial() == 0 {
        for seg in bright {
            out.emit(seg, shading.lit)?;
        }
        return Ok(());
    }

    let lights = scene.lights();
    let mut i = 0;
    while i < bright.len() {
        let mut seg = bright[i];
        let mut dark = 0_i64;
        let mut lit = 0_i64;
        let (mut not_eclipsed, mut not_lit) = match own {
            Some(_) => (dark < need.dark, lit < need.sources),
            None => (true, true),
        };

        let mut ls = 0;
        while ls < lights.len() && not_eclipsed && not_lit {
            let light = lights[ls].position;
            let dark_before = dark;
            let mut unknown = true;

            if let Some(body) = own {
                let cone = &body.cones[ls];
                if cone.exists
                    && !same_side(
                        seg.begin,
                        seg.end,
                        cone.terminator.normal,
                        cone.terminator.center,
                        light,
                    )
                {
                    dark += 1;
                    unknown = false;
                }
            }

            not_eclipsed = dark < need.dark;
            not_lit = lit < need.sources;
            let candidates = &eclipsers.candidates[ls];
            let mut k = 0;
            unknown = unknown && not_eclipsed && not_lit && k < candidates.len();

            while unknown {
                let cone = &scene.bodies()[candidates[k]].cones[ls];
                let pieces =
                    clip_segment_to_ellipse(seg.begin, seg.end, &cone.terminator, cone.vertex);
                if pieces.len() > 1 {
                    seg = pieces[0].into();
                    bright.extend(pieces[1..].iter().map(|p| Segment::from(*p)));
                    check_budget(bright.len())?;
                }
                if pieces.first().is_some_and(|p| p.inside)
                    && !same_side(
                        seg.begin,
                        seg.end,
                        cone.terminator.normal,
                        cone.terminator.center,
                        light,
                    )
                {
                    dark += 1;
                    unknown = false;
                }
                k += 1;
                unknown = unknown && k < candidates.len();
                not_eclipsed = dark < need.dark;
            }

            if dark_before == dark {
                lit += 1;
            }
            not_lit = lit < need.sources;
            ls += 1;
        }

        let color = if not_eclipsed { shading.lit } else { shading.dark };
        out.emit(seg, color)?;
        i += 1;
    }
    Ok(())
}
