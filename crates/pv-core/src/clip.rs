//! Segment clipping
//!
//! Clips straight 3D segments against the boundaries the visibility engine
//! cares about: the limit cone around the optic axis, a cutting plane, and
//! an ellipse seen by central projection from a reference point.

use glam::DVec3;

use crate::constants::{QUANTA, SKIP_BANDS, SKIP_SMALLEST};
use crate::ellipse::PlaneEllipse;
use crate::math::{lincomb, opposite_signs, round_half_away, same_signs, vhat};

/// Standard-table step to use when sampling a curve of semi-major axis
/// `major` centered at `center`, for a field of view of tangent radius
/// `fov_radius`. Small curves are sampled coarsely.
pub fn skip_count(major: f64, center: DVec3, fov_radius: f64) -> usize {
    let distance = center.length();
    let ratio = if distance > 0.0 && fov_radius > 0.0 {
        major / (distance * fov_radius)
    } else {
        1.0
    };
    SKIP_BANDS
        .iter()
        .find(|(threshold, _)| ratio > *threshold)
        .map_or(SKIP_SMALLEST, |(_, skip)| *skip)
}

/// Clip segment `p`–`q` to the cone of half-angle `acos(cos_fov)` around +z.
///
/// Segments entirely inside come back unchanged. When no usable crossing
/// exists the segment collapses to a single point on the cone boundary, which
/// draws nothing but keeps polyline continuity.
pub fn clip_to_fov_cone(p: DVec3, q: DVec3, cos_fov: f64) -> (DVec3, DVec3) {
    let pz = vhat(p).z;
    let qz = vhat(q).z;
    if pz >= cos_fov && qz >= cos_fov {
        return (p, q);
    }

    let cossqr = cos_fov * cos_fov;
    let collapsed = || {
        let point = DVec3::new((1.0 - cossqr).sqrt(), 0.0, cos_fov);
        (point, point)
    };

    let d = q - p;
    let c = p.z * p.z - cossqr * p.dot(p);
    let b = p.z * d.z - cossqr * p.dot(d);
    let a = d.z * d.z - cossqr * d.dot(d);
    let discrm = b * b - a * c;

    let mut roots: Vec<f64> = Vec::with_capacity(2);
    if discrm <= 0.0 {
        return collapsed();
    } else if a == 0.0 {
        if b == 0.0 {
            return collapsed();
        }
        roots.push(-c / b);
    } else {
        let sq = discrm.sqrt();
        roots.push((-b + sq) / a);
        roots.push((-b - sq) / a);
    }
    roots.retain(|t| *t > 0.0 && *t < 1.0);
    if roots.is_empty() {
        return collapsed();
    }

    let lerp = |t: f64| lincomb(1.0 - t, p, t, q);
    if pz >= cos_fov && qz < cos_fov {
        (p, lerp(roots.iter().copied().fold(f64::INFINITY, f64::min)))
    } else if pz < cos_fov && qz >= cos_fov {
        (lerp(roots.iter().copied().fold(f64::NEG_INFINITY, f64::max)), q)
    } else if p.z > 0.0 && q.z > 0.0 && roots.len() >= 2 {
        (lerp(roots[0]), lerp(roots[1]))
    } else {
        collapsed()
    }
}

/// True when segment `p`–`q` lies on the same side of the plane through
/// `center` with normal `normal` as `reference`.
///
/// A segment that straddles the plane is judged by the endpoint farther
/// from it.
pub fn same_side(p: DVec3, q: DVec3, normal: DVec3, center: DVec3, reference: DVec3) -> bool {
    let c = center.dot(normal);
    let rside = reference.dot(normal) - c;
    let testp = rside * (p.dot(normal) - c);
    let testq = rside * (q.dot(normal) - c);

    if testp >= 0.0 && testq >= 0.0 {
        return true;
    }
    if testp <= 0.0 && testq <= 0.0 {
        return false;
    }
    if testp.abs() <= testq.abs() {
        testq >= 0.0
    } else {
        testp >= 0.0
    }
}

/// One piece of a clipped segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSegment {
    /// Start point.
    pub begin: DVec3,
    /// End point.
    pub end: DVec3,
    /// The piece projects inside the ellipse.
    pub inside: bool,
    /// The piece lies beyond the ellipse plane as seen from the reference point.
    pub behind: bool,
}

/// Split segment `p`–`q` where its central projection from `reference`
/// onto the plane of `ellipse` crosses the ellipse, and where the segment
/// itself crosses that plane.
///
/// # Algorithm
///
/// Each endpoint is projected onto the plane along the ray from `reference`.
/// In the ellipse's own coordinates the projected segment is a straight line,
/// so its crossings with the ellipse solve a quadratic in the projected
/// parameter, which is then mapped back to the original (perspective)
/// parameter. If the segment passes through the plane parallel to the ellipse
/// plane through `reference`, one endpoint projects to infinity; the segment
/// is first cut at a sub-split point so that both halves project finitely.
///
/// Crossing parameters are fattened to `±1/QUANTA` and overlapping
/// fattened intervals are merged, so crossings that round-off placed a hair
/// apart collapse into one. The pieces therefore leave tiny gaps at every
/// crossing rather than overlapping.
///
/// Returns one to five pieces ordered from `p` to `q`. A segment that cannot
/// be projected comes back whole with both flags false.
pub fn clip_segment_to_ellipse(
    p: DVec3,
    q: DVec3,
    ellipse: &PlaneEllipse,
    reference: DVec3,
) -> Vec<SubSegment> {
    let unclipped = || {
        vec![SubSegment {
            begin: p,
            end: q,
            inside: false,
            behind: false,
        }]
    };

    let normal = ellipse.normal;
    let mut pref = p - reference;
    let mut qref = q - reference;
    let cref = ellipse.center - reference;

    let num = normal.dot(cref);
    let denomp = normal.dot(pref);
    let denomq = normal.dot(qref);

    let aquad = ellipse.major.dot(ellipse.major).powi(2);
    let bquad = ellipse.minor.dot(ellipse.minor).powi(2);

    let behind = if num != denomp {
        opposite_signs(num - denomp, num)
    } else if num != denomq {
        opposite_signs(num - denomq, num)
    } else {
        false
    };

    let crossing = if opposite_signs(denomp - num, denomq - num) {
        ((num - denomp) / (denomq - denomp)).clamp(0.0, 1.0)
    } else {
        2.0
    };

    // Position of a projected point relative to the ellipse, in units of
    // the axis lengths squared.
    let ellipse_coords = |pt: DVec3, scale: f64| {
        let c = pt * scale - cref;
        (ellipse.major.dot(c), ellipse.minor.dot(c))
    };

    let mut breaks: Vec<f64> = Vec::with_capacity(3);
    let mut flags: Vec<bool> = Vec::with_capacity(6);

    if !same_signs(denomp, denomq) {
        // One endpoint projects through infinity.
        let mut tsub = 0.0;
        let (tempp, tempq);
        if !same_signs(denomp, num) {
            tsub = if denomp == 0.0 {
                0.5
            } else {
                (1.0 + denomp / (denomq - denomp)) * 0.5
            };
            pref = lincomb(1.0 - tsub, pref, tsub, qref);
            tempp = normal.dot(pref);
            tempq = denomq;
        } else if !same_signs(denomq, num) {
            tsub = if denomq == 0.0 {
                0.5
            } else {
                denomp / (denomq - denomp) * 0.5
            };
            qref = lincomb(1.0 - tsub, pref, tsub, qref);
            tempp = denomp;
            tempq = normal.dot(qref);
        } else {
            return unclipped();
        }

        if tempp == 0.0 || tempq == 0.0 || aquad == 0.0 || bquad == 0.0 {
            return unclipped();
        }

        let (majorp, minorp) = ellipse_coords(pref, num / tempp);
        let (majorq, minorq) = ellipse_coords(qref, num / tempq);
        let insidp = majorp * majorp / aquad + minorp * minorp / bquad;

        let alpha = (majorp - majorq).powi(2) / aquad + (minorp - minorq).powi(2) / bquad;
        let beta = majorp * (majorq - majorp) / aquad + minorp * (minorq - minorp) / bquad;
        let gamma = insidp - 1.0;
        let discrm = beta * beta - alpha * gamma;

        if discrm > 0.0 && alpha != 0.0 {
            let sq = discrm.sqrt();
            let mut t = [0.0; 2];
            for (slot, s) in t.iter_mut().zip([(-beta - sq) / alpha, (-beta + sq) / alpha]) {
                let a_v = s * tempp;
                let b_v = (1.0 - s) * tempq;
                let denom = b_v + a_v;
                let s = if denom != 0.0 { a_v / denom } else { 0.5 };
                if denomp <= 0.0 {
                    *slot = tsub + (1.0 - tsub) * s;
                } else if denomq <= 0.0 {
                    *slot = tsub * s;
                }
            }
            if t[0] > t[1] {
                t.swap(0, 1);
            }

            let entering = denomp * num <= 0.0;
            let single = |t: f64, breaks: &mut Vec<f64>, flags: &mut Vec<bool>| {
                breaks.push(t);
                flags.extend([!entering, entering]);
            };
            if t[0] > 0.0 && t[1] < 1.0 {
                breaks.extend(t);
                flags.extend([false, true, false]);
            } else if t[0] <= 0.0 {
                if t[1] > 0.0 && t[1] < 1.0 {
                    single(t[1], &mut breaks, &mut flags);
                }
            } else if t[1] >= 1.0 && t[0] > 0.0 && t[0] < 1.0 {
                single(t[0], &mut breaks, &mut flags);
            }
        }
    } else if denomp != 0.0 && denomq != 0.0 && num / denomp > 0.0 && num / denomq > 0.0 {
        // Both endpoints project in front of the reference point.
        if aquad == 0.0 || bquad == 0.0 {
            return unclipped();
        }

        let (majorp, minorp) = ellipse_coords(pref, num / denomp);
        let (majorq, minorq) = ellipse_coords(qref, num / denomq);
        let insidp = majorp * majorp / aquad + minorp * minorp / bquad;
        let insidq = majorq * majorq / aquad + minorq * minorq / bquad;

        if insidq <= 1.0 && insidp <= 1.0 {
            flags.push(true);
        } else {
            let alpha = (majorp - majorq).powi(2) / aquad + (minorp - minorq).powi(2) / bquad;
            let beta = majorp * (majorq - majorp) / aquad + minorp * (minorq - minorp) / bquad;
            let gamma = insidp - 1.0;
            let discrm = beta * beta - alpha * gamma;
            let solvable = discrm > 0.0 && alpha != 0.0;

            if insidq < 1.0 && insidp > 1.0 && solvable {
                breaks.push((-beta - discrm.sqrt()) / alpha);
                flags.extend([false, true]);
            } else if insidp < 1.0 && insidq > 1.0 && solvable {
                let t = (-beta + discrm.sqrt()) / alpha;
                // Nudge the exit point outward so the inside piece does not
                // reach back over the limb.
                breaks.push(t + (1.0 - t) * 0.01);
                flags.extend([true, false]);
            } else if solvable
                && gamma >= 0.0
                && beta < 0.0
                && -beta < alpha
                && alpha + beta + beta + gamma >= 0.0
            {
                if gamma == 0.0 {
                    breaks.push(-2.0 * beta / alpha);
                    flags.extend([true, false]);
                } else if alpha + beta + beta + gamma == 0.0 {
                    breaks.push((-beta - discrm.sqrt()) / alpha);
                    flags.extend([false, true]);
                } else {
                    let sq = discrm.sqrt();
                    breaks.extend([(-beta - sq) / alpha, (-beta + sq) / alpha]);
                    flags.extend([false, true, false]);
                }
            }
        }

        // Back from the projected parameter to the segment parameter.
        for t in breaks.iter_mut() {
            let a_v = *t * denomp;
            let b_v = (1.0 - *t) * denomq;
            let denom = b_v + a_v;
            *t = if denom != 0.0 { a_v / denom } else { 0.5 };
        }
    } else {
        return unclipped();
    }

    if flags.is_empty() {
        flags.push(false);
    }

    let mut ts: Vec<f64> = Vec::with_capacity(breaks.len() + 3);
    ts.push(0.0);
    ts.extend(breaks);
    ts.push(1.0);
    flags.resize(ts.len(), false);

    if crossing > 0.0 && crossing < 1.0 {
        let i = ts
            .iter()
            .position(|t| crossing <= *t)
            .unwrap_or(ts.len());
        ts.insert(i, crossing);
        let carried = flags.get(i).copied().unwrap_or(false);
        flags.insert(i, carried);
    }

    let n = ts.len();
    let mut tl = vec![0.0; n];
    let mut tu = vec![0.0; n];
    tl[n - 1] = 1.0;
    tu[n - 1] = 1.0;

    let mut last = n - 1;
    if n > 2 {
        for i in 1..n - 1 {
            let q = round_half_away(QUANTA * ts[i]);
            tl[i] = ((q - 1.0) / QUANTA).max(0.0);
            tu[i] = ((q + 1.0) / QUANTA).min(1.0);
        }

        let mut j = 1;
        for i in 1..n - 1 {
            if tu[j] >= tl[i] {
                tu[j] = tu[i];
                flags[j] = flags[i];
            } else {
                j += 1;
                tl[j] = tl[i];
                tu[j] = tu[i];
                flags[j] = flags[i];
            }
        }
        j += 1;
        tl[j] = 1.0;
        tu[j] = 1.0;
        last = j;
    }

    (0..last)
        .map(|i| SubSegment {
            begin: lincomb(1.0 - tu[i], p, tu[i], q),
            end: lincomb(1.0 - tl[i + 1], p, tl[i + 1], q),
            inside: flags[i],
            behind: if crossing > tu[i] { behind } else { !behind },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_circle_at(z: f64) -> PlaneEllipse {
        PlaneEllipse {
            normal: DVec3::Z,
            major: DVec3::X,
            minor: DVec3::Y,
            center: DVec3::new(0.0, 0.0, z),
            visible: true,
        }
    }

    #[test]
    fn test_skip_count_bands() {
        let center = DVec3::new(0.0, 0.0, 10.0);
        assert_eq!(skip_count(3.0, center, 1.0), 1);
        assert_eq!(skip_count(1.5, center, 1.0), 2);
        assert_eq!(skip_count(0.5, center, 1.0), 3);
        assert_eq!(skip_count(0.2, center, 1.0), 4);
        assert_eq!(skip_count(0.05, center, 1.0), 6);
        assert_eq!(skip_count(0.05, DVec3::ZERO, 1.0), 1);
    }

    #[test]
    fn test_fov_clip_inside_is_unchanged() {
        let p = DVec3::new(0.1, 0.0, 1.0);
        let q = DVec3::new(-0.2, 0.3, 2.0);
        assert_eq!(clip_to_fov_cone(p, q, 0.5), (p, q));
    }

    #[test]
    fn test_fov_clip_outside_collapses_to_boundary_point() {
        let cos_fov = 0.5;
        let p = DVec3::new(5.0, 0.0, -1.0);
        let q = DVec3::new(5.0, 1.0, -1.0);
        let (a, b) = clip_to_fov_cone(p, q, cos_fov);
        assert_eq!(a, b);
        assert_abs_diff_eq!(a.x, (1.0 - cos_fov * cos_fov).sqrt());
        assert_eq!(a.z, cos_fov);
    }

    #[test]
    fn test_fov_clip_exit_lands_on_cone() {
        let cos_fov = std::f64::consts::FRAC_1_SQRT_2;
        let p = DVec3::new(0.0, 0.0, 1.0);
        let q = DVec3::new(3.0, 0.0, 1.0);
        let (a, b) = clip_to_fov_cone(p, q, cos_fov);
        assert_eq!(a, p);
        assert_abs_diff_eq!(b.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vhat(b).z, cos_fov, epsilon = 1e-12);
    }

    #[test]
    fn test_same_side() {
        let n = DVec3::Z;
        let c = DVec3::ZERO;
        let r = DVec3::new(0.0, 0.0, -1.0);
        assert!(same_side(DVec3::new(1.0, 0.0, -1.0), DVec3::new(2.0, 0.0, -3.0), n, c, r));
        assert!(!same_side(DVec3::new(1.0, 0.0, 1.0), DVec3::new(2.0, 0.0, 3.0), n, c, r));
        // Straddling: the endpoint farther from the plane decides.
        assert!(same_side(DVec3::new(1.0, 0.0, 0.1), DVec3::new(2.0, 0.0, -3.0), n, c, r));
        assert!(!same_side(DVec3::new(1.0, 0.0, 3.0), DVec3::new(2.0, 0.0, -0.1), n, c, r));
    }

    #[test]
    fn test_clip_segment_crossing_ellipse() {
        // Viewer at the origin, unit circle at z = 10, segment at z = 5
        // spanning x in [-1, 1]. Its projection spans x in [-2, 2].
        let ellipse = unit_circle_at(10.0);
        let p = DVec3::new(-1.0, 0.0, 5.0);
        let q = DVec3::new(1.0, 0.0, 5.0);
        let subs = clip_segment_to_ellipse(p, q, &ellipse, DVec3::ZERO);
        assert_eq!(subs.len(), 3);
        assert_eq!(
            subs.iter().map(|s| s.inside).collect::<Vec<_>>(),
            vec![false, true, false]
        );
        assert!(subs.iter().all(|s| !s.behind), "segment is in front of the plane");
        assert_abs_diff_eq!(subs[1].begin.x, -0.5, epsilon = 1e-7);
        assert_abs_diff_eq!(subs[1].end.x, 0.5, epsilon = 1e-7);
        assert_eq!(subs[0].begin, p);
        assert_eq!(subs[2].end, q);
    }

    #[test]
    fn test_clip_segment_behind_plane() {
        let ellipse = unit_circle_at(10.0);
        let p = DVec3::new(-0.1, 0.0, 20.0);
        let q = DVec3::new(0.1, 0.0, 20.0);
        let subs = clip_segment_to_ellipse(p, q, &ellipse, DVec3::ZERO);
        assert_eq!(subs.len(), 1);
        assert!(subs[0].inside && subs[0].behind);
    }

    #[test]
    fn test_clip_segment_through_plane_inserts_crossing() {
        let ellipse = unit_circle_at(10.0);
        let p = DVec3::new(0.0, 0.1, 5.0);
        let q = DVec3::new(0.0, 0.1, 15.0);
        let subs = clip_segment_to_ellipse(p, q, &ellipse, DVec3::ZERO);
        assert_eq!(subs.len(), 2);
        assert!(!subs[0].behind && subs[1].behind);
        assert_abs_diff_eq!(subs[0].end.z, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reclipping_inside_piece_is_stable() {
        let ellipse = unit_circle_at(10.0);
        let subs = clip_segment_to_ellipse(
            DVec3::new(-1.0, 0.2, 5.0),
            DVec3::new(1.0, 0.2, 5.0),
            &ellipse,
            DVec3::ZERO,
        );
        let inner = subs.iter().find(|s| s.inside).copied().unwrap();
        let again = clip_segment_to_ellipse(inner.begin, inner.end, &ellipse, DVec3::ZERO);
        assert_eq!(again.len(), 1);
        assert!(again[0].inside);
        assert_abs_diff_eq!(again[0].begin.x, inner.begin.x, epsilon = 1e-7);
        assert_abs_diff_eq!(again[0].end.x, inner.end.x, epsilon = 1e-7);
    }

    #[test]
    fn test_unprojectable_segment_is_returned_whole() {
        let ellipse = unit_circle_at(10.0);
        let p = DVec3::new(0.0, 0.0, -5.0);
        let q = DVec3::new(1.0, 0.0, -5.0);
        let subs = clip_segment_to_ellipse(p, q, &ellipse, DVec3::ZERO);
        assert_eq!(subs, vec![SubSegment { begin: p, end: q, inside: false, behind: false }]);
    }
}
