//! Vector and matrix kernel
//!
//! Thin helpers over [`glam::DVec3`] and [`glam::DMat3`] that keep the exact
//! operation order of the classic navigation toolkit routines, so diagrams
//! come out byte for byte the same. Where glam's own method would round
//! differently (`normalize` multiplies by a reciprocal, for example) the helper
//! here divides explicitly.
//!
//! Matrices are stored with glam's column convention: a frame matrix holds
//! the frame's axes, expressed in the parent frame, as its columns.

use glam::{DMat3, DVec3};

/// Unit vector in the direction of `v`, or the zero vector when `v` is zero.
pub fn vhat(v: DVec3) -> DVec3 {
    let n = v.length();
    if n == 0.0 {
        return DVec3::ZERO;
    }
    DVec3::new(v.x / n, v.y / n, v.z / n)
}

/// Angular separation of two vectors in radians.
///
/// The cosine is clamped to `[-1, 1]` so nearly parallel vectors never
/// produce a NaN.
pub fn vsep(a: DVec3, b: DVec3) -> f64 {
    vhat(a).dot(vhat(b)).clamp(-1.0, 1.0).acos()
}

/// Linear combination `a * v1 + b * v2`.
pub fn lincomb(a: f64, v1: DVec3, b: f64, v2: DVec3) -> DVec3 {
    DVec3::new(
        a * v1.x + b * v2.x,
        a * v1.y + b * v2.y,
        a * v1.z + b * v2.z,
    )
}

/// Builds a right-handed orthonormal frame whose first axis is along `x`.
///
/// The second axis is perpendicular to `x` and to whichever coordinate axis
/// `x` is least aligned with (ties go to x, then y). Returns `(x̂, ŷ, ẑ)`.
pub fn frame(x: DVec3) -> (DVec3, DVec3, DVec3) {
    let xh = vhat(x);
    let (ax, ay, az) = (xh.x.abs(), xh.y.abs(), xh.z.abs());
    let reference = if ax <= ay && ax <= az {
        DVec3::X
    } else if ay <= ax && ay <= az {
        DVec3::Y
    } else {
        DVec3::Z
    };
    let y = vhat(xh.cross(reference));
    let z = xh.cross(y);
    (xh, y, z)
}

/// Rotates `v` about `axis` by `angle` radians (right-hand rule).
///
/// A zero axis leaves `v` unchanged.
pub fn rotate_about(v: DVec3, axis: DVec3, angle: f64) -> DVec3 {
    let ax = vhat(axis);
    if ax == DVec3::ZERO {
        return v;
    }
    let (sa, ca) = angle.sin_cos();
    let dot = v.dot(ax);
    let cross = ax.cross(v);
    v * ca + cross * sa + ax * (dot * (1.0 - ca))
}

/// Component of `a` perpendicular to `b`. Returns `a` when `b` is zero.
pub fn perpendicular(a: DVec3, b: DVec3) -> DVec3 {
    let bh = vhat(b);
    if bh == DVec3::ZERO {
        return a;
    }
    a - bh * a.dot(bh)
}

/// Expresses `v` in the frame whose axes are the columns of `m`
/// (that is, `mᵀ · v`).
pub fn to_frame(m: &DMat3, v: DVec3) -> DVec3 {
    DVec3::new(m.x_axis.dot(v), m.y_axis.dot(v), m.z_axis.dot(v))
}

/// Quadratic form `vᵀ · M · w`.
pub fn quadratic_form(v: DVec3, m: &DMat3, w: DVec3) -> f64 {
    v.dot(*m * w)
}

/// Rectangular coordinates from range, longitude (right ascension) and latitude.
pub fn radrec(range: f64, lon: f64, lat: f64) -> DVec3 {
    let cos_lat = lat.cos();
    DVec3::new(
        range * cos_lat * lon.cos(),
        range * cos_lat * lon.sin(),
        range * lat.sin(),
    )
}

/// Range, longitude in `[0, 2π)` and latitude of a rectangular vector.
pub fn recrad(v: DVec3) -> (f64, f64, f64) {
    let range = v.length();
    if range == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let mut lon = v.y.atan2(v.x);
    if lon < 0.0 {
        lon += std::f64::consts::TAU;
    }
    let lat = (v.z / range).clamp(-1.0, 1.0).asin();
    (range, lon, lat)
}

/// Frame whose x axis points along `primary` and whose z axis lies in the
/// plane of `primary` and `secondary`, on the side of `secondary`.
///
/// The returned matrix holds the frame axes as columns.
pub fn two_vector_frame(primary: DVec3, secondary: DVec3) -> DMat3 {
    let x = vhat(primary);
    let y = vhat(secondary.cross(x));
    let z = x.cross(y);
    DMat3::from_cols(x, y, z)
}

/// True when `a` and `b` are strictly of opposite sign.
pub fn opposite_signs(a: f64, b: f64) -> bool {
    (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0)
}

/// True when `a` and `b` share a sign; zero agrees with everything.
pub fn same_signs(a: f64, b: f64) -> bool {
    a * b >= 0.0
}

/// Rounds half away from zero, the convention used for every device
/// coordinate and quantized clip parameter.
pub fn round_half_away(x: f64) -> f64 {
    if x >= 0.0 {
        (x + 0.5).trunc()
    } else {
        -(-x + 0.5).trunc()
    }
}

/// Camera frame looking at right ascension `ra`, declination `dec`.
///
/// Column 3 (the optic axis) points at the target, column 2 is celestial
/// north projected onto the sky plane and column 1 completes the frame,
/// pointing toward increasing right ascension.
pub fn camera_frame(ra: f64, dec: f64) -> DMat3 {
    let col3 = radrec(1.0, ra, dec);
    let north = perpendicular(DVec3::Z, col3);
    let col2 = if north.length() >= 1.0e-12 {
        vhat(north)
    } else {
        DVec3::X
    };
    let col1 = col2.cross(col3);
    DMat3::from_cols(col1, col2, col3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_vhat_zero_stays_zero() {
        assert_eq!(vhat(DVec3::ZERO), DVec3::ZERO);
        assert_relative_eq!(vhat(DVec3::new(3.0, 4.0, 0.0)).length(), 1.0);
    }

    #[test]
    fn test_vsep_clamps_parallel_vectors() {
        let v = DVec3::new(1.0e-3, 7.0, -2.0);
        let sep = vsep(v, v * 3.0);
        assert!(sep.is_finite(), "separation of parallel vectors must be finite");
        assert!(sep < 1.0e-7);
        assert_relative_eq!(vsep(DVec3::X, -DVec3::X), PI);
    }

    #[test]
    fn test_frame_is_orthonormal() {
        let (x, y, z) = frame(DVec3::new(0.3, -2.0, 0.7));
        assert_relative_eq!(x.length(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(y.length(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(z.length(), 1.0, epsilon = 1e-15);
        assert!(x.dot(y).abs() < 1e-15);
        assert!(x.dot(z).abs() < 1e-15);
        assert!(y.dot(z).abs() < 1e-15);
        assert_relative_eq!(x.cross(y).dot(z), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_frame_reference_axis_tie_breaks_to_x() {
        // Equal components: x wins the tie, so y = x̂ × X.
        let (xh, y, _) = frame(DVec3::ONE);
        assert_relative_eq!(y.dot(DVec3::X), 0.0, epsilon = 1e-15);
        assert_relative_eq!(y.dot(xh), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_rotate_about_quarter_turn() {
        let r = rotate_about(DVec3::X, DVec3::Z, FRAC_PI_2);
        assert_relative_eq!(r.x, 0.0, epsilon = 1e-15);
        assert_relative_eq!(r.y, 1.0, epsilon = 1e-15);
        assert_eq!(rotate_about(DVec3::X, DVec3::ZERO, 1.0), DVec3::X);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_half_away(2.5), 3.0);
        assert_eq!(round_half_away(-2.5), -3.0);
        assert_eq!(round_half_away(2.49), 2.0);
        assert_eq!(round_half_away(-0.4), 0.0);
    }

    #[test]
    fn test_sign_predicates_treat_zero() {
        assert!(opposite_signs(1.0, -2.0));
        assert!(!opposite_signs(0.0, -2.0));
        assert!(same_signs(0.0, -2.0));
        assert!(!same_signs(3.0, -2.0));
    }

    #[test]
    fn test_camera_frame_looks_at_target() {
        let cam = camera_frame(1.2, 0.3);
        let target = radrec(1.0, 1.2, 0.3);
        let in_cam = to_frame(&cam, target);
        assert_relative_eq!(in_cam.z, 1.0, epsilon = 1e-14);
        assert!(in_cam.x.abs() < 1e-14 && in_cam.y.abs() < 1e-14);
        // North is up: a point slightly north of the target has positive y.
        let north = to_frame(&cam, radrec(1.0, 1.2, 0.31));
        assert!(north.y > 0.0);
        let east = to_frame(&cam, radrec(1.0, 1.21, 0.3));
        assert!(east.x > 0.0, "higher right ascension lies along +x");
    }

    #[test]
    fn test_recrad_inverts_radrec() {
        let (r, lon, lat) = recrad(radrec(2.0, 5.0, -0.4));
        assert_relative_eq!(r, 2.0, epsilon = 1e-14);
        assert_relative_eq!(lon, 5.0, epsilon = 1e-14);
        assert_relative_eq!(lat, -0.4, epsilon = 1e-14);
    }

    #[test]
    fn test_two_vector_frame_axes() {
        let m = two_vector_frame(DVec3::new(0.0, 5.0, 0.0), DVec3::new(0.0, 1.0, 1.0));
        assert_relative_eq!(m.x_axis.y, 1.0);
        assert_relative_eq!(m.z_axis.z, 1.0, epsilon = 1e-15);
        let v = to_frame(&m, DVec3::new(0.0, 2.0, 0.5));
        assert_relative_eq!(v.x, 2.0);
        assert_relative_eq!(v.z, 0.5, epsilon = 1e-15);
    }
}
