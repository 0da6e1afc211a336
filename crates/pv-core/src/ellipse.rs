//! Ellipse and cone geometry
//!
//! This module derives the ellipses that bound what can be seen of a triaxial
//! body: the limb as seen from a viewpoint, the terminator and eclipse cone
//! cast away from a spherical light source, plus the two small classification
//! helpers the visibility engine relies on (disk overlap on the sky and
//! ellipse/plane intersection).
//!
//! Every function here is total. Degenerate inputs (zero axes, a viewpoint
//! inside the body, an edge-on body) come back as a "not visible" or
//! "no intersection" result rather than an error.

use glam::{DMat3, DVec3};

use crate::constants::{CONE_PARALLEL_EPSILON, CONE_PARALLEL_SCALE, LIMB_DENOMINATOR_FLOOR};
use crate::math::{frame, lincomb, quadratic_form, vhat, vsep};

/// Three principal semi-axis vectors of a triaxial ellipsoid.
///
/// Each vector points along a principal axis and has the semi-axis length
/// as its magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axes(pub [DVec3; 3]);

impl Axes {
    /// Axes of a sphere of the given radius aligned with the coordinate axes.
    pub fn sphere(radius: f64) -> Self {
        Self([DVec3::X * radius, DVec3::Y * radius, DVec3::Z * radius])
    }

    /// Axes aligned with the columns of `orientation`, scaled by `radii`.
    pub fn from_frame(orientation: &DMat3, radii: DVec3) -> Self {
        Self([
            orientation.x_axis * radii.x,
            orientation.y_axis * radii.y,
            orientation.z_axis * radii.z,
        ])
    }

    /// Squared length of each axis.
    pub fn squared_lengths(&self) -> [f64; 3] {
        [
            self.0[0].dot(self.0[0]),
            self.0[1].dot(self.0[1]),
            self.0[2].dot(self.0[2]),
        ]
    }

    /// Length of each axis.
    pub fn lengths(&self) -> [f64; 3] {
        [self.0[0].length(), self.0[1].length(), self.0[2].length()]
    }

    /// Value of the body's implicit quadratic at offset `p` from its center
    /// (1 on the surface, above 1 outside).
    ///
    /// Returns `None` when any axis has zero length.
    pub fn implicit_value(&self, p: DVec3) -> Option<f64> {
        let [r1, r2, r3] = self.squared_lengths();
        if r1 == 0.0 || r2 == 0.0 || r3 == 0.0 {
            return None;
        }
        Some(
            self.0[0].dot(p).powi(2) / (r1 * r1)
                + self.0[1].dot(p).powi(2) / (r2 * r2)
                + self.0[2].dot(p).powi(2) / (r3 * r3),
        )
    }

    /// Apply a frame change to every axis.
    pub fn map(&self, f: impl Fn(DVec3) -> DVec3) -> Self {
        Self([f(self.0[0]), f(self.0[1]), f(self.0[2])])
    }

    /// Symmetric matrix `E` with `pᵀ E p` equal to [`Axes::implicit_value`].
    fn quadric(&self, squared: [f64; 3]) -> DMat3 {
        let s = [
            self.0[0] * (1.0 / squared[0]),
            self.0[1] * (1.0 / squared[1]),
            self.0[2] * (1.0 / squared[2]),
        ];
        let col = |j: usize| s[0] * s[0][j] + s[1] * s[1][j] + s[2] * s[2][j];
        DMat3::from_cols(col(0), col(1), col(2))
    }
}

/// An ellipse lying in a plane, as returned by the limb and terminator solvers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaneEllipse {
    /// Unit normal of the ellipse plane.
    pub normal: DVec3,
    /// Semi-major axis vector.
    pub major: DVec3,
    /// Semi-minor axis vector.
    pub minor: DVec3,
    /// Center of the ellipse.
    pub center: DVec3,
    /// False when the viewpoint lies inside (or on) the body.
    pub visible: bool,
}

impl PlaneEllipse {
    /// Point on the ellipse at parameter `(cos θ, sin θ)`.
    #[inline]
    pub fn point(&self, cos: f64, sin: f64) -> DVec3 {
        self.center + lincomb(cos, self.major, sin, self.minor)
    }

    /// Plane constant `normal · center`.
    #[inline]
    pub fn plane_constant(&self) -> f64 {
        self.center.dot(self.normal)
    }
}

/// Shadow cone cast by an ellipsoid away from a spherical light source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EclipseCone {
    /// Terminator ellipse; its normal points toward the illuminated side.
    pub terminator: PlaneEllipse,
    /// Cone apex.
    pub vertex: DVec3,
    /// Unit cone axis pointing from the light through the body.
    pub axis: DVec3,
    /// False when the body cannot cast a cone (source inside or too close).
    pub exists: bool,
}

/// Limb ellipse of a triaxial body seen from `viewpoint`.
///
/// # Algorithm
///
/// The body is the quadric `pᵀ E p = 1` around `center`. The limb lies in
/// the polar plane of the viewpoint, whose normal is `E · sight`. Restricting
/// `E` to an orthonormal basis `(u, v)` of that plane yields a 2×2 form whose
/// eigen-decomposition gives the axis lengths and the rotation angle:
///
/// ```text
/// a = sqrt((1 - λ) / (middle - radius))
/// b = sqrt((1 - λ) / (middle + radius))
/// ```
///
/// with `λ = 1 / (sightᵀ E sight)`. Nonpositive denominators are floored to
/// [`LIMB_DENOMINATOR_FLOOR`], and a form that is not positive definite
/// yields zero-length axes around a still-visible center.
pub fn compute_limb(axes: &Axes, center: DVec3, viewpoint: DVec3) -> PlaneEllipse {
    let squared = axes.squared_lengths();
    if squared.iter().any(|&r| r == 0.0) {
        return PlaneEllipse::default();
    }

    let sight = viewpoint - center;
    let outside = axes.implicit_value(sight).is_some_and(|q| q > 1.0);
    if !outside {
        return PlaneEllipse::default();
    }

    let e = axes.quadric(squared);
    let normal = vhat(e * sight);
    let (_, u, v) = frame(normal);

    let form = quadratic_form(sight, &e, sight);
    if form == 0.0 {
        return PlaneEllipse {
            normal,
            visible: true,
            ..Default::default()
        };
    }

    let lambda = 1.0 / form;
    let midpoint = center + sight * lambda;

    let alpha = quadratic_form(u, &e, u);
    let beta = quadratic_form(v, &e, u);
    let gamma = quadratic_form(v, &e, v);

    if alpha <= 0.0 || gamma <= 0.0 {
        return PlaneEllipse {
            normal,
            center: midpoint,
            visible: true,
            ..Default::default()
        };
    }

    let middle = (alpha + gamma) * 0.5;
    let half_diff = (alpha - gamma) * 0.5;
    let radius = DVec3::new(half_diff, beta, 0.0).length();

    let mut denom_a = middle - radius;
    let mut denom_b = middle + radius;
    if denom_a <= 0.0 {
        denom_a = LIMB_DENOMINATOR_FLOOR;
    }
    if denom_b <= 0.0 {
        denom_b = LIMB_DENOMINATOR_FLOOR;
    }

    let a = ((1.0 - lambda) / denom_a).sqrt();
    let b = ((1.0 - lambda) / denom_b).sqrt();

    let (ctheta, stheta) = if radius == 0.0 {
        (1.0, 0.0)
    } else {
        let c2theta = half_diff / radius;
        (
            ((1.0 + c2theta) * 0.5).sqrt(),
            ((1.0 - c2theta) * 0.5).sqrt().copysign(beta),
        )
    };

    PlaneEllipse {
        normal,
        major: lincomb(-stheta, u, ctheta, v) * a,
        minor: lincomb(ctheta, u, stheta, v) * b,
        center: midpoint,
        visible: true,
    }
}

/// Terminator ellipse and eclipse cone of a body lit by a spherical source.
///
/// The cone apex sits on the line from the source through the body center,
/// extrapolated by similar triangles using `largest / (radius - largest)`.
/// When the source radius and the body's largest axis nearly agree the cone
/// is treated as a cylinder and the apex is pushed out to
/// `largest · CONE_PARALLEL_SCALE`. The terminator is the limb of the body
/// seen from the apex, with its normal flipped toward the source.
pub fn compute_eclipse_cone(
    axes: &Axes,
    center: DVec3,
    source: DVec3,
    source_radius: f64,
) -> EclipseCone {
    let sight = center - source;
    let largest = axes.lengths().into_iter().fold(f64::MIN, f64::max);

    let exists = axes.implicit_value(sight).is_some_and(|q| q > 1.0)
        && sight.length() > largest + source_radius;
    if !exists {
        return EclipseCone::default();
    }

    let denom = source_radius - largest;
    let t = if denom.abs() <= CONE_PARALLEL_EPSILON {
        largest * CONE_PARALLEL_SCALE
    } else {
        largest / denom
    };

    let vertex = lincomb(1.0, center, t, sight);
    let axis = vhat(sight);

    let mut terminator = compute_limb(axes, center, vertex);
    if axis.dot(terminator.normal) < 0.0 {
        terminator.normal = -terminator.normal;
    }

    EclipseCone {
        exists: terminator.visible,
        terminator,
        vertex,
        axis,
    }
}

/// How two disks on the sky relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskOverlap {
    /// One of the centers was the zero vector.
    Degenerate,
    /// The disks are disjoint.
    Disjoint,
    /// Disk 1 lies entirely within disk 2.
    FirstInsideSecond,
    /// Disk 2 lies entirely within disk 1.
    SecondInsideFirst,
    /// The disks partially overlap.
    Partial,
}

impl DiskOverlap {
    /// True for any relation in which the disks share area.
    pub fn overlaps(self) -> bool {
        matches!(
            self,
            Self::FirstInsideSecond | Self::SecondInsideFirst | Self::Partial
        )
    }
}

/// Classify two disks seen from the origin, each given as a center vector
/// and a linear radius at that distance.
///
/// The angular radius of each disk is `atan(r / |c|)`; the relation follows
/// from comparing the angular separation of the centers against the sum and
/// differences of the angular radii. Identical disks count as disk 1 inside
/// disk 2.
pub fn disk_overlap(center1: DVec3, radius1: f64, center2: DVec3, radius2: f64) -> DiskOverlap {
    let a = center1.length();
    let b = center2.length();
    if a == 0.0 || b == 0.0 {
        return DiskOverlap::Degenerate;
    }

    let talpha = radius1 / a;
    let tbeta = radius2 / b;
    let calpha = 1.0 / (1.0 + talpha * talpha).sqrt();
    let cbeta = 1.0 / (1.0 + tbeta * tbeta).sqrt();
    let salpha = talpha * calpha;
    let sbeta = tbeta * cbeta;

    let gamma = vsep(center1, center2);
    let alpha = salpha.atan2(calpha);
    let beta = sbeta.atan2(cbeta);

    if alpha + beta > gamma {
        if alpha + gamma <= beta {
            DiskOverlap::FirstInsideSecond
        } else if beta + gamma <= alpha {
            DiskOverlap::SecondInsideFirst
        } else {
            DiskOverlap::Partial
        }
    } else {
        DiskOverlap::Disjoint
    }
}

/// Where an ellipse meets a plane, in terms of the ellipse parameter.
///
/// Points are `(cos θ, sin θ)` pairs such that
/// `center + cos θ · major + sin θ · minor` lies in the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaneIntersection {
    /// The plane misses the ellipse.
    None,
    /// The plane is tangent to the ellipse.
    Tangent([f64; 2]),
    /// The plane cuts the ellipse at two points.
    Secant([[f64; 2]; 2]),
    /// The ellipse lies in a plane parallel to (or coincident with) the cut.
    Coplanar,
}

impl PlaneIntersection {
    /// The intersection parameters found, in solver order.
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Self::None | Self::Coplanar => &[],
            Self::Tangent(p) => std::slice::from_ref(p),
            Self::Secant(p) => p,
        }
    }
}

/// Intersect the ellipse `cos θ · major + sin θ · minor` (centered at the
/// origin) with the plane `normal · p = constant`.
pub fn ellipse_intersect_plane(
    normal: DVec3,
    constant: f64,
    major: DVec3,
    minor: DVec3,
) -> PlaneIntersection {
    let a = major.dot(normal);
    let b = minor.dot(normal);
    let a2pb2 = a * a + b * b;
    let bc = b * constant;
    let discrm = a2pb2 - constant * constant;

    if !(-a2pb2..=a2pb2).contains(&bc) || discrm < 0.0 {
        return PlaneIntersection::None;
    }
    if a2pb2 == 0.0 {
        return PlaneIntersection::Coplanar;
    }

    let a_n = a / a2pb2;
    let b_n = b / a2pb2;
    if discrm == 0.0 {
        return PlaneIntersection::Tangent([a_n * constant, b_n * constant]);
    }

    let root = discrm.sqrt();
    let ac = a_n * constant;
    let bc = b_n * constant;
    let aroot = a_n * root;
    let broot = b_n * root;
    PlaneIntersection::Secant([[ac - broot, bc + aroot], [ac + broot, bc - aroot]])
}

/// A cutting plane `normal · p = constant`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal (not necessarily unit length).
    pub normal: DVec3,
    /// Plane constant.
    pub constant: f64,
}

/// Collect every point at which an ellipse meets any of the `planes` whose
/// `solve` flag is set, as `(cos θ, sin θ)` pairs in plane order.
pub fn plane_points(ellipse: &PlaneEllipse, planes: &[Plane], solve: &[bool]) -> Vec<[f64; 2]> {
    let mut points = Vec::new();
    for (plane, _) in planes.iter().zip(solve).filter(|(_, s)| **s) {
        let c = plane.constant - ellipse.center.dot(plane.normal);
        let hit = ellipse_intersect_plane(plane.normal, c, ellipse.major, ellipse.minor);
        points.extend_from_slice(hit.points());
    }
    points
}

/// Quadrant of a point for angle ordering. Boundaries follow the convention
/// that +x belongs to quadrant 1, +y to 2, -x to 3 and -y to 4.
fn quadrant(x: f64, y: f64) -> u8 {
    if y >= 0.0 {
        if x >= 0.0 { 1 } else { 2 }
    } else if x <= 0.0 {
        3
    } else {
        4
    }
}

/// True when `(x1, y1)` lies at or before `(x2, y2)` going counterclockwise
/// from the +x axis.
pub fn angle_ordered(x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    let q1 = quadrant(x1, y1);
    let q2 = quadrant(x2, y2);
    if q1 == q2 {
        x2 * y1 <= x1 * y2
    } else {
        q1 < q2
    }
}

/// Sort `(cos, sin)` pairs by polar angle in place.
///
/// This is a gap-halving shell sort. The element order for equal angles is
/// part of the output contract, so a library sort is not a drop-in
/// replacement.
pub fn sort_by_angle(points: &mut [[f64; 2]]) {
    let n = points.len();
    let mut gap = n / 2;
    while gap > 0 {
        for i in gap..n {
            let mut j = i as isize - gap as isize;
            while j >= 0 {
                let lo = j as usize;
                let hi = lo + gap;
                if angle_ordered(points[lo][0], points[lo][1], points[hi][0], points[hi][1]) {
                    break;
                }
                points.swap(lo, hi);
                j -= gap as isize;
            }
        }
        gap /= 2;
    }
}
