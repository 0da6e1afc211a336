//! Geometry kernel for planetary diagrams
//!
//! This crate provides:
//! - Vector and matrix helpers over glam's double-precision types
//! - Limb, terminator and eclipse-cone ellipses of triaxial bodies
//! - Disk overlap and ellipse/plane intersection classification
//! - Segment clipping against ellipses, planes and the limit cone
//! - The standard circle table every sampled curve walks

pub mod circle;
pub mod clip;
pub mod constants;
pub mod ellipse;
pub mod math;

// Re-exports for convenience
pub use circle::StandardCircle;
pub use clip::{SubSegment, clip_segment_to_ellipse, clip_to_fov_cone, same_side, skip_count};
pub use ellipse::{
    Axes, DiskOverlap, EclipseCone, Plane, PlaneEllipse, PlaneIntersection, compute_eclipse_cone,
    compute_limb, disk_overlap, ellipse_intersect_plane, plane_points, sort_by_angle,
};
