//! Global constants for pv-core
//!
//! The numeric values here are frozen: changing any of them changes which
//! segments are emitted and therefore the byte content of every diagram.

use std::f64::consts::PI;

/// Number of steps in the standard circle table (one full revolution)
pub const STANDARD_STEPS: usize = 96;

/// Maximum number of light sources in one scene
pub const MAX_LIGHTS: usize = 4;

/// Maximum number of bodies in one scene
pub const MAX_BODIES: usize = 100;

/// Maximum number of meridians drawn on a body
pub const MAX_MERIDIANS: usize = 50;

/// Maximum number of latitude circles drawn on a body
pub const MAX_LATITUDES: usize = 50;

/// Maximum number of render planes for one body (limb, terminators, grid)
pub const MAX_PLANES: usize = 1 + MAX_LIGHTS + MAX_MERIDIANS + MAX_LATITUDES;

/// Maximum number of candidate segments produced while rendering one entity
pub const MAX_SEGMENTS: usize = STANDARD_STEPS + 3 * MAX_PLANES + 3 * MAX_LIGHTS * MAX_BODIES;

/// Half-angle of the hard field-of-view limit cone (75 degrees)
pub const LIMIT_FOV: f64 = PI * 5.0 / 12.0;

/// Segment parameters closer than one part in `QUANTA` are merged when clipping
pub const QUANTA: f64 = 134_217_728.0;

/// Eclipse-cone apex fallback: `|radius - largest axis|` at or below this is "parallel"
pub const CONE_PARALLEL_EPSILON: f64 = 1.0e-4;

/// Distance multiplier applied to the largest axis when the eclipse cone is parallel
pub const CONE_PARALLEL_SCALE: f64 = 1.0e4;

/// Substitute for a nonpositive limb-axis denominator (body seen edge-on)
pub const LIMB_DENOMINATOR_FLOOR: f64 = 1.0e-30;

/// Smallest depth magnitude allowed in perspective division
pub const DEPTH_EPSILON: f64 = 1.0e-12;

/// Corner cosine at or below which the field of view is treated as very wide
pub const WIDE_FOV_COSINE: f64 = 0.001;

/// Angular size bands (ratio of body size to FOV radius) and the standard
/// table step used inside each band. Ratios at or below the last band use
/// [`SKIP_SMALLEST`].
pub const SKIP_BANDS: [(f64, usize); 4] = [(0.2, 1), (0.1, 2), (0.04, 3), (0.01, 4)];

/// Standard table step for bodies smaller than every band in [`SKIP_BANDS`]
pub const SKIP_SMALLEST: usize = 6;
