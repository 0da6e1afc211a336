//! Planetview Frontend
//!
//! Diagram drivers built on the renderer: a planetary view of one instant
//! and a moon tracker plot over a time range, plus the collaborators they
//! need for body states and calendar time.
//!
//! # Module Structure
//!
//! ```text
//! pv-frontend
//! ├── diagram     draw_planetary_view, ViewPlan, ring and arc geometry
//! ├── tracker     draw_moon_tracks, TrackSamples
//! ├── ephemeris   Ephemeris trait, StaticEphemeris (RON body table)
//! ├── time        TimeSystem trait, UniformTime
//! ├── options     DiagramOptions, TrackerOptions
//! ├── preamble    PostScript label macros and page headings
//! └── error       DriverError / DriverResult
//! ```

pub mod diagram;
pub mod ephemeris;
pub mod error;
pub mod options;
pub mod preamble;
pub mod time;
pub mod tracker;

pub use diagram::{ViewPlan, draw_planetary_view};
pub use ephemeris::{Correction, Ephemeris, StateVector, StaticEphemeris};
pub use error::{DriverError, DriverResult};
pub use options::{DiagramOptions, TrackerOptions};
pub use time::{TimeSystem, UniformTime};
pub use tracker::{TrackSamples, draw_moon_tracks};
