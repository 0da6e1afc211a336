//! Planetview Renderer
//!
//! Visible-surface resolution for planetary diagrams and the output layer
//! that turns the surviving segments into PostScript.
//!
//! # Module Structure
//!
//! ```text
//! pv-renderer
//! ├── config        RendererConfig (page, buffering, strokes, plot region)
//! ├── error         RenderError / RenderResult
//! ├── scene         SceneBuilder → Scene, ViewGeometry
//! ├── visibility    Drawable variants and the per-entity stage machine
//! └── device        Device, DrawSink, PostScriptSink, RecordingSink, Viewport
//! ```
//!
//! A typical frame builds a [`Scene`] once, then renders each [`Drawable`]
//! into the same [`Device`], and finally ends the page.

pub mod config;
pub mod device;
pub mod error;
pub mod scene;
pub mod visibility;

pub use config::{RendererConfig, ViewRegion};
pub use device::{
    Device, DocumentInfo, DrawCommand, DrawSink, FovWindow, LineColor, PostScriptSink,
    RecordingSink,
};
pub use error::{RenderError, RenderResult};
pub use scene::{Ellipsoid, Scene, SceneBuilder, ViewGeometry};
pub use visibility::{
    BodyDrawable, Drawable, Glyph, OverlayDrawable, Outcome, RingDrawable, Shading, Stage,
    StarDrawable,
};
