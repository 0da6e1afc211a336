//! Renderer configuration structures
//!
//! Device page geometry and buffering limits. The defaults reproduce the
//! classic diagram layout: a letter page drawn in tenths of a point with the
//! plot area inset by half an inch on the left and two and a half inches at
//! the bottom.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Drawable page area in device units (tenths of a point)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageBounds {
    /// Left edge
    pub min_x: i64,
    /// Right edge
    pub max_x: i64,
    /// Bottom edge
    pub min_y: i64,
    /// Top edge
    pub max_y: i64,
}

impl Default for PageBounds {
    fn default() -> Self {
        Self {
            min_x: 360,
            max_x: 5760,
            min_y: 1800,
            max_y: 7200,
        }
    }
}

/// Segment batching limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferConfig {
    /// Segments held before the buffer is flushed to the sink
    pub segments: usize,
    /// Maximum points merged into one stroked polyline
    pub polyline_points: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            segments: 1000,
            polyline_points: 64,
        }
    }
}

/// Stroke settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrokeConfig {
    /// Thinnest line width in device units; also the initial width
    pub min_width: i64,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self { min_width: 5 }
    }
}

/// Portion of the page, as fractions `0..=1`, that the field of view maps onto.
///
/// The low edge of the field of view (`x_min`, `y_min`) lands at the
/// `*_start` fraction and the high edge at `*_end`, so an end below its start
/// flips that axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViewRegion {
    /// Horizontal fraction for the low x edge
    pub h_start: f64,
    /// Horizontal fraction for the high x edge
    pub h_end: f64,
    /// Vertical fraction for the low y edge
    pub v_start: f64,
    /// Vertical fraction for the high y edge
    pub v_end: f64,
}

impl ViewRegion {
    /// The whole page
    pub const FULL: Self = Self {
        h_start: 0.0,
        h_end: 1.0,
        v_start: 0.0,
        v_end: 1.0,
    };

    /// Horizontal fractions in increasing order
    pub fn h_range(&self) -> (f64, f64) {
        (self.h_start.min(self.h_end), self.h_start.max(self.h_end))
    }

    /// Vertical fractions in increasing order
    pub fn v_range(&self) -> (f64, f64) {
        (self.v_start.min(self.v_end), self.v_start.max(self.v_end))
    }
}

impl Default for ViewRegion {
    /// Square plot area used by the planetary view diagrams. Camera +y maps
    /// toward the top of the page.
    fn default() -> Self {
        Self {
            h_start: 0.066_666_667,
            h_end: 1.0,
            v_start: 0.988_888_889,
            v_end: 0.055_555_556,
        }
    }
}

/// Complete renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RendererConfig {
    /// Page geometry
    #[serde(default)]
    pub page: PageBounds,
    /// Buffering
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Strokes
    #[serde(default)]
    pub stroke: StrokeConfig,
    /// Plot region on the page
    #[serde(default)]
    pub view: ViewRegion,
}

impl RendererConfig {
    /// Create a new renderer configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from RON text
    pub fn from_ron_str(text: &str) -> RenderResult<Self> {
        ron::from_str(text).map_err(|e| RenderError::InvalidConfig(e.to_string()))
    }

    /// Serialize the configuration as pretty RON
    pub fn to_ron_string(&self) -> RenderResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> RenderResult<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| RenderError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| RenderError::Io(e.to_string()))
    }

    /// Reject settings that would make the device misbehave
    pub fn validate(&self) -> RenderResult<()> {
        let p = &self.page;
        if p.max_x <= p.min_x || p.max_y <= p.min_y {
            return Err(RenderError::InvalidConfig(format!(
                "page bounds are empty: x {}..{}, y {}..{}",
                p.min_x, p.max_x, p.min_y, p.max_y
            )));
        }
        if self.buffer.segments == 0 {
            return Err(RenderError::InvalidConfig(
                "segment buffer must hold at least one segment".into(),
            ));
        }
        if self.buffer.polyline_points < 2 {
            return Err(RenderError::InvalidConfig(
                "polylines need room for at least two points".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = RendererConfig::from_ron_str("(buffer: (segments: 10, polyline_points: 8))")
            .expect("partial config parses");
        assert_eq!(config.buffer.segments, 10);
        assert_eq!(config.page, PageBounds::default());
        assert_eq!(config.stroke.min_width, 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renderer.ron");
        let mut config = RendererConfig::new();
        config.stroke.min_width = 8;
        config.save(&path).unwrap();
        assert_eq!(RendererConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_config_is_invalid() {
        let result = RendererConfig::from_ron_str("(buffer: (segments: \"ten\"))");
        assert!(matches!(result, Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_empty_page() {
        let mut config = RendererConfig::new();
        assert!(config.validate().is_ok());
        config.page.max_x = config.page.min_x;
        assert!(matches!(config.validate(), Err(RenderError::InvalidConfig(_))));
    }
}
