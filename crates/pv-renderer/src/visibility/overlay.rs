//! Stars and image-plane overlays. Neither is ever hidden.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::Outcome;
use crate::device::{Device, DrawSink, LineColor};
use crate::error::RenderResult;
use crate::scene::Scene;

/// Image-plane point `(x, y)` as a camera-frame direction
fn image_point(x: f64, y: f64) -> DVec3 {
    DVec3::new(-x, -y, 1.0)
}

/// Strokes of a star symbol in unit glyph coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    /// Each stroke as `[[x0, y0], [x1, y1]]`
    pub strokes: Vec<[[f64; 2]; 2]>,
}

impl Glyph {
    /// A plus sign spanning -1..1 on both axes
    pub fn plus() -> Self {
        Self {
            strokes: vec![[[-1.0, 0.0], [1.0, 0.0]], [[0.0, -1.0], [0.0, 1.0]]],
        }
    }
}

impl Default for Glyph {
    fn default() -> Self {
        Self::plus()
    }
}

/// A star drawn as a glyph centered on its image position
#[derive(Debug, Clone, PartialEq)]
pub struct StarDrawable {
    /// Direction of the star in the parent frame
    pub direction: DVec3,
    /// Symbol
    pub glyph: Glyph,
    /// Glyph units per image-plane unit
    pub scale: f64,
    /// Line color
    pub color: LineColor,
}

impl StarDrawable {
    /// Plus-shaped star
    pub fn new(direction: DVec3, scale: f64) -> Self {
        Self {
            direction,
            glyph: Glyph::plus(),
            scale,
            color: LineColor::BLACK,
        }
    }

    /// Draw the glyph. Stars behind the camera are skipped.
    pub fn render<S: DrawSink>(
        &self,
        scene: &Scene,
        device: &mut Device<S>,
    ) -> RenderResult<Outcome> {
        let s = scene.to_camera_vector(self.direction);
        if s.z <= 0.0 {
            return Ok(Outcome::OutsideView);
        }
        let (cx, cy) = (-s.x / s.z, -s.y / s.z);
        for [[x0, y0], [x1, y1]] in &self.glyph.strokes {
            device.draw(
                image_point(cx + x0 * self.scale, cy + y0 * self.scale),
                image_point(cx + x1 * self.scale, cy + y1 * self.scale),
                self.color,
            )?;
        }
        device.flush()?;
        Ok(Outcome::Drawn {
            segments: self.glyph.strokes.len(),
        })
    }
}

/// Segments given directly in image-plane coordinates (frames, ticks)
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDrawable {
    /// Each segment as `[[x0, y0], [x1, y1]]`
    pub segments: Vec<[[f64; 2]; 2]>,
    /// Line color
    pub color: LineColor,
}

impl OverlayDrawable {
    /// Overlay of `segments` in one color
    pub fn new(segments: Vec<[[f64; 2]; 2]>, color: LineColor) -> Self {
        Self { segments, color }
    }

    /// Draw every segment.
    pub fn render<S: DrawSink>(&self, device: &mut Device<S>) -> RenderResult<Outcome> {
        for [[x0, y0], [x1, y1]] in &self.segments {
            device.draw(image_point(*x0, *y0), image_point(*x1, *y1), self.color)?;
        }
        device.flush()?;
        Ok(Outcome::Drawn {
            segments: self.segments.len(),
        })
    }
}
