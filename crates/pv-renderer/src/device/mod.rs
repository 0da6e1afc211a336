//! Device output layer
//!
//! Accepted camera-frame segments are projected onto the page, clipped to the
//! field-of-view window and held in a buffer. When the buffer fills, or when
//! the caller flushes, consecutive connected segments of the same color are
//! merged into polylines and handed to a [`DrawSink`] as path commands.
//!
//! The device remembers the last gray level and line width it emitted and
//! suppresses repeats, so two sinks fed by the same device see identical
//! command streams.

mod postscript;
mod viewport;

pub use postscript::{DocumentInfo, PostScriptSink};
pub use viewport::{DevicePoint, DeviceRect, FovWindow, Viewport, clip_to_window};

use std::io;

use glam::DVec3;
use pv_core::math::round_half_away;
use serde::{Deserialize, Serialize};

use crate::config::{RendererConfig, ViewRegion};
use crate::error::RenderResult;

/// Number of discrete gray levels in the palette
pub const PALETTE_SIZE: usize = 11;

/// Line color as a palette index.
///
/// 0 is white, 1 is black and 2 through 10 are grays from 0.1 to 0.9.
/// Indices above 10 draw black. Negative indices are not drawn at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineColor(pub i32);

impl LineColor {
    /// White
    pub const WHITE: Self = Self(0);
    /// Black
    pub const BLACK: Self = Self(1);
    /// Not drawn
    pub const NONE: Self = Self(-1);

    /// True when segments of this color produce output
    pub fn is_drawn(self) -> bool {
        self.0 >= 0
    }

    /// Palette entry actually emitted, or `None` for undrawn colors
    pub fn palette_index(self) -> Option<usize> {
        match self.0 {
            c if c < 0 => None,
            c if c > 10 => Some(1),
            c => Some(c as usize),
        }
    }
}

impl Default for LineColor {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Back end that serializes drawing primitives.
///
/// Coordinates are device units. Implementations write exactly what they
/// are told; de-duplication of colors and widths happens in [`Device`].
pub trait DrawSink {
    /// Start a new path
    fn begin_path(&mut self) -> io::Result<()>;
    /// Move the current point
    fn move_to(&mut self, p: DevicePoint) -> io::Result<()>;
    /// Extend the path to `p`
    fn line_to(&mut self, p: DevicePoint) -> io::Result<()>;
    /// Select a palette entry (`0..PALETTE_SIZE`)
    fn set_gray(&mut self, palette_index: usize) -> io::Result<()>;
    /// Stroke the current path
    fn stroke(&mut self) -> io::Result<()>;
    /// Set the line width in device units
    fn set_line_width(&mut self, width: i64) -> io::Result<()>;
    /// Emit raw text in the sink's own language
    fn write_text(&mut self, text: &str) -> io::Result<()>;
    /// Paint a rectangle of the page white
    fn clear_region(&mut self, region: DeviceRect) -> io::Result<()>;
    /// Finish the page
    fn end_page(&mut self) -> io::Result<()>;
}

/// One recorded primitive
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// [`DrawSink::begin_path`]
    BeginPath,
    /// [`DrawSink::move_to`]
    MoveTo(DevicePoint),
    /// [`DrawSink::line_to`]
    LineTo(DevicePoint),
    /// [`DrawSink::set_gray`]
    SetGray(usize),
    /// [`DrawSink::stroke`]
    Stroke,
    /// [`DrawSink::set_line_width`]
    SetLineWidth(i64),
    /// [`DrawSink::write_text`]
    Text(String),
    /// [`DrawSink::clear_region`]
    ClearRegion(DeviceRect),
    /// [`DrawSink::end_page`]
    EndPage,
}

/// Sink that keeps every primitive in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Commands in emission order
    pub commands: Vec<DrawCommand>,
}

impl RecordingSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `line_to` commands recorded
    pub fn line_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::LineTo(_)))
            .count()
    }

    /// Number of strokes recorded
    pub fn stroke_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Stroke))
            .count()
    }

    /// Gray levels selected, in order
    pub fn grays(&self) -> Vec<usize> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::SetGray(g) => Some(*g),
                _ => None,
            })
            .collect()
    }
}

impl DrawSink for RecordingSink {
    fn begin_path(&mut self) -> io::Result<()> {
        self.commands.push(DrawCommand::BeginPath);
        Ok(())
    }

    fn move_to(&mut self, p: DevicePoint) -> io::Result<()> {
        self.commands.push(DrawCommand::MoveTo(p));
        Ok(())
    }

    fn line_to(&mut self, p: DevicePoint) -> io::Result<()> {
        self.commands.push(DrawCommand::LineTo(p));
        Ok(())
    }

    fn set_gray(&mut self, palette_index: usize) -> io::Result<()> {
        self.commands.push(DrawCommand::SetGray(palette_index));
        Ok(())
    }

    fn stroke(&mut self) -> io::Result<()> {
        self.commands.push(DrawCommand::Stroke);
        Ok(())
    }

    fn set_line_width(&mut self, width: i64) -> io::Result<()> {
        self.commands.push(DrawCommand::SetLineWidth(width));
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.commands.push(DrawCommand::Text(text.to_string()));
        Ok(())
    }

    fn clear_region(&mut self, region: DeviceRect) -> io::Result<()> {
        self.commands.push(DrawCommand::ClearRegion(region));
        Ok(())
    }

    fn end_page(&mut self) -> io::Result<()> {
        self.commands.push(DrawCommand::EndPage);
        Ok(())
    }
}

/// A projected segment waiting in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferedSegment {
    begin: DevicePoint,
    end: DevicePoint,
    color: LineColor,
}

/// Graphics state the device has already sent to the sink
#[derive(Debug, Clone, Copy)]
struct PenState {
    gray: Option<usize>,
    width: i64,
    last_point: DevicePoint,
    drawn: bool,
}

/// Projects, clips, batches and emits segments for one page.
pub struct Device<S: DrawSink> {
    sink: S,
    viewport: Viewport,
    config: RendererConfig,
    buffer: Vec<BufferedSegment>,
    pen: PenState,
}

impl<S: DrawSink> Device<S> {
    /// Create a device drawing the field-of-view `window` into the configured
    /// page region.
    pub fn new(sink: S, window: FovWindow, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        let viewport = Viewport::new(config.view, window, config.page)?;
        tracing::debug!(
            "Device viewport: window {:?}, region {:?}",
            window,
            config.view
        );
        Ok(Self {
            sink,
            viewport,
            buffer: Vec::with_capacity(config.buffer.segments),
            pen: PenState {
                gray: None,
                width: config.stroke.min_width,
                last_point: DevicePoint::default(),
                drawn: false,
            },
            config,
        })
    }

    /// The projection in use
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Borrow the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Flush pending segments and hand back the sink
    pub fn finish(mut self) -> RenderResult<S> {
        self.flush()?;
        Ok(self.sink)
    }

    /// True once any visible line has been stroked
    pub fn has_drawn(&self) -> bool {
        self.pen.drawn
    }

    /// Forget that anything was drawn, so the next entity can be tested alone
    pub fn reset_drawn(&mut self) {
        self.pen.drawn = false;
    }

    /// Last point stroked, in device units
    pub fn last_point(&self) -> DevicePoint {
        self.pen.last_point
    }

    /// Queue a camera-frame segment. Segments entirely outside the window
    /// are dropped; the buffer is flushed when it fills.
    pub fn draw(&mut self, begin: DVec3, end: DVec3, color: LineColor) -> RenderResult<()> {
        let Some((b, e)) = self.viewport.project(begin, end) else {
            return Ok(());
        };
        self.buffer.push(BufferedSegment {
            begin: b,
            end: e,
            color,
        });
        if self.buffer.len() >= self.config.buffer.segments {
            self.flush()?;
        }
        Ok(())
    }

    /// Emit everything in the buffer
    pub fn flush(&mut self) -> RenderResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let segments = std::mem::take(&mut self.buffer);
        tracing::debug!("Flushing {} segments", segments.len());

        let mut run: Vec<DevicePoint> = Vec::with_capacity(self.config.buffer.polyline_points);
        let mut run_color = segments[0].color;
        let mut max_step = 0;

        for seg in &segments {
            let step = (seg.end.x - seg.begin.x)
                .abs()
                .max((seg.end.y - seg.begin.y).abs());
            let joins = run.last() == Some(&seg.begin)
                && seg.color == run_color
                && run.len() < self.config.buffer.polyline_points;
            if joins {
                run.push(seg.end);
                max_step = max_step.max(step);
            } else {
                if !run.is_empty() {
                    self.emit_polyline(&mut run, run_color, max_step)?;
                }
                run.clear();
                run.extend([seg.begin, seg.end]);
                run_color = seg.color;
                max_step = step;
            }
        }
        self.emit_polyline(&mut run, run_color, max_step)?;
        self.buffer = segments;
        self.buffer.clear();
        Ok(())
    }

    fn emit_polyline(
        &mut self,
        points: &mut [DevicePoint],
        color: LineColor,
        max_step: i64,
    ) -> RenderResult<()> {
        // A polyline that never moves still has to leave a dot.
        if max_step == 0
            && let Some(last) = points.last_mut()
        {
            last.x += if last.x < self.config.page.max_x { 1 } else { -1 };
        }
        let Some(palette) = color.palette_index() else {
            return Ok(());
        };
        let Some((&first, rest)) = points.split_first() else {
            return Ok(());
        };

        self.sink.begin_path()?;
        self.sink.move_to(first)?;
        self.pen.last_point = first;
        let mut previous = first;
        for &p in rest {
            if p != previous {
                self.sink.line_to(p)?;
                self.pen.last_point = p;
                self.pen.drawn = true;
            }
            previous = p;
        }
        if self.pen.gray != Some(palette) {
            self.sink.set_gray(palette)?;
            self.pen.gray = Some(palette);
        }
        self.sink.stroke()?;
        Ok(())
    }

    /// Set the stroke width in points. Widths are kept in tenths of a point,
    /// never below the configured minimum, and only sent when they change.
    pub fn set_line_width(&mut self, points: f64) -> RenderResult<()> {
        let width = (round_half_away(points * 10.0) as i64).max(self.config.stroke.min_width);
        if width != self.pen.width {
            self.sink.set_line_width(width)?;
            self.pen.width = width;
        }
        Ok(())
    }

    /// Emit raw text. Buffered segments are not flushed first.
    pub fn write_text(&mut self, text: &str) -> RenderResult<()> {
        self.sink.write_text(text)?;
        Ok(())
    }

    /// Move the sink's current point to the last stroked point
    pub fn move_to_last_point(&mut self) -> RenderResult<()> {
        self.sink.move_to(self.pen.last_point)?;
        Ok(())
    }

    /// Clear a region of the page given as page fractions. Clearing the
    /// whole page finishes it instead.
    pub fn clear(&mut self, region: ViewRegion) -> RenderResult<()> {
        let page = self.config.page;
        let (h0, h1) = region.h_range();
        let (v0, v1) = region.v_range();
        let (pix0, pix1) = (page.min_x as f64, page.max_x as f64);
        let (lin0, lin1) = (page.min_y as f64, page.max_y as f64);
        let rect = DeviceRect {
            min_x: round_half_away(pix0 + h0 * (pix1 - pix0)) as i64,
            max_x: round_half_away(pix0 + h1 * (pix1 - pix0)) as i64,
            min_y: round_half_away(lin0 + v0 * (lin1 - lin0)) as i64,
            max_y: round_half_away(lin0 + v1 * (lin1 - lin0)) as i64,
        };

        let full_page = rect.min_x == page.min_x
            && rect.max_x == page.max_x
            && rect.min_y == page.min_y
            && rect.max_y == page.max_y;
        if full_page {
            self.sink.end_page()?;
        } else {
            self.sink.clear_region(rect)?;
            // Region clears leave the sink painting black.
            self.pen.gray = LineColor::BLACK.palette_index();
        }
        Ok(())
    }

    /// Finish the page
    pub fn end_page(&mut self) -> RenderResult<()> {
        self.clear(ViewRegion::FULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageBounds;

    fn device() -> Device<RecordingSink> {
        let config = RendererConfig {
            view: ViewRegion::FULL,
            ..Default::default()
        };
        Device::new(RecordingSink::new(), FovWindow::square(1.0), config).unwrap()
    }

    fn image_point(x: f64, y: f64) -> DVec3 {
        DVec3::new(-x, -y, 1.0)
    }

    #[test]
    fn test_connected_segments_merge_into_one_polyline() {
        let mut dev = device();
        let pts = [(-0.5, 0.0), (0.0, 0.5), (0.5, 0.0), (0.0, -0.5)];
        for w in pts.windows(2) {
            dev.draw(image_point(w[0].0, w[0].1), image_point(w[1].0, w[1].1), LineColor::BLACK)
                .unwrap();
        }
        let sink = dev.finish().unwrap();
        assert_eq!(sink.stroke_count(), 1, "one polyline expected");
        assert_eq!(sink.line_count(), 3);
        assert_eq!(sink.commands[0], DrawCommand::BeginPath);
        assert_eq!(sink.grays(), vec![1]);
    }

    #[test]
    fn test_color_change_splits_polyline_and_gray_is_not_repeated() {
        let mut dev = device();
        dev.draw(image_point(0.0, 0.0), image_point(0.1, 0.0), LineColor::BLACK).unwrap();
        dev.draw(image_point(0.1, 0.0), image_point(0.2, 0.0), LineColor(7)).unwrap();
        dev.draw(image_point(0.5, 0.5), image_point(0.6, 0.5), LineColor(7)).unwrap();
        dev.draw(image_point(0.7, 0.5), image_point(0.8, 0.5), LineColor(7)).unwrap();
        let sink = dev.finish().unwrap();
        assert_eq!(sink.stroke_count(), 4);
        assert_eq!(sink.grays(), vec![1, 7]);
    }

    #[test]
    fn test_undrawn_color_emits_nothing() {
        let mut dev = device();
        dev.draw(image_point(0.0, 0.0), image_point(0.1, 0.0), LineColor::NONE).unwrap();
        let sink = dev.finish().unwrap();
        assert!(sink.commands.is_empty());
    }

    #[test]
    fn test_colors_above_palette_draw_black() {
        assert_eq!(LineColor(12).palette_index(), Some(1));
        assert_eq!(LineColor(10).palette_index(), Some(10));
        assert_eq!(LineColor(-3).palette_index(), None);
    }

    #[test]
    fn test_zero_length_segment_is_bumped() {
        let mut dev = device();
        dev.draw(image_point(0.0, 0.0), image_point(0.0, 0.0), LineColor::BLACK).unwrap();
        let sink = dev.finish().unwrap();
        let moves: Vec<_> = sink
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::MoveTo(p) => Some(*p),
                DrawCommand::LineTo(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[1].x, moves[0].x + 1);
        assert_eq!(moves[1].y, moves[0].y);
    }

    #[test]
    fn test_buffer_flushes_when_full() {
        let config = RendererConfig {
            view: ViewRegion::FULL,
            buffer: crate::config::BufferConfig {
                segments: 2,
                polyline_points: 64,
            },
            ..Default::default()
        };
        let mut dev = Device::new(RecordingSink::new(), FovWindow::square(1.0), config).unwrap();
        dev.draw(image_point(0.0, 0.0), image_point(0.1, 0.0), LineColor::BLACK).unwrap();
        assert!(dev.sink().commands.is_empty());
        dev.draw(image_point(0.1, 0.0), image_point(0.2, 0.0), LineColor::BLACK).unwrap();
        assert_eq!(dev.sink().stroke_count(), 1);
    }

    #[test]
    fn test_polyline_length_is_capped() {
        let config = RendererConfig {
            view: ViewRegion::FULL,
            buffer: crate::config::BufferConfig {
                segments: 100,
                polyline_points: 3,
            },
            ..Default::default()
        };
        let mut dev = Device::new(RecordingSink::new(), FovWindow::square(1.0), config).unwrap();
        for i in 0..4 {
            let x = i as f64 * 0.1;
            dev.draw(image_point(x, 0.0), image_point(x + 0.1, 0.0), LineColor::BLACK).unwrap();
        }
        let sink = dev.finish().unwrap();
        assert_eq!(sink.stroke_count(), 2);
    }

    #[test]
    fn test_line_width_only_sent_on_change() {
        let mut dev = device();
        dev.set_line_width(0.2).unwrap();
        dev.set_line_width(1.0).unwrap();
        dev.set_line_width(1.0).unwrap();
        dev.set_line_width(0.0).unwrap();
        assert_eq!(
            dev.sink().commands,
            vec![DrawCommand::SetLineWidth(10), DrawCommand::SetLineWidth(5)]
        );
    }

    #[test]
    fn test_clear_full_page_ends_page() {
        let mut dev = device();
        dev.end_page().unwrap();
        dev.clear(ViewRegion {
            h_start: 0.0,
            h_end: 0.5,
            v_start: 0.5,
            v_end: 0.0,
        })
        .unwrap();
        let page = PageBounds::default();
        assert_eq!(dev.sink().commands[0], DrawCommand::EndPage);
        assert_eq!(
            dev.sink().commands[1],
            DrawCommand::ClearRegion(DeviceRect {
                min_x: page.min_x,
                max_x: 3060,
                min_y: page.min_y,
                max_y: 4500,
            })
        );
    }

    #[test]
    fn test_black_not_resent_after_region_clear() {
        let mut dev = device();
        dev.clear(ViewRegion {
            h_start: 0.0,
            h_end: 0.5,
            v_start: 0.0,
            v_end: 0.5,
        })
        .unwrap();
        dev.draw(image_point(0.0, 0.0), image_point(0.1, 0.0), LineColor::BLACK).unwrap();
        let sink = dev.finish().unwrap();
        assert!(sink.grays().is_empty());
    }
}
