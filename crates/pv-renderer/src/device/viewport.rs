//! Field-of-view window and its mapping onto the page

use glam::DVec3;
use pv_core::constants::DEPTH_EPSILON;
use pv_core::math::round_half_away;

use crate::config::{PageBounds, ViewRegion};
use crate::error::{RenderError, RenderResult};

/// A point in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DevicePoint {
    /// Horizontal coordinate
    pub x: i64,
    /// Vertical coordinate
    pub y: i64,
}

impl DevicePoint {
    /// Create a device point
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRect {
    /// Left edge
    pub min_x: i64,
    /// Right edge
    pub max_x: i64,
    /// Bottom edge
    pub min_y: i64,
    /// Top edge
    pub max_y: i64,
}

/// Rectangle in the image plane (`x = -X/Z`, `y = -Y/Z` in camera coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FovWindow {
    /// Low x edge
    pub x_min: f64,
    /// High x edge
    pub x_max: f64,
    /// Low y edge
    pub y_min: f64,
    /// High y edge
    pub y_max: f64,
}

impl FovWindow {
    /// Square window of half-width `half` centered on the optic axis
    pub fn square(half: f64) -> Self {
        Self {
            x_min: -half,
            x_max: half,
            y_min: -half,
            y_max: half,
        }
    }
}

/// Maps the field-of-view window onto a region of the page.
///
/// Scaling preserves aspect ratio: the smaller of the two axis scales is used
/// for both, keeping each axis's sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    window: FovWindow,
    ux: f64,
    uy: f64,
    x_center: f64,
    y_center: f64,
    p_center: f64,
    l_center: f64,
}

impl Viewport {
    /// Build the mapping, rejecting a window of zero width or height.
    pub fn new(region: ViewRegion, window: FovWindow, page: PageBounds) -> RenderResult<Self> {
        let FovWindow {
            x_min,
            x_max,
            y_min,
            y_max,
        } = window;
        if x_max == x_min {
            return Err(RenderError::InvalidConfig(format!(
                "field of view has zero width: x_min={x_min}, x_max={x_max}"
            )));
        }
        if y_max == y_min {
            return Err(RenderError::InvalidConfig(format!(
                "field of view has zero height: y_min={y_min}, y_max={y_max}"
            )));
        }

        let (pix0, pix1) = (page.min_x as f64, page.max_x as f64);
        let (lin0, lin1) = (page.min_y as f64, page.max_y as f64);
        let ux = (region.h_end - region.h_start) * (pix1 - pix0) / (x_max - x_min);
        let uy = (region.v_end - region.v_start) * (lin1 - lin0) / (y_max - y_min);
        let u = ux.abs().min(uy.abs());

        Ok(Self {
            window,
            ux: u.copysign(ux),
            uy: u.copysign(uy),
            x_center: (x_min + x_max) / 2.0,
            y_center: (y_min + y_max) / 2.0,
            p_center: pix0 + (region.h_end + region.h_start) * (pix1 - pix0) / 2.0,
            l_center: lin0 + (region.v_end + region.v_start) * (lin1 - lin0) / 2.0,
        })
    }

    /// The window this viewport clips against
    pub fn window(&self) -> FovWindow {
        self.window
    }

    /// Map an image-plane point to device units
    pub fn map(&self, x: f64, y: f64) -> DevicePoint {
        DevicePoint {
            x: round_half_away(self.p_center + self.ux * (x - self.x_center)) as i64,
            y: round_half_away(self.l_center + self.uy * (y - self.y_center)) as i64,
        }
    }

    /// Perspective-project a camera-frame segment, clip it to the window and
    /// map it to device units. Returns `None` when nothing is left.
    pub fn project(&self, begin: DVec3, end: DVec3) -> Option<(DevicePoint, DevicePoint)> {
        let (bx, by) = perspective(begin);
        let (ex, ey) = perspective(end);
        let [bx, by, ex, ey] = clip_to_window(&self.window, bx, by, ex, ey)?;
        Some((self.map(bx, by), self.map(ex, ey)))
    }
}

/// Image-plane coordinates `(-X/Z, -Y/Z)`, with depths closer to zero than
/// [`DEPTH_EPSILON`] pushed out to it (zero counts as positive).
fn perspective(p: DVec3) -> (f64, f64) {
    let z = if p.z.abs() >= DEPTH_EPSILON {
        p.z
    } else if p.z >= 0.0 {
        DEPTH_EPSILON
    } else {
        -DEPTH_EPSILON
    };
    (-p.x / z, -p.y / z)
}

/// Clip a 2D segment to a rectangle.
///
/// Endpoints on the boundary count as inside; crossings are only accepted
/// strictly inside an edge. Returns the clipped `[x1, y1, x2, y2]`, or `None`
/// when the segment misses the rectangle.
pub fn clip_to_window(w: &FovWindow, x1: f64, y1: f64, x2: f64, y2: f64) -> Option<[f64; 4]> {
    let FovWindow {
        x_min,
        x_max,
        y_min,
        y_max,
    } = *w;

    let mut first_inside = false;
    let check = if x1 > x_max {
        if y1 > y_max {
            x2 < x_max && y2 < y_max
        } else if y1 < y_min {
            x2 < x_max && y2 > y_min
        } else {
            x2 < x_max
        }
    } else if x1 < x_min {
        if y1 > y_max {
            x2 > x_min && y2 < y_max
        } else if y1 < y_min {
            x2 > x_min && y2 > y_min
        } else {
            x2 > x_min
        }
    } else if y1 > y_max {
        y2 < y_max
    } else if y1 < y_min {
        y2 > y_min
    } else {
        let leaves = x2 > x_max || x2 < x_min || y2 > y_max || y2 < y_min;
        if !leaves {
            return Some([x1, y1, x2, y2]);
        }
        first_inside = true;
        true
    };
    if !check {
        return None;
    }

    let second_inside =
        !first_inside && x2 <= x_max && x2 >= x_min && y2 <= y_max && y2 >= y_min;
    let needed = if first_inside || second_inside { 1 } else { 2 };

    let dx = x2 - x1;
    let dy = y2 - y1;

    if dy == 0.0 {
        if x1 < x_min && x2 > x_max {
            return Some([x_min, y1, x_max, y2]);
        }
        if x1 < x_min && x2 > x_min {
            return Some([x_min, y1, x2, y2]);
        }
        if x2 < x_min && x1 > x_max {
            return Some([x_max, y1, x_min, y2]);
        }
        if x2 < x_min && x1 > x_min {
            return Some([x1, y1, x_min, y2]);
        }
    }
    if dx == 0.0 {
        if y1 < y_min && y2 > y_max {
            return Some([x1, y_min, x2, y_max]);
        }
        if y1 < y_min && y2 > y_min {
            return Some([x1, y_min, x2, y2]);
        }
        if y2 < y_min && y1 > y_max {
            return Some([x1, y_max, x2, y_min]);
        }
        if y2 < y_min && y1 > y_min {
            return Some([x1, y1, x2, y_min]);
        }
    }

    let strictly_between = |d: f64, span: f64| (0.0 < d && d < span) || (0.0 > d && d > span);
    let mut hits: Vec<(f64, f64)> = Vec::with_capacity(2);

    let top = y_max - y1;
    if hits.len() < needed && strictly_between(top, dy) {
        let x = top / dy * dx + x1;
        if x < x_max && x > x_min {
            hits.push((x, y_max));
        }
    }
    let bottom = y_min - y1;
    if hits.len() < needed && strictly_between(bottom, dy) {
        let x = bottom / dy * dx + x1;
        if x < x_max && x > x_min {
            hits.push((x, y_min));
        }
    }
    let right = x_max - x1;
    if hits.len() < needed && strictly_between(right, dx) {
        let y = right / dx * dy + y1;
        if y < y_max && y > y_min {
            hits.push((x_max, y));
        }
    }
    let left = x_min - x1;
    if hits.len() < needed && strictly_between(left, dx) {
        let y = left / dx * dy + y1;
        if y < y_max && y > y_min {
            hits.push((x_min, y));
        }
    }

    if hits.len() != needed {
        return None;
    }
    let mut next = hits.into_iter();
    let (mut rx1, mut ry1, mut rx2, mut ry2) = (x1, y1, x2, y2);
    if !first_inside && let Some((x, y)) = next.next() {
        (rx1, ry1) = (x, y);
    }
    if !second_inside && let Some((x, y)) = next.next() {
        (rx2, ry2) = (x, y);
    }
    Some([rx1, ry1, rx2, ry2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_window() -> FovWindow {
        FovWindow::square(1.0)
    }

    #[test]
    fn test_zero_width_window_is_rejected() {
        let w = FovWindow {
            x_min: 0.5,
            x_max: 0.5,
            y_min: -1.0,
            y_max: 1.0,
        };
        let err = Viewport::new(ViewRegion::FULL, w, PageBounds::default()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
    }

    #[test]
    fn test_inside_segment_is_unchanged() {
        let w = unit_window();
        assert_eq!(clip_to_window(&w, -0.5, 0.2, 0.3, -0.9), Some([-0.5, 0.2, 0.3, -0.9]));
        // Boundary points count as inside.
        assert_eq!(clip_to_window(&w, -1.0, 1.0, 1.0, -1.0), Some([-1.0, 1.0, 1.0, -1.0]));
    }

    #[test]
    fn test_segment_leaving_window_is_cut_at_edge() {
        let w = unit_window();
        let [x1, y1, x2, y2] = clip_to_window(&w, 0.0, 0.0, 2.0, 0.5).unwrap();
        assert_eq!((x1, y1), (0.0, 0.0));
        assert_relative_eq!(x2, 1.0);
        assert_relative_eq!(y2, 0.25);
    }

    #[test]
    fn test_segment_crossing_window() {
        // Both ends outside: the cut points come back in edge-test order
        // (right edge before left edge), not in segment order.
        let w = unit_window();
        let [x1, y1, x2, y2] = clip_to_window(&w, -3.0, -1.5, 3.0, 1.5).unwrap();
        assert_relative_eq!(x1, 1.0);
        assert_relative_eq!(y1, 0.5, epsilon = 1e-12);
        assert_relative_eq!(x2, -1.0);
        assert_relative_eq!(y2, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_segment_missing_window() {
        let w = unit_window();
        assert_eq!(clip_to_window(&w, 2.0, 2.0, 3.0, 0.0), None);
        assert_eq!(clip_to_window(&w, -2.0, 1.5, 2.0, 1.5), None);
    }

    #[test]
    fn test_horizontal_segment_through_window() {
        let w = unit_window();
        assert_eq!(clip_to_window(&w, -2.0, 0.5, 2.0, 0.5), Some([-1.0, 0.5, 1.0, 0.5]));
    }

    #[test]
    fn test_projection_maps_window_corners_to_region() {
        let vp = Viewport::new(ViewRegion::FULL, unit_window(), PageBounds::default()).unwrap();
        // Image-plane (-1, -1) comes from camera point (1, 1, 1).
        let (a, b) = vp
            .project(DVec3::new(1.0, 1.0, 1.0), DVec3::new(-1.0, -1.0, 1.0))
            .unwrap();
        // Aspect ratio is kept: the page is 5400 x 5400 so both scales agree.
        assert_eq!(a, DevicePoint::new(360, 1800));
        assert_eq!(b, DevicePoint::new(5760, 7200));
    }

    #[test]
    fn test_projection_of_inside_segment_round_trips() {
        let vp = Viewport::new(ViewRegion::FULL, unit_window(), PageBounds::default()).unwrap();
        let begin = DVec3::new(-0.2, 0.1, 2.0);
        let end = DVec3::new(0.4, -0.6, 4.0);
        let (a, b) = vp.project(begin, end).unwrap();
        assert_eq!(a, vp.map(0.1, -0.05));
        assert_eq!(b, vp.map(-0.1, 0.15));
    }

    #[test]
    fn test_depth_near_zero_does_not_blow_up() {
        let vp = Viewport::new(ViewRegion::FULL, unit_window(), PageBounds::default()).unwrap();
        assert!(vp.project(DVec3::ZERO, DVec3::ZERO).is_some());
        // Endpoints on either side of the camera plane land far apart and the
        // window clip cuts them back to its edges.
        let (a, b) = vp
            .project(DVec3::new(1.0, 0.0, 0.0), DVec3::new(1.0, 0.0, -1e-20))
            .unwrap();
        assert_eq!((a.x, b.x), (360, 5760));
    }
}
