//! Rectangles and points in pixel space.
//!
//! Render space has its origin at the top-left corner with Y growing
//! downward. Capture space (cursor logs) has its origin at the bottom-left.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w: w.max(0.0),
            h: h.max(0.0),
        }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(w: f64, h: f64) -> Self {
        Self::new(0.0, 0.0, w, h)
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// True when `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x - 1e-9
            && other.y >= self.y - 1e-9
            && other.right() <= self.right() + 1e-9
            && other.bottom() <= self.bottom() + 1e-9
    }

    /// Move (and if needed shrink) this rectangle so it fits inside `bounds`.
    pub fn clamp_inside(&self, bounds: &Rect) -> Rect {
        let w = self.w.min(bounds.w);
        let h = self.h.min(bounds.h);
        let x = self.x.clamp(bounds.x, bounds.right() - w);
        let y = self.y.clamp(bounds.y, bounds.bottom() - h);
        Rect { x, y, w, h }
    }

    /// Uniformly scale `inner` (a size) to fit inside this rectangle, centered.
    pub fn fit_centered(&self, inner_w: f64, inner_h: f64) -> (Rect, f64) {
        if inner_w <= 0.0 || inner_h <= 0.0 {
            return (Rect::new(self.center().x, self.center().y, 0.0, 0.0), 0.0);
        }
        let scale = (self.w / inner_w).min(self.h / inner_h);
        let w = inner_w * scale;
        let h = inner_h * scale;
        let rect = Rect::new(
            self.x + (self.w - w) / 2.0,
            self.y + (self.h - h) / 2.0,
            w,
            h,
        );
        (rect, scale)
    }

    /// Integer pixel span `[x0, x1) x [y0, y1)` clipped to `width x height`.
    pub fn pixel_span(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = self.x.floor().clamp(0.0, width as f64) as u32;
        let y0 = self.y.floor().clamp(0.0, height as f64) as u32;
        let x1 = self.right().ceil().clamp(0.0, width as f64) as u32;
        let y1 = self.bottom().ceil().clamp(0.0, height as f64) as u32;
        (x0, y0, x1, y1)
    }
}

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &Point2D, b: &Point2D, t: f64) -> Point2D {
        let t = t.clamp(0.0, 1.0);
        Point2D {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }

    /// Flip a capture-space point (origin bottom-left) into render space
    /// (origin top-left) for a surface of the given height.
    pub fn flip_y(&self, height: f64) -> Point2D {
        Point2D::new(self.x, height - self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside_moves_rect() {
        let bounds = Rect::from_size(100.0, 100.0);
        let r = Rect::new(90.0, -10.0, 20.0, 20.0).clamp_inside(&bounds);
        assert_eq!(r, Rect::new(80.0, 0.0, 20.0, 20.0));
        assert!(bounds.contains_rect(&r));
    }

    #[test]
    fn test_clamp_inside_shrinks_oversized_rect() {
        let bounds = Rect::from_size(50.0, 50.0);
        let r = Rect::new(10.0, 10.0, 80.0, 20.0).clamp_inside(&bounds);
        assert_eq!(r.w, 50.0);
        assert!(bounds.contains_rect(&r));
    }

    #[test]
    fn test_fit_centered_letterboxes() {
        let outer = Rect::from_size(200.0, 100.0);
        let (inner, scale) = outer.fit_centered(100.0, 100.0);
        assert!((scale - 1.0).abs() < 1e-9);
        assert_eq!(inner, Rect::new(50.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_flip_y() {
        let p = Point2D::new(10.0, 0.0).flip_y(1080.0);
        assert_eq!(p, Point2D::new(10.0, 1080.0));
    }

    #[test]
    fn test_point2d_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }
}
