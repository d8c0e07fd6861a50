use serde::{Deserialize, Serialize};

/// Frame type consumed and produced by the counter: fixed-size RGB pixel grid.
pub type Frame = image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(_x: f32, _y: f32, _width: f32, _height: f32) -> Self {
        Rect {
            x: _x,
            y: _y,
            width: _width,
            height: _height,
        }
    }
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
    pub fn center(&self) -> Point {
        Point::new(self.x + 0.5 * self.width, self.y + 0.5 * self.height)
    }
    pub fn area(&self) -> f32 {
        f32::max(self.width, 0.0) * f32::max(self.height, 0.0)
    }
    pub fn contains_point(&self, pt: &Point) -> bool {
        pt.x >= self.x && pt.x <= self.right() && pt.y >= self.y && pt.y <= self.bottom()
    }
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let w = f32::min(self.right(), other.right()) - f32::max(self.x, other.x);
        let h = f32::min(self.bottom(), other.bottom()) - f32::max(self.y, other.y);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        w * h
    }
    pub fn iou(&self, other: &Rect) -> f32 {
        iou(self, other)
    }
    /// Clips rectangle to `[0, width] x [0, height]`. Result may have zero size.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let (fw, fh) = (width as f32, height as f32);
        let x1 = self.x.clamp(0.0, fw);
        let y1 = self.y.clamp(0.0, fh);
        let x2 = self.right().clamp(0.0, fw);
        let y2 = self.bottom().clamp(0.0, fh);
        Rect::new(x1, y1, f32::max(x2 - x1, 0.0), f32::max(y2 - y1, 0.0))
    }
    /// Returns rectangle grown by `margin_x`/`margin_y` on every side.
    pub fn expand(&self, margin_x: f32, margin_y: f32) -> Rect {
        Rect::new(
            self.x - margin_x,
            self.y - margin_y,
            self.width + 2.0 * margin_x,
            self.height + 2.0 * margin_y,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(_x: f32, _y: f32) -> Self {
        Point { x: _x, y: _y }
    }
}

/// Straight-line distance between two points
///
/// Basic usage:
/// ```
/// use vehicle_counter::utils::{euclidean_distance, Point};
/// let d = euclidean_distance(&Point::new(0.0, 0.0), &Point::new(3.0, 4.0));
/// assert_eq!(d, 5.0);
/// ```
pub fn euclidean_distance(p1: &Point, p2: &Point) -> f32 {
    let x_squared = f32::powi(p1.x - p2.x, 2);
    let y_squared = f32::powi(p1.y - p2.y, 2);
    f32::sqrt(x_squared + y_squared)
}

/// Intersection over union of two rectangles. Zero for disjoint or empty boxes.
pub fn iou(r1: &Rect, r2: &Rect) -> f32 {
    let intersection = r1.intersection_area(r2);
    if intersection <= 0.0 {
        return 0.0;
    }
    let union = r1.area() + r2.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}
