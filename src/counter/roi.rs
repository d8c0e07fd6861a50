use image::{GrayImage, Luma};
use itertools::Itertools;

use crate::counter::counter_errors::{CounterError, Result};
use crate::utils::{Point, Rect};

const EPS: f32 = 1e-6;

/// Region of interest: simple polygon in frame coordinates.
///
/// Immutable once constructed. Restricts where detections may spawn new blobs
/// and (optionally) where blobs are allowed to live.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    vertices: Vec<Point>,
}

impl Roi {
    /// Creates ROI and validates it against frame dimensions
    ///
    /// Basic usage:
    ///
    /// ```
    /// use vehicle_counter::counter::Roi;
    /// use vehicle_counter::utils::Point;
    /// let roi = Roi::new(
    ///     vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(50.0, 80.0)],
    ///     100,
    ///     100,
    /// ).unwrap();
    /// assert!(roi.contains(&Point::new(50.0, 20.0)));
    /// ```
    pub fn new(vertices: Vec<Point>, frame_width: u32, frame_height: u32) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(CounterError::invalid_roi(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if let Some(pt) = vertices
            .iter()
            .find(|pt| !pt.x.is_finite() || !pt.y.is_finite())
        {
            return Err(CounterError::invalid_roi(format!(
                "vertex ({}, {}) is not a finite point",
                pt.x, pt.y
            )));
        }
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        if let Some(pt) = vertices
            .iter()
            .find(|pt| pt.x < 0.0 || pt.y < 0.0 || pt.x > fw || pt.y > fh)
        {
            return Err(CounterError::invalid_roi(format!(
                "vertex ({}, {}) lies outside of {}x{} frame",
                pt.x, pt.y, frame_width, frame_height
            )));
        }
        let roi = Roi { vertices };
        let edges: Vec<(Point, Point)> = roi.edges().collect();
        if edges.iter().any(|(a, b)| a == b) {
            return Err(CounterError::invalid_roi("polygon has repeated consecutive vertices"));
        }
        if roi.signed_area().abs() < EPS {
            return Err(CounterError::invalid_roi("polygon is degenerate (zero area)"));
        }
        let n = edges.len();
        for i in 0..n {
            for j in (i + 1)..n {
                // Adjacent edges share a vertex by construction
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                if segments_intersect(&edges[i].0, &edges[i].1, &edges[j].0, &edges[j].1) {
                    return Err(CounterError::invalid_roi(format!(
                        "polygon is self-intersecting (edges {} and {})",
                        i, j
                    )));
                }
            }
        }
        Ok(roi)
    }
    /// ROI covering the whole frame: (0,0), (w,0), (w,h), (0,h)
    pub fn full_frame(frame_width: u32, frame_height: u32) -> Self {
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        Roi {
            vertices: vec![
                Point::new(0.0, 0.0),
                Point::new(fw, 0.0),
                Point::new(fw, fh),
                Point::new(0.0, fh),
            ],
        }
    }
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }
    /// Iterates polygon edges, closing the last vertex back onto the first one
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.vertices
            .iter()
            .circular_tuple_windows::<(&Point, &Point)>()
            .map(|(a, b)| (*a, *b))
    }
    // Shoelace formula
    fn signed_area(&self) -> f32 {
        0.5 * self.edges().map(|(a, b)| a.x * b.y - b.x * a.y).sum::<f32>()
    }
    pub fn bounding_rect(&self) -> Rect {
        let min_x = self.vertices.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let min_y = self.vertices.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        let max_x = self.vertices.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let max_y = self.vertices.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
    /// Point-in-polygon test. Points lying on the boundary are inside.
    pub fn contains(&self, pt: &Point) -> bool {
        if self.edges().any(|(a, b)| on_segment(&a, &b, pt)) {
            return true;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > pt.y) != (b.y > pt.y) {
                let x_cross = a.x + (pt.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if pt.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
    /// True when rectangle lies fully or partially inside the polygon
    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        let corners = [
            Point::new(rect.x, rect.y),
            Point::new(rect.right(), rect.y),
            Point::new(rect.right(), rect.bottom()),
            Point::new(rect.x, rect.bottom()),
        ];
        if corners.iter().any(|c| self.contains(c)) {
            return true;
        }
        if self.vertices.iter().any(|v| rect.contains_point(v)) {
            return true;
        }
        let rect_edges = [
            (corners[0], corners[1]),
            (corners[1], corners[2]),
            (corners[2], corners[3]),
            (corners[3], corners[0]),
        ];
        self.edges().any(|(a, b)| {
            rect_edges
                .iter()
                .any(|(c, d)| segments_intersect(&a, &b, c, d))
        })
    }
    /// Binary mask of the polygon: 255 for pixels whose center is inside, 0 otherwise
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if self.contains(&Point::new(x as f32 + 0.5, y as f32 + 0.5)) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }
}

/// Parses vertex list in `x1,y1|x2,y2|...` format (whitespace ignored)
pub fn parse_vertices(s: &str) -> Result<Vec<Point>> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned
        .split('|')
        .map(|pair| {
            let (x, y) = pair.split_once(',').ok_or_else(|| {
                CounterError::config(format!("bad ROI vertex '{}', expected 'x,y'", pair))
            })?;
            let x: f32 = x
                .parse()
                .map_err(|_| CounterError::config(format!("bad ROI x coordinate '{}'", x)))?;
            let y: f32 = y
                .parse()
                .map_err(|_| CounterError::config(format!("bad ROI y coordinate '{}'", y)))?;
            Ok(Point::new(x, y))
        })
        .collect()
}

fn orientation(a: &Point, b: &Point, c: &Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: &Point, b: &Point, pt: &Point) -> bool {
    orientation(a, b, pt).abs() < EPS
        && pt.x >= f32::min(a.x, b.x) - EPS
        && pt.x <= f32::max(a.x, b.x) + EPS
        && pt.y >= f32::min(a.y, b.y) - EPS
        && pt.y <= f32::max(a.y, b.y) + EPS
}

fn segments_intersect(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
    {
        return true;
    }
    on_segment(q1, q2, p1)
        || on_segment(q1, q2, p2)
        || on_segment(p1, p2, q1)
        || on_segment(p1, p2, q2)
}
