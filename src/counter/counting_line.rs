use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::counter::counter_errors::CounterError;
use crate::counter::Roi;
use crate::utils::Point;

/// Side of the region of interest the counting line is placed on.
/// Crossing from the inner part of the ROI towards this side counts a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinePosition {
    Top,
    #[default]
    Bottom,
    Left,
    Right,
}

impl LinePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl FromStr for LinePosition {
    type Err = CounterError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(CounterError::config(format!(
                "invalid line position '{}' (options: top, bottom, left, right)",
                other
            ))),
        }
    }
}

impl fmt::Display for LinePosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counting line spanning the ROI bounding box.
///
/// Horizontal lines sit at 1/5 (top) or 4/5 (bottom) of the box height,
/// vertical ones at 1/5 (left) or 4/5 (right) of its width.
#[derive(Debug, Clone, PartialEq)]
pub struct CountingLine {
    position: LinePosition,
    // y for horizontal lines, x for vertical ones
    coordinate: f32,
    start: Point,
    end: Point,
}

impl CountingLine {
    pub fn new(roi: &Roi, position: LinePosition) -> Self {
        let bounds = roi.bounding_rect();
        let (start, end, coordinate) = match position {
            LinePosition::Top | LinePosition::Bottom => {
                let ratio = if position == LinePosition::Top { 0.2 } else { 0.8 };
                let y = (bounds.y + ratio * bounds.height).round();
                (Point::new(bounds.x, y), Point::new(bounds.right(), y), y)
            }
            LinePosition::Left | LinePosition::Right => {
                let ratio = if position == LinePosition::Left { 0.2 } else { 0.8 };
                let x = (bounds.x + ratio * bounds.width).round();
                (Point::new(x, bounds.y), Point::new(x, bounds.bottom()), x)
            }
        };
        CountingLine {
            position,
            coordinate,
            start,
            end,
        }
    }
    pub fn get_position(&self) -> LinePosition {
        self.position
    }
    pub fn get_coordinate(&self) -> f32 {
        self.coordinate
    }
    pub fn endpoints(&self) -> (Point, Point) {
        (self.start, self.end)
    }
    /// True when point is on the line or on its outer side
    pub fn has_passed(&self, pt: &Point) -> bool {
        match self.position {
            LinePosition::Top => pt.y <= self.coordinate,
            LinePosition::Bottom => pt.y >= self.coordinate,
            LinePosition::Left => pt.x <= self.coordinate,
            LinePosition::Right => pt.x >= self.coordinate,
        }
    }
    /// Inside-to-outside transition between two consecutive centroid positions
    pub fn is_crossing(&self, previous: &Point, current: &Point) -> bool {
        !self.has_passed(previous) && self.has_passed(current)
    }
}
