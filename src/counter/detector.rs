use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::counter::counter_errors::{CounterError, Result};
use crate::counter::{BackgroundSubtractor, Roi};
use crate::utils::{Frame, Rect};

/// Candidate object returned by a detector
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: Rect,
    pub confidence: Option<f32>,
    pub label: Option<String>,
}

impl Detection {
    pub fn new(bbox: Rect) -> Self {
        Detection {
            bbox,
            confidence: None,
            label: None,
        }
    }
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Common interface for detection backends.
///
/// Implementations must only return candidates lying fully or partially inside `roi`.
/// An `Err` is treated by the counter as "no detections this cycle".
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame, roi: &Roi) -> Result<Vec<Detection>>;
    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Detector backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetectorKind {
    /// Running-average background subtraction
    #[default]
    #[serde(rename = "bgsub")]
    BackgroundSubtraction,
}

impl DetectorKind {
    /// Creates a detector instance of this kind
    pub fn create(&self) -> Box<dyn Detector> {
        match self {
            DetectorKind::BackgroundSubtraction => Box::new(BackgroundSubtractor::default()),
        }
    }
}

impl FromStr for DetectorKind {
    type Err = CounterError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bgsub" => Ok(DetectorKind::BackgroundSubtraction),
            other => Err(CounterError::config(format!(
                "unknown detector '{}' (options: bgsub)",
                other
            ))),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DetectorKind::BackgroundSubtraction => write!(f, "bgsub"),
        }
    }
}
