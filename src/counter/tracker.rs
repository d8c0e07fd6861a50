use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::counter::counter_errors::{CounterError, Result};
use crate::counter::TemplateTracker;
use crate::utils::{Frame, Rect};

/// Common interface for single-object trackers.
///
/// Every tracked blob exclusively owns one instance; it is dropped together with the blob.
pub trait ObjectTracker: Send {
    /// Sets the reference object. Called on creation and on every re-detection.
    fn init(&mut self, frame: &Frame, bbox: &Rect);
    /// Locates the reference object in the next frame. `None` means it was lost in this frame.
    fn update(&mut self, frame: &Frame) -> Option<Rect>;
}

/// Produces a fresh tracker for each new blob
pub trait TrackerFactory {
    fn create(&self) -> Box<dyn ObjectTracker>;
}

impl<F> TrackerFactory for F
where
    F: Fn() -> Box<dyn ObjectTracker>,
{
    fn create(&self) -> Box<dyn ObjectTracker> {
        self()
    }
}

/// Tracker backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    /// Template matching against the appearance captured at (re-)initialization
    #[default]
    Template,
    /// Template matching that refreshes the template after every successful update
    AdaptiveTemplate,
}

impl TrackerFactory for TrackerKind {
    fn create(&self) -> Box<dyn ObjectTracker> {
        match self {
            TrackerKind::Template => Box::new(TemplateTracker::default()),
            TrackerKind::AdaptiveTemplate => Box::new(TemplateTracker::default().adaptive()),
        }
    }
}

impl FromStr for TrackerKind {
    type Err = CounterError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "template" => Ok(TrackerKind::Template),
            "adaptive_template" => Ok(TrackerKind::AdaptiveTemplate),
            other => Err(CounterError::config(format!(
                "unknown tracker '{}' (options: template, adaptive_template)",
                other
            ))),
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackerKind::Template => write!(f, "template"),
            TrackerKind::AdaptiveTemplate => write!(f, "adaptive_template"),
        }
    }
}
