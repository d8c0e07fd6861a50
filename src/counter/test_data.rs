use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::Rgb;

use crate::counter::counter_errors::{CounterError, Result};
use crate::counter::{Detection, Detector, ObjectTracker, Roi, TrackerFactory};
use crate::utils::{Frame, Rect};

pub fn blank_frame(width: u32, height: u32) -> Frame {
    Frame::new(width, height)
}

/// Black frame with white filled boxes
pub fn frame_with_boxes(width: u32, height: u32, boxes: &[Rect]) -> Frame {
    let mut frame = blank_frame(width, height);
    for bbox in boxes {
        let x0 = bbox.x.max(0.0) as u32;
        let y0 = bbox.y.max(0.0) as u32;
        let x1 = (bbox.right().max(0.0) as u32).min(width);
        let y1 = (bbox.bottom().max(0.0) as u32).min(height);
        for y in y0..y1 {
            for x in x0..x1 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
    }
    frame
}

/// Number of trackers currently alive
#[derive(Debug, Clone, Default)]
pub struct LiveTrackers(Arc<AtomicUsize>);

impl LiveTrackers {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tracker that replays a script of results, one entry per update.
/// `None` entries are tracking failures. Once the script is exhausted the tracker
/// keeps reporting the last known box.
pub struct ScriptedTracker {
    script: VecDeque<Option<Rect>>,
    last: Rect,
    live: LiveTrackers,
}

impl ScriptedTracker {
    pub fn new(script: Vec<Option<Rect>>) -> Self {
        Self::with_live(script, LiveTrackers::default())
    }
    fn with_live(script: Vec<Option<Rect>>, live: LiveTrackers) -> Self {
        live.0.fetch_add(1, Ordering::SeqCst);
        ScriptedTracker {
            script: script.into(),
            last: Rect::default(),
            live,
        }
    }
}

impl Drop for ScriptedTracker {
    fn drop(&mut self) {
        self.live.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ObjectTracker for ScriptedTracker {
    fn init(&mut self, _frame: &Frame, bbox: &Rect) {
        self.last = *bbox;
    }
    fn update(&mut self, _frame: &Frame) -> Option<Rect> {
        match self.script.pop_front() {
            Some(Some(bbox)) => {
                self.last = bbox;
                Some(bbox)
            }
            Some(None) => None,
            None => Some(self.last),
        }
    }
}

/// Hands out scripts to trackers in creation order. Trackers created after the
/// scripts run out simply hold their position.
pub struct ScriptedTrackerFactory {
    scripts: Mutex<VecDeque<Vec<Option<Rect>>>>,
    live: LiveTrackers,
}

impl ScriptedTrackerFactory {
    pub fn new(scripts: Vec<Vec<Option<Rect>>>) -> Self {
        ScriptedTrackerFactory {
            scripts: Mutex::new(scripts.into()),
            live: LiveTrackers::default(),
        }
    }
    pub fn holding() -> Self {
        Self::new(Vec::new())
    }
    pub fn live_trackers(&self) -> LiveTrackers {
        self.live.clone()
    }
}

impl TrackerFactory for ScriptedTrackerFactory {
    fn create(&self) -> Box<dyn ObjectTracker> {
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Box::new(ScriptedTracker::with_live(script, self.live.clone()))
    }
}

/// Detector that replays one entry per detect call. `None` entries fail.
/// Returns no detections once the script is exhausted.
pub struct ScriptedDetector {
    script: VecDeque<Option<Vec<Detection>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Option<Vec<Detection>>>) -> Self {
        ScriptedDetector {
            script: script.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
    /// Shared counter of detect calls
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame, _roi: &Roi) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Some(detections)) => Ok(detections),
            Some(None) => Err(CounterError::detector("scripted failure")),
            None => Ok(Vec::new()),
        }
    }
    fn name(&self) -> &str {
        "scripted"
    }
}

/// Shorthand for a list of detections from boxes
pub fn detections(boxes: &[Rect]) -> Vec<Detection> {
    boxes.iter().map(|b| Detection::new(*b)).collect()
}
