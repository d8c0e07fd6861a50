use std::fmt;

use uuid::Uuid;

use crate::counter::{Detection, ObjectTracker};
use crate::utils::{Frame, Point, Rect};

/// One physical object followed across frames.
///
/// Exclusively owns its tracker; dropping the blob releases the tracker.
pub struct TrackedBlob {
    id: Uuid,
    // Creation order inside the registry, used for stable iteration and tie-breaks
    sequence: u64,
    current_bbox: Rect,
    current_center: Point,
    previous_center: Point,
    track: Vec<Point>,
    max_track_len: usize,
    tracker: Box<dyn ObjectTracker>,
    detection_failures: usize,
    tracking_failures: usize,
    counted: bool,
    created_at: u64,
    updated_at: u64,
    label: Option<String>,
    confidence: Option<f32>,
}

impl TrackedBlob {
    /// Creates blob from a detection and initializes its tracker with the detection box
    pub fn new(
        sequence: u64,
        detection: &Detection,
        mut tracker: Box<dyn ObjectTracker>,
        frame: &Frame,
        frame_index: u64,
        max_track_len: usize,
    ) -> Self {
        tracker.init(frame, &detection.bbox);
        let center = detection.bbox.center();
        let mut newb = TrackedBlob {
            id: Uuid::new_v4(),
            sequence,
            current_bbox: detection.bbox,
            current_center: center,
            previous_center: center,
            track: Vec::with_capacity(max_track_len),
            max_track_len: usize::max(max_track_len, 1),
            tracker,
            detection_failures: 0,
            tracking_failures: 0,
            counted: false,
            created_at: frame_index,
            updated_at: frame_index,
            label: detection.label.clone(),
            confidence: detection.confidence,
        };
        newb.track.push(center);
        newb
    }
    pub fn get_id(&self) -> Uuid {
        self.id
    }
    pub fn get_sequence(&self) -> u64 {
        self.sequence
    }
    pub fn get_bbox(&self) -> Rect {
        self.current_bbox
    }
    pub fn get_center(&self) -> Point {
        self.current_center
    }
    pub fn get_previous_center(&self) -> Point {
        self.previous_center
    }
    pub fn get_track(&self) -> &Vec<Point> {
        &self.track
    }
    pub fn get_detection_failures(&self) -> usize {
        self.detection_failures
    }
    pub fn get_tracking_failures(&self) -> usize {
        self.tracking_failures
    }
    pub fn is_counted(&self) -> bool {
        self.counted
    }
    pub fn get_created_at(&self) -> u64 {
        self.created_at
    }
    pub fn get_updated_at(&self) -> u64 {
        self.updated_at
    }
    pub fn get_label(&self) -> Option<&str> {
        self.label.as_deref()
    }
    pub fn get_confidence(&self) -> Option<f32> {
        self.confidence
    }
    /// Short identifier for overlays: first 8 hex digits of the id
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
    // Moves box and center, extends the centroid track
    fn set_bbox(&mut self, bbox: Rect, frame_index: u64) {
        self.current_bbox = bbox;
        self.current_center = bbox.center();
        self.updated_at = frame_index;
        self.track.push(self.current_center);
        if self.track.len() > self.max_track_len {
            self.track.remove(0);
        }
    }
    /// Runs the owned tracker on the frame. Returns false when the object was lost.
    pub fn track(&mut self, frame: &Frame, frame_index: u64) -> bool {
        match self.tracker.update(frame) {
            Some(bbox) => {
                self.set_bbox(bbox, frame_index);
                self.tracking_failures = 0;
                true
            }
            None => {
                self.tracking_failures += 1;
                false
            }
        }
    }
    /// Corrects blob with a matched detection: box is replaced, tracker is re-initialized,
    /// both failure counters are reset
    pub fn redetect(&mut self, detection: &Detection, frame: &Frame, frame_index: u64) {
        self.set_bbox(detection.bbox, frame_index);
        self.tracker.init(frame, &detection.bbox);
        self.detection_failures = 0;
        self.tracking_failures = 0;
        if detection.label.is_some() {
            self.label = detection.label.clone();
        }
        if detection.confidence.is_some() {
            self.confidence = detection.confidence;
        }
    }
    pub fn inc_detection_failures(&mut self) {
        self.detection_failures += 1
    }
    /// Marks blob as counted. Returns false if it had been counted already.
    pub fn mark_counted(&mut self) -> bool {
        if self.counted {
            return false;
        }
        self.counted = true;
        true
    }
    /// Remembers the current centroid as the previous one for the next frame
    pub fn commit_position(&mut self) {
        self.previous_center = self.current_center;
    }
}

impl fmt::Debug for TrackedBlob {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TrackedBlob")
            .field("id", &self.id)
            .field("sequence", &self.sequence)
            .field("bbox", &self.current_bbox)
            .field("detection_failures", &self.detection_failures)
            .field("tracking_failures", &self.tracking_failures)
            .field("counted", &self.counted)
            .finish()
    }
}
