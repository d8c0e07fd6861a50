use tracing::{debug, warn};

use crate::counter::counter_errors::{CounterError, Result};
use crate::counter::{
    draw_overlay, Associator, BlobRegistry, CounterConfig, CountRecord, CountingLine,
    CrossingEvaluator, Detector, Roi, RoiExitPolicy, TrackerFactory,
};
use crate::utils::Frame;

/// Tracking-and-counting engine.
///
/// Every `di`-th frame (starting with the first one) runs the detector and reconciles
/// its output with tracked blobs. Other frames only advance the per-blob trackers.
/// Crossing evaluation runs on every frame.
pub struct VehicleCounter {
    roi: Roi,
    show_roi: bool,
    frame_size: (u32, u32),
    detector: Box<dyn Detector>,
    registry: BlobRegistry,
    associator: Associator,
    evaluator: CrossingEvaluator,
    // Detection interval
    di: u64,
    // Max consecutive tracking failures
    mctf: usize,
    roi_exit_policy: RoiExitPolicy,
    frame_count: u64,
    last_frame: Frame,
}

impl VehicleCounter {
    /// Creates counter with the detector and tracker backends selected in `config`
    ///
    /// Basic usage:
    ///
    /// ```
    /// use vehicle_counter::counter::{CounterConfig, VehicleCounter};
    /// use vehicle_counter::utils::Frame;
    /// let frame = Frame::new(320, 240);
    /// let mut counter = VehicleCounter::new(&frame, &CounterConfig::default()).unwrap();
    /// let records = counter.count(&frame).unwrap();
    /// assert!(records.is_empty());
    /// assert_eq!(counter.frame_count(), 1);
    /// let annotated = counter.visualize();
    /// assert_eq!(annotated.dimensions(), (320, 240));
    /// ```
    pub fn new(frame: &Frame, config: &CounterConfig) -> Result<Self> {
        Self::with_backends(
            frame,
            config,
            config.detector.create(),
            Box::new(config.tracker),
        )
    }
    /// Creates counter with caller-provided detector and tracker factory.
    /// `config.detector` and `config.tracker` are ignored.
    pub fn with_backends(
        frame: &Frame,
        config: &CounterConfig,
        detector: Box<dyn Detector>,
        tracker_factory: Box<dyn TrackerFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let (width, height) = frame.dimensions();
        let roi = match &config.roi {
            Some(vertices) => Roi::new(vertices.clone(), width, height)?,
            None => Roi::full_frame(width, height),
        };
        let line = CountingLine::new(&roi, config.line_position);
        debug!(
            width,
            height,
            detector = detector.name(),
            line = %config.line_position,
            coordinate = line.get_coordinate(),
            "vehicle counter created"
        );
        Ok(VehicleCounter {
            roi,
            show_roi: config.show_roi,
            frame_size: (width, height),
            detector,
            registry: BlobRegistry::new(tracker_factory, config.max_track_len),
            associator: Associator::new(
                config.min_iou,
                config.mcdf,
                config.duplicate_iou,
                config.matching,
            ),
            evaluator: CrossingEvaluator::new(line),
            di: config.di as u64,
            mctf: config.mctf,
            roi_exit_policy: config.roi_exit_policy,
            frame_count: 0,
            last_frame: frame.clone(),
        })
    }
    /// Processes one frame and returns count records emitted on it.
    ///
    /// Fails with `FrameSizeMismatch` (leaving the state untouched) if the frame
    /// dimensions differ from the ones the counter was created with.
    pub fn count(&mut self, frame: &Frame) -> Result<Vec<CountRecord>> {
        if frame.dimensions() != self.frame_size {
            return Err(CounterError::FrameSizeMismatch {
                expected: self.frame_size,
                actual: frame.dimensions(),
            });
        }
        let frame_index = self.frame_count;
        if frame_index % self.di == 0 {
            self.detection_cycle(frame, frame_index)?;
        } else {
            self.tracking_cycle(frame, frame_index);
        }
        let records = self.evaluator.evaluate(&mut self.registry);
        if self.roi_exit_policy == RoiExitPolicy::Delete {
            let roi = &self.roi;
            self.registry
                .remove_where(|blob| !roi.contains(&blob.get_center()), "left region of interest");
        }
        self.last_frame = frame.clone();
        self.frame_count += 1;
        Ok(records)
    }
    fn detection_cycle(&mut self, frame: &Frame, frame_index: u64) -> Result<()> {
        let detections = match self.detector.detect(frame, &self.roi) {
            Ok(detections) => detections,
            Err(err) => {
                warn!(
                    detector = self.detector.name(),
                    frame = frame_index,
                    "detection failed, treating as no detections: {}",
                    err
                );
                Vec::new()
            }
        };
        let outcome = self.associator.associate(
            &mut self.registry,
            &detections,
            frame,
            frame_index,
            &self.roi,
            self.evaluator.get_line(),
        )?;
        debug!(
            frame = frame_index,
            detections = detections.len(),
            matched = outcome.matched.len(),
            created = outcome.created.len(),
            expired = outcome.expired.len(),
            duplicates = outcome.duplicates.len(),
            "detection cycle"
        );
        Ok(())
    }
    fn tracking_cycle(&mut self, frame: &Frame, frame_index: u64) {
        for blob in self.registry.iter_mut() {
            blob.track(frame, frame_index);
        }
        let mctf = self.mctf;
        self.registry.remove_where(
            |blob| blob.get_tracking_failures() > mctf,
            "tracking failures exceeded",
        );
        let duplicates = self.associator.remove_duplicates(&mut self.registry);
        if !duplicates.is_empty() {
            debug!(frame = frame_index, duplicates = duplicates.len(), "tracking cycle");
        }
    }
    /// Annotated copy of the most recently processed frame. Does not change any state.
    pub fn visualize(&self) -> Frame {
        let roi = if self.show_roi { Some(&self.roi) } else { None };
        draw_overlay(
            &self.last_frame,
            roi,
            &self.registry,
            self.evaluator.get_line(),
            self.evaluator.total(),
        )
    }
    /// Running total of counted vehicles
    pub fn vehicle_count(&self) -> usize {
        self.evaluator.total()
    }
    /// Number of frames processed so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
    pub fn blobs(&self) -> &BlobRegistry {
        &self.registry
    }
    pub fn roi(&self) -> &Roi {
        &self.roi
    }
    pub fn counting_line(&self) -> &CountingLine {
        self.evaluator.get_line()
    }
}
