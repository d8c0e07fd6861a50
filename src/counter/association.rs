use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::str::FromStr;

use pathfinding::{matrix::Matrix, prelude::kuhn_munkres_min};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::counter::counter_errors::{CounterError, Result};
use crate::counter::{BlobRegistry, CountingLine, Detection, Roi};
use crate::utils::{Frame, Rect};

const SCALE_FACTOR: f32 = 1_000_000.0;

/// Algorithm type for matching detections to blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingAlgorithm {
    /// Highest IoU first, one-to-one
    #[default]
    Greedy,
    /// Use the Hungarian algorithm (Kuhn-Munkres) for optimal assignment
    Hungarian,
}

impl FromStr for MatchingAlgorithm {
    type Err = CounterError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "greedy" => Ok(MatchingAlgorithm::Greedy),
            "hungarian" => Ok(MatchingAlgorithm::Hungarian),
            other => Err(CounterError::config(format!(
                "unknown matching algorithm '{}' (options: greedy, hungarian)",
                other
            ))),
        }
    }
}

impl fmt::Display for MatchingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MatchingAlgorithm::Greedy => write!(f, "greedy"),
            MatchingAlgorithm::Hungarian => write!(f, "hungarian"),
        }
    }
}

// Candidate pair for the greedy priority queue. Max heap pops the best pair first:
// higher IoU, then larger intersection, then older blob, then earlier detection.
struct MatchCandidate {
    score: f32,
    overlap: f32,
    sequence: u64,
    blob_id: Uuid,
    detection_idx: usize,
}

impl PartialEq for MatchCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MatchCandidate {}

impl PartialOrd for MatchCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.overlap.total_cmp(&other.overlap))
            .then(other.sequence.cmp(&self.sequence))
            .then(other.detection_idx.cmp(&self.detection_idx))
    }
}

/// What a detection cycle did to the registry
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AssociationOutcome {
    /// (blob id, detection index) pairs
    pub matched: Vec<(Uuid, usize)>,
    pub created: Vec<Uuid>,
    /// Removed after exceeding the detection failure limit
    pub expired: Vec<Uuid>,
    /// Removed as overlapping duplicates of older blobs
    pub duplicates: Vec<Uuid>,
}

/// Reconciles detections with tracked blobs during a detection cycle
#[derive(Debug, Clone)]
pub struct Associator {
    // Minimum IoU for a valid match. Default is 0.3
    min_iou: f32,
    // Max consecutive detection failures (mcdf). Default is 2
    max_detection_failures: usize,
    // IoU above which a younger blob is a duplicate of an older one. Default is 0.85
    duplicate_iou: f32,
    algorithm: MatchingAlgorithm,
}

impl Default for Associator {
    fn default() -> Self {
        Associator::new(0.3, 2, 0.85, MatchingAlgorithm::Greedy)
    }
}

impl Associator {
    pub fn new(
        min_iou: f32,
        max_detection_failures: usize,
        duplicate_iou: f32,
        algorithm: MatchingAlgorithm,
    ) -> Self {
        Associator {
            min_iou,
            max_detection_failures,
            duplicate_iou,
            algorithm,
        }
    }
    fn is_valid_pair(&self, score: f32) -> bool {
        score > 0.0 && score >= self.min_iou
    }
    /// Runs one detection cycle over the registry.
    ///
    /// Matched blobs take the detection box and re-initialize their tracker; unmatched
    /// blobs accumulate detection failures and are removed once past the limit;
    /// unmatched detections inside the ROI and not yet past the counting line become new blobs.
    pub fn associate(
        &self,
        registry: &mut BlobRegistry,
        detections: &[Detection],
        frame: &Frame,
        frame_index: u64,
        roi: &Roi,
        line: &CountingLine,
    ) -> Result<AssociationOutcome> {
        let mut outcome = AssociationOutcome::default();

        let candidates: Vec<usize> = detections
            .iter()
            .enumerate()
            .filter(|(_, det)| roi.intersects_rect(&det.bbox))
            .map(|(i, _)| i)
            .collect();

        let pairs = match self.algorithm {
            MatchingAlgorithm::Greedy => self.greedy_matching(registry, detections, &candidates),
            MatchingAlgorithm::Hungarian => {
                self.hungarian_matching(registry, detections, &candidates)
            }
        };

        let mut matched_blobs: HashSet<Uuid> = HashSet::new();
        let mut matched_detections: HashSet<usize> = HashSet::new();
        for (blob_id, det_idx) in pairs {
            let blob = registry
                .get_mut(&blob_id)
                .ok_or(CounterError::NoObject(blob_id))?;
            blob.redetect(&detections[det_idx], frame, frame_index);
            debug!(blob_id = %blob_id, detection = det_idx, "blob re-detected");
            matched_blobs.insert(blob_id);
            matched_detections.insert(det_idx);
            outcome.matched.push((blob_id, det_idx));
        }

        for blob in registry.iter_mut() {
            if !matched_blobs.contains(&blob.get_id()) {
                blob.inc_detection_failures();
            }
        }
        let mcdf = self.max_detection_failures;
        outcome.expired = registry.remove_where(
            |blob| blob.get_detection_failures() > mcdf,
            "detection failures exceeded",
        );

        for &idx in &candidates {
            if matched_detections.contains(&idx) {
                continue;
            }
            let detection = &detections[idx];
            if line.has_passed(&detection.bbox.center()) {
                debug!(detection = idx, "skip new blob: already past counting line");
                continue;
            }
            outcome
                .created
                .push(registry.add(detection, frame, frame_index));
        }

        outcome.duplicates = self.remove_duplicates(registry);
        Ok(outcome)
    }
    fn greedy_matching(
        &self,
        registry: &BlobRegistry,
        detections: &[Detection],
        candidates: &[usize],
    ) -> Vec<(Uuid, usize)> {
        let mut priority_queue: BinaryHeap<MatchCandidate> = BinaryHeap::new();
        for blob in registry.iter() {
            let bbox = blob.get_bbox();
            for &det_idx in candidates {
                let score = bbox.iou(&detections[det_idx].bbox);
                if !self.is_valid_pair(score) {
                    continue;
                }
                priority_queue.push(MatchCandidate {
                    score,
                    overlap: bbox.intersection_area(&detections[det_idx].bbox),
                    sequence: blob.get_sequence(),
                    blob_id: blob.get_id(),
                    detection_idx: det_idx,
                });
            }
        }
        // We need to prevent double assignment of blobs and detections
        let mut reserved_blobs: HashSet<Uuid> = HashSet::new();
        let mut reserved_detections: HashSet<usize> = HashSet::new();
        let mut matches = Vec::new();
        while let Some(candidate) = priority_queue.pop() {
            if reserved_blobs.contains(&candidate.blob_id)
                || reserved_detections.contains(&candidate.detection_idx)
            {
                continue;
            }
            reserved_blobs.insert(candidate.blob_id);
            reserved_detections.insert(candidate.detection_idx);
            matches.push((candidate.blob_id, candidate.detection_idx));
        }
        matches
    }
    fn hungarian_matching(
        &self,
        registry: &BlobRegistry,
        detections: &[Detection],
        candidates: &[usize],
    ) -> Vec<(Uuid, usize)> {
        let num_blobs = registry.len();
        let num_detections = candidates.len();
        if num_blobs == 0 || num_detections == 0 {
            return Vec::new();
        }
        let blobs: Vec<(Uuid, Rect)> =
            registry.iter().map(|b| (b.get_id(), b.get_bbox())).collect();
        let iou_matrix: Vec<Vec<f32>> = blobs
            .iter()
            .map(|(_, bbox)| {
                candidates
                    .iter()
                    .map(|&det_idx| bbox.iou(&detections[det_idx].bbox))
                    .collect()
            })
            .collect();
        // Ensure we have at least as many columns as rows for Hungarian
        let padded_cols = num_blobs.max(num_detections);
        let cost_data: Vec<i64> = (0..num_blobs)
            .flat_map(|i| {
                let row = &iou_matrix[i];
                (0..padded_cols).map(move |j| {
                    if j < num_detections {
                        ((1.0 - row[j]) * SCALE_FACTOR) as i64
                    } else {
                        // Dummy detection: cost of IoU 0.0
                        SCALE_FACTOR as i64
                    }
                })
            })
            .collect();
        let cost_matrix = match Matrix::from_vec(num_blobs, padded_cols, cost_data) {
            Ok(matrix) => matrix,
            Err(_) => return Vec::new(),
        };
        let (_, assignments) = kuhn_munkres_min(&cost_matrix);
        assignments
            .iter()
            .enumerate()
            .filter(|&(blob_idx, &col)| {
                col < num_detections && self.is_valid_pair(iou_matrix[blob_idx][col])
            })
            .map(|(blob_idx, &col)| (blobs[blob_idx].0, candidates[col]))
            .collect()
    }
    /// Drops every younger blob overlapping an older one above `duplicate_iou`.
    ///
    /// A dropped duplicate that had already been counted passes its counted state
    /// to the older blob it overlaps, so the pair yields one count at most.
    /// Returns ids of dropped blobs.
    pub fn remove_duplicates(&self, registry: &mut BlobRegistry) -> Vec<Uuid> {
        let mut kept: Vec<(Uuid, Rect)> = Vec::with_capacity(registry.len());
        let mut duplicates: HashSet<Uuid> = HashSet::new();
        let mut heirs: Vec<Uuid> = Vec::new();
        for blob in registry.iter() {
            let bbox = blob.get_bbox();
            let older = kept
                .iter()
                .find(|(_, older)| older.iou(&bbox) > self.duplicate_iou);
            match older {
                Some(&(older_id, _)) => {
                    duplicates.insert(blob.get_id());
                    if blob.is_counted() {
                        heirs.push(older_id);
                    }
                }
                None => kept.push((blob.get_id(), bbox)),
            }
        }
        if duplicates.is_empty() {
            return Vec::new();
        }
        for older_id in heirs {
            if let Some(older) = registry.get_mut(&older_id) {
                if older.mark_counted() {
                    debug!(blob_id = %older_id, "counted state taken over from duplicate");
                }
            }
        }
        registry.remove_where(|blob| duplicates.contains(&blob.get_id()), "duplicate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::test_data::{blank_frame, ScriptedTrackerFactory};
    use crate::counter::LinePosition;
    use crate::utils::{Point, Rect};

    fn setup() -> (BlobRegistry, Frame, Roi, CountingLine) {
        let registry = BlobRegistry::new(Box::new(ScriptedTrackerFactory::holding()), 10);
        let roi = Roi::full_frame(200, 200);
        let line = CountingLine::new(&roi, LinePosition::Bottom);
        (registry, blank_frame(200, 200), roi, line)
    }

    #[test]
    fn test_new_detections_spawn_blobs() {
        let (mut registry, frame, roi, line) = setup();
        let associator = Associator::default();
        let detections = vec![
            Detection::new(Rect::new(10.0, 10.0, 20.0, 20.0)),
            Detection::new(Rect::new(100.0, 10.0, 20.0, 20.0)),
        ];
        let outcome = associator
            .associate(&mut registry, &detections, &frame, 0, &roi, &line)
            .unwrap();
        assert_eq!(outcome.created.len(), 2);
        assert!(outcome.matched.is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_match_updates_box_and_resets_failures() {
        let (mut registry, frame, roi, line) = setup();
        let associator = Associator::default();
        let id = registry.add(&Detection::new(Rect::new(10.0, 10.0, 20.0, 20.0)), &frame, 0);
        registry.get_mut(&id).unwrap().inc_detection_failures();

        let detections = vec![Detection::new(Rect::new(14.0, 12.0, 20.0, 20.0))];
        let outcome = associator
            .associate(&mut registry, &detections, &frame, 10, &roi, &line)
            .unwrap();
        assert_eq!(outcome.matched, vec![(id, 0)]);
        assert!(outcome.created.is_empty());
        let blob = registry.get(&id).unwrap();
        assert_eq!(blob.get_bbox(), Rect::new(14.0, 12.0, 20.0, 20.0));
        assert_eq!(blob.get_detection_failures(), 0);
        assert_eq!(blob.get_updated_at(), 10);
    }

    #[test]
    fn test_two_detections_one_blob() {
        // Higher scoring detection goes to the existing blob, the other spawns a new one
        for algorithm in [MatchingAlgorithm::Greedy, MatchingAlgorithm::Hungarian] {
            let (mut registry, frame, roi, line) = setup();
            let associator = Associator::new(0.3, 2, 0.85, algorithm);
            let id = registry.add(&Detection::new(Rect::new(50.0, 50.0, 40.0, 40.0)), &frame, 0);
            let detections = vec![
                // IoU 0.6 / 1.4 ~= 0.43
                Detection::new(Rect::new(66.0, 50.0, 40.0, 40.0)),
                // IoU 0.9 / 1.1 ~= 0.82
                Detection::new(Rect::new(54.0, 50.0, 40.0, 40.0)),
            ];
            let outcome = associator
                .associate(&mut registry, &detections, &frame, 10, &roi, &line)
                .unwrap();
            assert_eq!(outcome.matched, vec![(id, 1)]);
            assert_eq!(outcome.created.len(), 1);
            assert_eq!(registry.len(), 2);
            assert_eq!(
                registry.get(&outcome.created[0]).unwrap().get_bbox(),
                Rect::new(66.0, 50.0, 40.0, 40.0)
            );
        }
    }

    #[test]
    fn test_tie_break_prefers_older_blob() {
        let (mut registry, frame, roi, line) = setup();
        let associator = Associator::new(0.1, 2, 1.0, MatchingAlgorithm::Greedy);
        // Two blobs symmetric around the detection
        let older = registry.add(&Detection::new(Rect::new(40.0, 40.0, 20.0, 20.0)), &frame, 0);
        let younger = registry.add(&Detection::new(Rect::new(60.0, 40.0, 20.0, 20.0)), &frame, 0);
        let detections = vec![Detection::new(Rect::new(50.0, 40.0, 20.0, 20.0))];
        let outcome = associator
            .associate(&mut registry, &detections, &frame, 10, &roi, &line)
            .unwrap();
        assert_eq!(outcome.matched, vec![(older, 0)]);
        assert_eq!(registry.get(&younger).unwrap().get_detection_failures(), 1);
    }

    #[test]
    fn test_detection_failures_expire_blob() {
        let (mut registry, frame, roi, line) = setup();
        let mcdf = 2;
        let associator = Associator::new(0.3, mcdf, 0.85, MatchingAlgorithm::Greedy);
        let id = registry.add(&Detection::new(Rect::new(10.0, 10.0, 20.0, 20.0)), &frame, 0);
        for cycle in 1..=mcdf {
            let outcome = associator
                .associate(&mut registry, &[], &frame, cycle as u64 * 10, &roi, &line)
                .unwrap();
            assert!(outcome.expired.is_empty());
            assert_eq!(registry.get(&id).unwrap().get_detection_failures(), cycle);
        }
        let outcome = associator
            .associate(&mut registry, &[], &frame, 30, &roi, &line)
            .unwrap();
        assert_eq!(outcome.expired, vec![id]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_detection_outside_roi_ignored() {
        let (mut registry, frame, _, _) = setup();
        let roi = Roi::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 100.0),
            ],
            200,
            200,
        )
        .unwrap();
        let line = CountingLine::new(&roi, LinePosition::Bottom);
        let detections = vec![
            Detection::new(Rect::new(120.0, 20.0, 20.0, 20.0)),
            Detection::new(Rect::new(90.0, 20.0, 20.0, 20.0)),
        ];
        let outcome = Associator::default()
            .associate(&mut registry, &detections, &frame, 0, &roi, &line)
            .unwrap();
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(
            registry.iter().next().unwrap().get_bbox(),
            Rect::new(90.0, 20.0, 20.0, 20.0)
        );
    }

    #[test]
    fn test_detection_past_line_not_spawned() {
        let (mut registry, frame, roi, line) = setup();
        // Bottom line of a 200px frame sits at y = 160
        let detections = vec![Detection::new(Rect::new(10.0, 170.0, 20.0, 20.0))];
        let outcome = Associator::default()
            .associate(&mut registry, &detections, &frame, 0, &roi, &line)
            .unwrap();
        assert!(outcome.created.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicates_removed() {
        let (mut registry, frame, roi, line) = setup();
        let associator = Associator::new(0.3, 2, 0.85, MatchingAlgorithm::Greedy);
        let older = registry.add(&Detection::new(Rect::new(10.0, 10.0, 40.0, 40.0)), &frame, 0);
        let younger = registry.add(&Detection::new(Rect::new(11.0, 10.0, 40.0, 40.0)), &frame, 0);
        // Detection matches the older blob only, younger keeps its box
        let detections = vec![Detection::new(Rect::new(10.0, 10.0, 40.0, 40.0))];
        let outcome = associator
            .associate(&mut registry, &detections, &frame, 10, &roi, &line)
            .unwrap();
        assert_eq!(outcome.matched, vec![(older, 0)]);
        assert_eq!(outcome.duplicates, vec![younger]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_passes_counted_state() {
        let (mut registry, frame, _, _) = setup();
        let associator = Associator::new(0.3, 2, 0.85, MatchingAlgorithm::Greedy);
        let older = registry.add(&Detection::new(Rect::new(10.0, 10.0, 40.0, 40.0)), &frame, 0);
        let younger = registry.add(&Detection::new(Rect::new(11.0, 10.0, 40.0, 40.0)), &frame, 1);
        let apart = registry.add(&Detection::new(Rect::new(120.0, 120.0, 40.0, 40.0)), &frame, 1);
        assert!(registry.get_mut(&younger).unwrap().mark_counted());

        assert_eq!(associator.remove_duplicates(&mut registry), vec![younger]);
        assert!(registry.get(&older).unwrap().is_counted());
        assert!(!registry.get(&apart).unwrap().is_counted());
        assert_eq!(registry.len(), 2);
        // Nothing left to drop
        assert!(associator.remove_duplicates(&mut registry).is_empty());
    }

    #[test]
    fn test_candidate_ordering() {
        let id = Uuid::new_v4();
        let mut heap = BinaryHeap::new();
        for (score, overlap, sequence, detection_idx) in
            [(0.5, 10.0, 1, 0), (0.5, 12.0, 2, 1), (0.7, 1.0, 3, 2), (0.5, 12.0, 0, 3)]
        {
            heap.push(MatchCandidate {
                score,
                overlap,
                sequence,
                blob_id: id,
                detection_idx,
            });
        }
        let order: Vec<usize> =
            std::iter::from_fn(|| heap.pop().map(|c| c.detection_idx)).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }
}
