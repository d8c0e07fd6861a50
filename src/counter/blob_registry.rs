use tracing::debug;
use uuid::Uuid;

use crate::counter::{Detection, TrackedBlob, TrackerFactory};
use crate::utils::Frame;

/// Storage for live blobs.
///
/// Blobs are kept in creation order, so iteration (and therefore logging and drawing)
/// is deterministic. Removing a blob drops it together with its tracker.
pub struct BlobRegistry {
    // Storage
    blobs: Vec<TrackedBlob>,
    next_sequence: u64,
    max_track_len: usize,
    factory: Box<dyn TrackerFactory>,
}

impl BlobRegistry {
    pub fn new(factory: Box<dyn TrackerFactory>, max_track_len: usize) -> Self {
        BlobRegistry {
            blobs: Vec::new(),
            next_sequence: 0,
            max_track_len,
            factory,
        }
    }
    /// Registers a blob for the detection and initializes a fresh tracker with its box
    pub fn add(&mut self, detection: &Detection, frame: &Frame, frame_index: u64) -> Uuid {
        let tracker = self.factory.create();
        let blob = TrackedBlob::new(
            self.next_sequence,
            detection,
            tracker,
            frame,
            frame_index,
            self.max_track_len,
        );
        self.next_sequence += 1;
        let id = blob.get_id();
        debug!(blob_id = %id, bbox = ?detection.bbox, frame = frame_index, "blob created");
        self.blobs.push(blob);
        id
    }
    /// Removes blob and releases its tracker
    pub fn remove(&mut self, id: &Uuid) -> Option<TrackedBlob> {
        let idx = self.blobs.iter().position(|b| b.get_id() == *id)?;
        Some(self.blobs.remove(idx))
    }
    /// Removes every blob matching the predicate, returns ids of removed blobs
    pub fn remove_where<F>(&mut self, mut predicate: F, reason: &str) -> Vec<Uuid>
    where
        F: FnMut(&TrackedBlob) -> bool,
    {
        let mut removed = Vec::new();
        self.blobs.retain(|blob| {
            let delete = predicate(blob);
            if delete {
                debug!(
                    blob_id = %blob.get_id(),
                    detection_failures = blob.get_detection_failures(),
                    tracking_failures = blob.get_tracking_failures(),
                    reason,
                    "blob deleted"
                );
                removed.push(blob.get_id());
            }
            !delete // <- if we want to keep object closure should return true
        });
        removed
    }
    pub fn get(&self, id: &Uuid) -> Option<&TrackedBlob> {
        self.blobs.iter().find(|b| b.get_id() == *id)
    }
    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut TrackedBlob> {
        self.blobs.iter_mut().find(|b| b.get_id() == *id)
    }
    pub fn contains(&self, id: &Uuid) -> bool {
        self.get(id).is_some()
    }
    /// Iterates blobs in creation order
    pub fn iter(&self) -> std::slice::Iter<'_, TrackedBlob> {
        self.blobs.iter()
    }
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TrackedBlob> {
        self.blobs.iter_mut()
    }
    pub fn len(&self) -> usize {
        self.blobs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::test_data::{blank_frame, ScriptedTrackerFactory};
    use crate::utils::Rect;

    #[test]
    fn test_add_and_remove_releases_tracker() {
        let factory = ScriptedTrackerFactory::holding();
        let live = factory.live_trackers();
        let mut registry = BlobRegistry::new(Box::new(factory), 10);
        let frame = blank_frame(100, 100);

        let id1 = registry.add(&Detection::new(Rect::new(0.0, 0.0, 10.0, 10.0)), &frame, 0);
        let id2 = registry.add(&Detection::new(Rect::new(50.0, 50.0, 10.0, 10.0)), &frame, 0);
        assert_ne!(id1, id2);
        assert_eq!(registry.len(), 2);
        assert_eq!(live.get(), 2);

        let removed = registry.remove(&id1).unwrap();
        assert_eq!(removed.get_id(), id1);
        drop(removed);
        assert_eq!(live.get(), 1);
        assert!(!registry.contains(&id1));
        assert!(registry.remove(&id1).is_none());
    }

    #[test]
    fn test_creation_order_is_stable() {
        let mut registry = BlobRegistry::new(Box::new(ScriptedTrackerFactory::holding()), 10);
        let frame = blank_frame(100, 100);
        let ids: Vec<Uuid> = (0..5)
            .map(|i| {
                registry.add(
                    &Detection::new(Rect::new(i as f32 * 10.0, 0.0, 5.0, 5.0)),
                    &frame,
                    0,
                )
            })
            .collect();
        registry.remove(&ids[2]);
        let order: Vec<Uuid> = registry.iter().map(|b| b.get_id()).collect();
        assert_eq!(order, vec![ids[0], ids[1], ids[3], ids[4]]);
        let sequences: Vec<u64> = registry.iter().map(|b| b.get_sequence()).collect();
        assert_eq!(sequences, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_remove_where() {
        let factory = ScriptedTrackerFactory::holding();
        let live = factory.live_trackers();
        let mut registry = BlobRegistry::new(Box::new(factory), 10);
        let frame = blank_frame(100, 100);
        let keep = registry.add(&Detection::new(Rect::new(0.0, 0.0, 10.0, 10.0)), &frame, 0);
        let gone = registry.add(&Detection::new(Rect::new(60.0, 60.0, 10.0, 10.0)), &frame, 0);
        let removed = registry.remove_where(|b| b.get_center().x > 50.0, "test");
        assert_eq!(removed, vec![gone]);
        assert!(registry.contains(&keep));
        assert_eq!(live.get(), 1);
    }
}
