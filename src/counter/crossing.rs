use std::fmt;

use chrono::{DateTime, Local};
use tracing::info;
use uuid::Uuid;

use crate::counter::{BlobRegistry, CountingLine};
use crate::utils::euclidean_distance;

/// Datetime layout used in count logs
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Emitted once per blob when it crosses the counting line
#[derive(Debug, Clone, PartialEq)]
pub struct CountRecord {
    pub blob_id: Uuid,
    /// Running total at the moment of this event
    pub count: usize,
    pub datetime: DateTime<Local>,
}

impl fmt::Display for CountRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "v_{}, {}, {}",
            self.blob_id,
            self.count,
            self.datetime.format(DATETIME_FORMAT)
        )
    }
}

/// Decides crossing events and keeps the running total
#[derive(Debug, Clone)]
pub struct CrossingEvaluator {
    line: CountingLine,
    total: usize,
}

impl CrossingEvaluator {
    pub fn new(line: CountingLine) -> Self {
        CrossingEvaluator { line, total: 0 }
    }
    pub fn get_line(&self) -> &CountingLine {
        &self.line
    }
    /// Running total, never decreases
    pub fn total(&self) -> usize {
        self.total
    }
    /// Checks every not yet counted blob for an inside-to-outside transition
    /// between its previous and current centroid, then advances the previous centroid
    /// of every blob.
    pub fn evaluate(&mut self, registry: &mut BlobRegistry) -> Vec<CountRecord> {
        let mut records = Vec::new();
        for blob in registry.iter_mut() {
            if !blob.is_counted()
                && self
                    .line
                    .is_crossing(&blob.get_previous_center(), &blob.get_center())
                && blob.mark_counted()
            {
                self.total += 1;
                let record = CountRecord {
                    blob_id: blob.get_id(),
                    count: self.total,
                    datetime: Local::now(),
                };
                let step = euclidean_distance(&blob.get_previous_center(), &blob.get_center());
                info!(blob_id = %record.blob_id, count = record.count, step, "vehicle counted");
                records.push(record);
            }
            blob.commit_position();
        }
        records
    }
}
