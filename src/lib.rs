//! Vehicle tracking and line-crossing counting.
//!
//! The engine re-detects objects every `di` frames, keeps a single-object tracker per
//! tracked blob in between, reconciles detections with existing blobs and emits a
//! count record once per blob whose centroid crosses the counting line.
pub mod counter;
pub mod utils;
