use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::counter::counter_errors::{CounterError, Result};
use crate::counter::{DetectorKind, LinePosition, MatchingAlgorithm, TrackerKind};
use crate::utils::Point;

/// What happens to a blob whose centroid leaves the region of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoiExitPolicy {
    /// Blob lives on until a failure counter expires it
    #[default]
    Keep,
    /// Blob is deleted on the frame its centroid leaves the ROI
    Delete,
}

/// Counter settings. Every field has a default, so partial YAML files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub detector: DetectorKind,
    pub tracker: TrackerKind,
    /// ROI vertices; full frame when absent
    pub roi: Option<Vec<Point>>,
    pub show_roi: bool,
    /// Max consecutive detection failures
    pub mcdf: usize,
    /// Max consecutive tracking failures
    pub mctf: usize,
    /// Detection interval in frames
    pub di: usize,
    pub line_position: LinePosition,
    pub min_iou: f32,
    pub matching: MatchingAlgorithm,
    pub duplicate_iou: f32,
    pub roi_exit_policy: RoiExitPolicy,
    pub max_track_len: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        CounterConfig {
            detector: DetectorKind::default(),
            tracker: TrackerKind::default(),
            roi: None,
            show_roi: false,
            mcdf: 2,
            mctf: 3,
            di: 10,
            line_position: LinePosition::Bottom,
            min_iou: 0.3,
            matching: MatchingAlgorithm::Greedy,
            duplicate_iou: 0.85,
            roi_exit_policy: RoiExitPolicy::Keep,
            max_track_len: 50,
        }
    }
}

impl CounterConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: CounterConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<()> {
        if self.di == 0 {
            return Err(CounterError::config("detection interval (di) must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_iou) {
            return Err(CounterError::config(format!(
                "min_iou must be within [0, 1], got {}",
                self.min_iou
            )));
        }
        if !(0.0..=1.0).contains(&self.duplicate_iou) {
            return Err(CounterError::config(format!(
                "duplicate_iou must be within [0, 1], got {}",
                self.duplicate_iou
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CounterConfig::default();
        assert_eq!(config.mcdf, 2);
        assert_eq!(config.mctf, 3);
        assert_eq!(config.di, 10);
        assert_eq!(config.line_position, LinePosition::Bottom);
        assert!(config.roi.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "
di: 5
line_position: left
roi:
  - { x: 0.0, y: 0.0 }
  - { x: 100.0, y: 0.0 }
  - { x: 50.0, y: 80.0 }
matching: hungarian
roi_exit_policy: delete
tracker: adaptive_template
detector: bgsub
";
        let config: CounterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.di, 5);
        assert_eq!(config.mcdf, 2);
        assert_eq!(config.line_position, LinePosition::Left);
        assert_eq!(config.roi.as_ref().map(|r| r.len()), Some(3));
        assert_eq!(config.matching, MatchingAlgorithm::Hungarian);
        assert_eq!(config.roi_exit_policy, RoiExitPolicy::Delete);
        assert_eq!(config.tracker, TrackerKind::AdaptiveTemplate);
    }

    #[test]
    fn test_validation() {
        let config = CounterConfig {
            di: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CounterError::Config(_))));
        let config = CounterConfig {
            min_iou: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let res = CounterConfig::load("/definitely/not/here.yaml");
        assert!(matches!(res, Err(CounterError::Io(_))));
    }
}
