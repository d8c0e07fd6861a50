use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, CounterError>;

#[derive(Error, Debug)]
pub enum CounterError {
    #[error("Invalid region of interest: {0}")]
    InvalidRoi(String),

    #[error("Frame size mismatch: expected {expected:?}, got {actual:?}")]
    FrameSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Detector failure: {0}")]
    Detector(String),

    #[error("NoObjectInRegistry: {0}")]
    NoObject(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CounterError {
    pub fn invalid_roi<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRoi(msg.into())
    }
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
    pub fn detector<S: Into<String>>(msg: S) -> Self {
        Self::Detector(msg.into())
    }
}
