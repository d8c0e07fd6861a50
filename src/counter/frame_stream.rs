use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::counter::counter_errors::{CounterError, Result};
use crate::utils::Frame;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Source of frames. `Ok(None)` means the stream is exhausted.
pub trait FrameSource {
    fn read(&mut self) -> Result<Option<Frame>>;
}

/// Destination for annotated frames
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;
}

/// Reads image files of a directory in lexicographic file name order
pub struct ImageSequenceReader {
    files: Vec<PathBuf>,
    position: usize,
}

impl ImageSequenceReader {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(CounterError::config(format!(
                "no image files found in '{}'",
                dir.display()
            )));
        }
        debug!(dir = %dir.display(), frames = files.len(), "image sequence opened");
        Ok(ImageSequenceReader { files, position: 0 })
    }
    /// Total number of frames in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceReader {
    fn read(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };
        let frame = image::open(path)?.to_rgb8();
        self.position += 1;
        Ok(Some(frame))
    }
}

/// Writes frames as numbered PNG files (`frame_000000.png`, ...)
pub struct ImageSequenceWriter {
    dir: PathBuf,
    next_index: usize,
}

impl ImageSequenceWriter {
    /// Creates the output directory if needed
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(ImageSequenceWriter { dir, next_index: 0 })
    }
    pub fn frames_written(&self) -> usize {
        self.next_index
    }
}

impl FrameSink for ImageSequenceWriter {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.next_index));
        frame.save(&path)?;
        self.next_index += 1;
        Ok(())
    }
}
