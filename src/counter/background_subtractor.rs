use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::counter::counter_errors::Result;
use crate::counter::{Detection, Detector, Roi};
use crate::utils::{Frame, Rect};

/// Classical motion detector: running-average background model over grayscale frames.
///
/// Pixels differing from the background by more than `threshold` form the foreground,
/// which is restricted to the ROI, dilated and split into 8-connected components.
/// The very first frame only primes the model.
pub struct BackgroundSubtractor {
    // Learning rate of the running average. Default is 0.05
    learning_rate: f32,
    // Foreground intensity threshold. Default is 30
    threshold: u8,
    // Minimum component area (pixels). Default is 100
    min_area: u32,
    // Dilation radius (L-inf). Default is 2
    dilate_radius: u8,
    background: Option<(u32, u32, Vec<f32>)>,
    // Cached ROI mask keyed by frame dimensions and vertices
    mask: Option<(u32, u32, Roi, GrayImage)>,
}

impl Default for BackgroundSubtractor {
    fn default() -> Self {
        BackgroundSubtractor::new(0.05, 30, 100, 2)
    }
}

impl BackgroundSubtractor {
    /// Creates new instance of BackgroundSubtractor
    ///
    /// Basic usage:
    ///
    /// ```
    /// use vehicle_counter::counter::BackgroundSubtractor;
    /// let learning_rate = 0.05;
    /// let threshold = 30;
    /// let min_area = 100;
    /// let dilate_radius = 2;
    /// let detector = BackgroundSubtractor::new(learning_rate, threshold, min_area, dilate_radius);
    /// ```
    pub fn new(learning_rate: f32, threshold: u8, min_area: u32, dilate_radius: u8) -> Self {
        BackgroundSubtractor {
            learning_rate: learning_rate.clamp(0.0, 1.0),
            threshold,
            min_area,
            dilate_radius,
            background: None,
            mask: None,
        }
    }
    fn refresh_mask(&mut self, roi: &Roi, width: u32, height: u32) {
        let stale = match &self.mask {
            Some((w, h, cached, _)) => *w != width || *h != height || cached != roi,
            None => true,
        };
        if stale {
            self.mask = Some((width, height, roi.clone(), roi.mask(width, height)));
        }
    }
}

impl Detector for BackgroundSubtractor {
    fn detect(&mut self, frame: &Frame, roi: &Roi) -> Result<Vec<Detection>> {
        let (width, height) = frame.dimensions();
        let gray = image::imageops::grayscale(frame);

        let background = match self.background.take() {
            Some((w, h, bg)) if w == width && h == height => bg,
            _ => {
                // (Re)prime the model, nothing to compare against yet
                let bg = gray.pixels().map(|p| p[0] as f32).collect();
                self.background = Some((width, height, bg));
                return Ok(vec![]);
            }
        };

        let threshold = self.threshold as f32;
        self.refresh_mask(roi, width, height);
        let mask = match &self.mask {
            Some((_, _, _, mask)) => mask,
            None => return Ok(vec![]),
        };
        let foreground = GrayImage::from_fn(width, height, |x, y| {
            let idx = (y * width + x) as usize;
            let diff = (gray.get_pixel(x, y)[0] as f32 - background[idx]).abs();
            if diff > threshold && mask.get_pixel(x, y)[0] > 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let alpha = self.learning_rate;
        let updated: Vec<f32> = background
            .iter()
            .zip(gray.pixels())
            .map(|(bg, px)| (1.0 - alpha) * bg + alpha * px[0] as f32)
            .collect();
        self.background = Some((width, height, updated));

        let dilated = if self.dilate_radius > 0 {
            dilate(&foreground, Norm::LInf, self.dilate_radius)
        } else {
            foreground
        };
        let labels = connected_components(&dilated, Connectivity::Eight, Luma([0u8]));

        // label -> (min_x, min_y, max_x, max_y, area)
        let mut components: HashMap<u32, (u32, u32, u32, u32, u32)> = HashMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0];
            if label == 0 {
                continue;
            }
            let entry = components.entry(label).or_insert((x, y, x, y, 0));
            entry.0 = entry.0.min(x);
            entry.1 = entry.1.min(y);
            entry.2 = entry.2.max(x);
            entry.3 = entry.3.max(y);
            entry.4 += 1;
        }

        let mut detections: Vec<Detection> = components
            .into_values()
            .filter(|(_, _, _, _, area)| *area >= self.min_area)
            .map(|(min_x, min_y, max_x, max_y, _)| {
                Rect::new(
                    min_x as f32,
                    min_y as f32,
                    (max_x - min_x + 1) as f32,
                    (max_y - min_y + 1) as f32,
                )
            })
            .filter(|bbox| roi.intersects_rect(bbox))
            .map(Detection::new)
            .collect();
        detections.sort_by(|a, b| {
            a.bbox
                .y
                .total_cmp(&b.bbox.y)
                .then(a.bbox.x.total_cmp(&b.bbox.x))
        });
        Ok(detections)
    }
    fn name(&self) -> &str {
        "bgsub"
    }
}
