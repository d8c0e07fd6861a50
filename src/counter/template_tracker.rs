use image::imageops::{crop_imm, grayscale};
use image::GrayImage;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use crate::counter::ObjectTracker;
use crate::utils::{Frame, Rect};

/// Appearance tracker based on template matching.
///
/// The template is the grayscale patch under the box given to `init`. On `update` it is
/// searched for inside a window around the last known box; the best placement is accepted
/// when its mean squared error (normalized to [0, 1]) does not exceed `max_error`.
#[derive(Debug, Clone)]
pub struct TemplateTracker {
    // Search window margin relative to box size. Default is 0.5
    search_margin: f32,
    // Max accepted normalized error. Default is 0.05
    max_error: f32,
    adaptive: bool,
    template: Option<GrayImage>,
    bbox: Rect,
}

impl Default for TemplateTracker {
    fn default() -> Self {
        TemplateTracker::new(0.5, 0.05)
    }
}

impl TemplateTracker {
    pub fn new(search_margin: f32, max_error: f32) -> Self {
        TemplateTracker {
            search_margin: f32::max(search_margin, 0.0),
            max_error,
            adaptive: false,
            template: None,
            bbox: Rect::default(),
        }
    }
    /// Refresh the template after every successful update
    pub fn adaptive(mut self) -> Self {
        self.adaptive = true;
        self
    }
    fn crop(gray: &GrayImage, bbox: &Rect) -> Option<GrayImage> {
        let (x, y, w, h) = pixel_bounds(bbox);
        if w == 0 || h == 0 {
            return None;
        }
        Some(crop_imm(gray, x, y, w, h).to_image())
    }
}

// Converts an already clamped box into integer pixel bounds
fn pixel_bounds(bbox: &Rect) -> (u32, u32, u32, u32) {
    let x = bbox.x.round().max(0.0) as u32;
    let y = bbox.y.round().max(0.0) as u32;
    let w = bbox.width.round().max(0.0) as u32;
    let h = bbox.height.round().max(0.0) as u32;
    (x, y, w, h)
}

impl ObjectTracker for TemplateTracker {
    fn init(&mut self, frame: &Frame, bbox: &Rect) {
        let (width, height) = frame.dimensions();
        let clamped = bbox.clamp_to(width, height);
        let gray = grayscale(frame);
        self.template = TemplateTracker::crop(&gray, &clamped);
        self.bbox = clamped;
    }
    fn update(&mut self, frame: &Frame) -> Option<Rect> {
        let template = self.template.as_ref()?;
        let (width, height) = frame.dimensions();
        let (tw, th) = template.dimensions();

        let window = self
            .bbox
            .expand(
                self.bbox.width * self.search_margin,
                self.bbox.height * self.search_margin,
            )
            .clamp_to(width, height);
        let (wx, wy, ww, wh) = pixel_bounds(&window);
        if ww < tw || wh < th || wx + ww > width || wy + wh > height {
            return None;
        }

        let gray = grayscale(frame);
        let search = crop_imm(&gray, wx, wy, ww, wh).to_image();
        let scores = match_template(&search, template, MatchTemplateMethod::SumOfSquaredErrors);
        let extremes = find_extremes(&scores);
        let normalized = extremes.min_value / (tw * th) as f32 / (255.0 * 255.0);
        if normalized > self.max_error {
            return None;
        }

        let (dx, dy) = extremes.min_value_location;
        let found = Rect::new((wx + dx) as f32, (wy + dy) as f32, tw as f32, th as f32);
        self.bbox = found;
        if self.adaptive {
            if let Some(refreshed) = TemplateTracker::crop(&gray, &found) {
                self.template = Some(refreshed);
            }
        }
        Some(found)
    }
}
