use image::Rgb;
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_polygon_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect as PixelRect;
use itertools::Itertools;

use crate::counter::{BlobRegistry, CountingLine, Roi, TrackedBlob};
use crate::utils::{Frame, Rect};

pub const ROI_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const LINE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
pub const BLOB_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const COUNTED_BLOB_COLOR: Rgb<u8> = Rgb([255, 160, 0]);
pub const TRAIL_COLOR: Rgb<u8> = Rgb([0, 200, 255]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const TEXT_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

const CHAR_WIDTH: i32 = 6;
const CHAR_HEIGHT: i32 = 7;

/// Renders counter state on top of a copy of `frame`.
///
/// Draws the ROI polygon (when given), every blob's box, centroid and trail together
/// with its short id, the counting line and the running total. The input frame is not modified.
pub fn draw_overlay(
    frame: &Frame,
    roi: Option<&Roi>,
    blobs: &BlobRegistry,
    line: &CountingLine,
    total: usize,
) -> Frame {
    let mut canvas = frame.clone();
    if let Some(roi) = roi {
        draw_roi(&mut canvas, roi);
    }
    for blob in blobs.iter() {
        draw_blob(&mut canvas, blob);
    }
    draw_counting_line(&mut canvas, line);
    draw_text(
        &mut canvas,
        &format!("COUNT: {}", total),
        10,
        10,
        TEXT_COLOR,
        Some(TEXT_BACKGROUND),
    );
    canvas
}

fn draw_roi(canvas: &mut Frame, roi: &Roi) {
    let polygon: Vec<PixelPoint<f32>> = roi
        .vertices()
        .iter()
        .map(|v| PixelPoint::new(v.x, v.y))
        .collect();
    draw_hollow_polygon_mut(canvas, &polygon, ROI_COLOR);
}

fn draw_counting_line(canvas: &mut Frame, line: &CountingLine) {
    let (start, end) = line.endpoints();
    // Two pixels wide
    let (dx, dy) = if start.y == end.y { (0.0, 1.0) } else { (1.0, 0.0) };
    for k in 0..2 {
        let shift = k as f32;
        draw_line_segment_mut(
            canvas,
            (start.x + dx * shift, start.y + dy * shift),
            (end.x + dx * shift, end.y + dy * shift),
            LINE_COLOR,
        );
    }
}

fn draw_blob(canvas: &mut Frame, blob: &TrackedBlob) {
    let color = if blob.is_counted() {
        COUNTED_BLOB_COLOR
    } else {
        BLOB_COLOR
    };
    let bbox = blob.get_bbox();
    draw_hollow_rect_mut(canvas, to_pixel_rect(&bbox), color);

    for (a, b) in blob.get_track().iter().tuple_windows() {
        draw_line_segment_mut(canvas, (a.x, a.y), (b.x, b.y), TRAIL_COLOR);
    }
    let center = blob.get_center();
    draw_filled_circle_mut(
        canvas,
        (center.x.round() as i32, center.y.round() as i32),
        2,
        color,
    );
    draw_text(
        canvas,
        &blob.short_id(),
        bbox.x.round() as i32,
        bbox.y.round() as i32 - CHAR_HEIGHT - 3,
        color,
        Some(TEXT_BACKGROUND),
    );
}

fn to_pixel_rect(bbox: &Rect) -> PixelRect {
    PixelRect::at(bbox.x.round() as i32, bbox.y.round() as i32).of_size(
        u32::max(bbox.width.round() as u32, 1),
        u32::max(bbox.height.round() as u32, 1),
    )
}

/// Draws text with the built-in 5x7 bitmap font. Pixels outside the image are skipped.
pub fn draw_text(
    canvas: &mut Frame,
    text: &str,
    x: i32,
    y: i32,
    color: Rgb<u8>,
    background: Option<Rgb<u8>>,
) {
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let mut put = |px: i32, py: i32, c: Rgb<u8>| {
        if px >= 0 && py >= 0 && px < width && py < height {
            canvas.put_pixel(px as u32, py as u32, c);
        }
    };
    if let Some(bg) = background {
        let text_width = text.chars().count() as i32 * CHAR_WIDTH + 2;
        for dy in 0..CHAR_HEIGHT + 2 {
            for dx in 0..text_width {
                put(x + dx, y + dy, bg);
            }
        }
    }
    for (i, ch) in text.to_uppercase().chars().enumerate() {
        let char_x = x + 1 + i as i32 * CHAR_WIDTH;
        for (row, &bits) in glyph(ch).iter().enumerate() {
            for col in 0..5 {
                if (bits >> (4 - col)) & 1 == 1 {
                    put(char_x + col, y + 1 + row as i32, color);
                }
            }
        }
    }
}

// Rows of a 5x7 glyph, most significant of the low five bits is the leftmost column
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        ' ' => [0; 7],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::test_data::{blank_frame, ScriptedTrackerFactory};
    use crate::counter::{Detection, LinePosition};
    use crate::utils::Point;

    #[test]
    fn test_overlay_draws_state() {
        let frame = blank_frame(100, 100);
        let roi = Roi::new(
            vec![
                Point::new(5.0, 5.0),
                Point::new(95.0, 5.0),
                Point::new(95.0, 95.0),
                Point::new(5.0, 95.0),
            ],
            100,
            100,
        )
        .unwrap();
        let line = CountingLine::new(&roi, LinePosition::Bottom);
        let mut registry = BlobRegistry::new(Box::new(ScriptedTrackerFactory::holding()), 10);
        registry.add(&Detection::new(Rect::new(40.0, 40.0, 20.0, 20.0)), &frame, 0);

        let out = draw_overlay(&frame, Some(&roi), &registry, &line, 0);
        // Line sits at 5 + 0.8 * 90 = 77
        assert_eq!(*out.get_pixel(50, 77), LINE_COLOR);
        assert_eq!(*out.get_pixel(40, 50), BLOB_COLOR);
        assert_eq!(*out.get_pixel(50, 50), BLOB_COLOR);
        assert_eq!(*out.get_pixel(95, 50), ROI_COLOR);
        // Input untouched
        assert_eq!(*frame.get_pixel(50, 77), Rgb([0, 0, 0]));

        let without_roi = draw_overlay(&frame, None, &registry, &line, 0);
        assert_eq!(*without_roi.get_pixel(95, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_text_clips() {
        let mut canvas = blank_frame(20, 12);
        draw_text(&mut canvas, "8", 0, 0, TEXT_COLOR, None);
        // Top row of '8' is 0b01110
        assert_eq!(*canvas.get_pixel(1, 1), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(2, 1), TEXT_COLOR);
        // Partially outside the canvas must not panic
        draw_text(&mut canvas, "COUNT: 12", 15, 8, TEXT_COLOR, Some(TEXT_BACKGROUND));
        draw_text(&mut canvas, "ab", -4, -3, TEXT_COLOR, None);
    }
}
