//! Preview compositor.
//!
//! Draws detection overlays on a copy of the frame, downsamples to a bounded
//! width with area averaging, JPEG-encodes and base64-encodes the result for
//! transport inside a JSON line.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::config::PreviewSettings;
use crate::frame::Frame;
use crate::record::Detection;

const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const LINE_THICKNESS: i32 = 2;
/// Labels never start above this row so they stay on screen.
const LABEL_MIN_BASELINE: i32 = 20;
const LABEL_GAP: i32 = 4;

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;

pub struct PreviewCompositor {
    settings: PreviewSettings,
    resizer: fr::Resizer,
}

impl PreviewCompositor {
    pub fn new(settings: PreviewSettings) -> Self {
        Self {
            settings,
            resizer: fr::Resizer::new(),
        }
    }

    /// Render, encode and base64 a preview of `frame`.
    pub fn compose(&mut self, frame: &Frame, detections: &[Detection]) -> Result<String> {
        let image = self.render(frame, detections)?;
        let jpeg = encode_jpeg(&image, self.settings.jpeg_quality)?;
        Ok(STANDARD.encode(jpeg))
    }

    /// Overlay detections on a copy of `frame` and bound its width.
    pub fn render(&mut self, frame: &Frame, detections: &[Detection]) -> Result<RgbImage> {
        let mut image = frame.to_image()?;
        for detection in detections {
            draw_detection(&mut image, detection);
        }
        self.downscale(image)
    }

    fn downscale(&mut self, image: RgbImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let (out_w, out_h) = scaled_dimensions(width, height, self.settings.max_width);
        if (out_w, out_h) == (width, height) {
            return Ok(image);
        }

        let src = fr::images::ImageRef::new(width, height, image.as_raw(), fr::PixelType::U8x3)
            .context("failed to wrap preview for resize")?;
        let mut dst = fr::images::Image::new(out_w, out_h, fr::PixelType::U8x3);
        let options =
            fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Box));
        self.resizer
            .resize(&src, &mut dst, Some(&options))
            .context("preview downscale failed")?;

        RgbImage::from_raw(out_w, out_h, dst.into_vec())
            .ok_or_else(|| anyhow!("resized preview buffer does not match {}x{}", out_w, out_h))
    }
}

/// Output size for a preview bounded to `max_width`, preserving aspect ratio.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scale = f64::from(max_width) / f64::from(width);
    let out_h = (f64::from(height) * scale).round().max(1.0) as u32;
    (max_width, out_h)
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(image)
        .context("encode preview jpeg")?;
    Ok(bytes)
}

fn draw_detection(image: &mut RgbImage, detection: &Detection) {
    let (width, height) = image.dimensions();
    let fw = f64::from(width);
    let fh = f64::from(height);
    let x1 = (detection.x * fw) as i32;
    let y1 = (detection.y * fh) as i32;
    let x2 = ((detection.x + detection.w) * fw) as i32;
    let y2 = ((detection.y + detection.h) * fh) as i32;

    for inset in 0..LINE_THICKNESS {
        let w = x2 - x1 + 1 - 2 * inset;
        let h = y2 - y1 + 1 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            image,
            Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32),
            OVERLAY_COLOR,
        );
    }

    let label = format!("{}%", (detection.confidence * 100.0) as i32);
    let baseline = LABEL_MIN_BASELINE.max(y1 - LABEL_GAP);
    draw_label(image, &label, x1, baseline - GLYPH_HEIGHT);
}

fn draw_label(image: &mut RgbImage, text: &str, left: i32, top: i32) {
    let mut x = left;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (dy, bits) in rows.iter().enumerate() {
                for dx in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - dx)) & 1 == 1 {
                        put_pixel_clipped(image, x + dx, top + dy as i32);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

fn put_pixel_clipped(image: &mut RgbImage, x: i32, y: i32) {
    if x < 0 || y < 0 {
        return;
    }
    if let Some(pixel) = image.get_pixel_mut_checked(x as u32, y as u32) {
        *pixel = OVERLAY_COLOR;
    }
}

/// 5x7 bitmaps, one byte per row, MSB of the low five bits on the left.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        _ => return None,
    };
    Some(rows)
}
