//! Pixel box -> unit-square detection.
//!
//! Coordinates are expressed as fractions of the frame the box was detected
//! on. Origin and extent are clamped separately: `x, y` to `[0, 1]` and
//! `w, h` to `[MIN_EXTENT, 1]`, so even a sub-pixel detection yields a
//! drawable box. Geometry is rounded to 4 decimals and confidence to 3.
//!
//! A box flush with the right or bottom edge can round past the unit square
//! (`x + w > 1`); the extent is then shrunk to fit, but never below
//! `MIN_EXTENT`.

use crate::detect::PixelBox;
use crate::record::Detection;

/// Smallest width/height a detection may report.
pub const MIN_EXTENT: f64 = 0.01;

const GEOMETRY_DECIMALS: i32 = 4;
const CONFIDENCE_DECIMALS: i32 = 3;

pub fn normalize(bbox: &PixelBox, width: u32, height: u32) -> Detection {
    let fw = f64::from(width.max(1));
    let fh = f64::from(height.max(1));
    let x1 = f64::from(bbox.x1);
    let y1 = f64::from(bbox.y1);

    let x = round_to((x1 / fw).clamp(0.0, 1.0), GEOMETRY_DECIMALS);
    let y = round_to((y1 / fh).clamp(0.0, 1.0), GEOMETRY_DECIMALS);
    let w = round_to(
        ((f64::from(bbox.x2) - x1) / fw).clamp(MIN_EXTENT, 1.0),
        GEOMETRY_DECIMALS,
    );
    let h = round_to(
        ((f64::from(bbox.y2) - y1) / fh).clamp(MIN_EXTENT, 1.0),
        GEOMETRY_DECIMALS,
    );

    Detection {
        x,
        y,
        w: fit_extent(x, w),
        h: fit_extent(y, h),
        confidence: round_to(
            f64::from(bbox.confidence).clamp(0.0, 1.0),
            CONFIDENCE_DECIMALS,
        ),
    }
}

fn fit_extent(origin: f64, extent: f64) -> f64 {
    if origin + extent <= 1.0 {
        return extent;
    }
    round_to((1.0 - origin).max(MIN_EXTENT), GEOMETRY_DECIMALS)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> PixelBox {
        PixelBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    fn decimals_at_most(value: f64, decimals: i32) -> bool {
        (round_to(value, decimals) - value).abs() < 1e-12
    }

    #[test]
    fn portrait_frame_box() {
        let det = normalize(&bbox(10.0, 20.0, 110.0, 220.0, 0.5), 200, 400);
        assert_eq!(det.x, 0.05);
        assert_eq!(det.y, 0.05);
        assert_eq!(det.w, 0.5);
        assert_eq!(det.h, 0.5);
        assert_eq!(det.confidence, 0.5);
    }

    #[test]
    fn sub_pixel_box_gets_minimum_extent() {
        let det = normalize(&bbox(100.0, 100.0, 100.2, 100.1, 0.3), 1920, 1080);
        assert_eq!(det.w, MIN_EXTENT);
        assert_eq!(det.h, MIN_EXTENT);
    }

    #[test]
    fn right_edge_box_stays_inside_unit_square() {
        for (x1, width) in [(150.0, 200), (1.0, 3), (641.0, 1921), (990.0, 1000)] {
            let det = normalize(&bbox(x1, 0.0, width as f32, 10.0, 0.9), width, 100);
            assert!(
                det.x + det.w <= 1.0 + 1e-9,
                "x={} w={} for x1={} width={}",
                det.x,
                det.w,
                x1,
                width
            );
            assert!(det.w >= MIN_EXTENT);
        }
    }

    #[test]
    fn in_frame_boxes_respect_bounds_and_precision() {
        let (width, height) = (1280u32, 720u32);
        let mut seed = 17u32;
        let mut next = |max: u32| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 8) % (max + 1)
        };
        for _ in 0..500 {
            let xa = next(width) as f32;
            let xb = next(width) as f32;
            let ya = next(height) as f32;
            let yb = next(height) as f32;
            let conf = next(1000) as f32 / 1000.0;
            let det = normalize(
                &bbox(xa.min(xb), ya.min(yb), xa.max(xb), ya.max(yb), conf),
                width,
                height,
            );

            assert!((0.0..=1.0).contains(&det.x));
            assert!((0.0..=1.0).contains(&det.y));
            assert!((MIN_EXTENT..=1.0).contains(&det.w));
            assert!((MIN_EXTENT..=1.0).contains(&det.h));
            assert!((0.0..=1.0).contains(&det.confidence));
            assert!(decimals_at_most(det.x, 4));
            assert!(decimals_at_most(det.w, 4));
            assert!(decimals_at_most(det.confidence, 3));
        }
    }

    #[test]
    fn out_of_frame_origin_is_clamped() {
        let det = normalize(&bbox(-20.0, -5.0, 50.0, 50.0, 1.0), 100, 100);
        assert_eq!(det.x, 0.0);
        assert_eq!(det.y, 0.0);
    }
}
