//! Text-region derivation and cheap content signals (edge density, luma
//! variance) for the area next to a detected avatar.

use image::GrayImage;
use imageproc::edges::canny;

use crate::settings::{ContentThresholds, TextRegionLayout};
use crate::types::{Bounds, Detection, TextRegionAnalysis};

/// Region to the right of `detection`, top-aligned with it, clipped to a
/// `capture_w` x `capture_h` buffer. `None` when its origin is outside.
pub fn derive_bounds(
    detection: &Detection,
    capture_w: u32,
    capture_h: u32,
    layout: &TextRegionLayout,
) -> Option<Bounds> {
    let x = detection.position.x + detection.width as i32 + layout.offset_x as i32;
    let y = detection.position.y;
    if x < 0 || y < 0 {
        return None;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= capture_w || y >= capture_h {
        return None;
    }
    Some(Bounds::new(
        x,
        y,
        layout.width.min(capture_w - x),
        layout.height.min(capture_h - y),
    ))
}

/// Fraction of pixels Canny marks as edges.
pub fn edge_density(region: &GrayImage, low: f32, high: f32) -> f64 {
    let total = region.width() as u64 * region.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let edges = canny(region, low, high);
    let count = edges.pixels().filter(|p| p[0] > 0).count() as u64;
    count as f64 / total as f64
}

/// Population variance of the luma values.
pub fn variance(region: &GrayImage) -> f64 {
    let n = region.width() as f64 * region.height() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = region.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    region
        .pixels()
        .map(|p| {
            let d = p[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Derive the text region for `detection` inside `gray` and measure it.
/// Content requires both enough edges and enough variance.
pub fn analyze(
    gray: &GrayImage,
    detection: &Detection,
    layout: &TextRegionLayout,
    thresholds: &ContentThresholds,
) -> Option<TextRegionAnalysis> {
    let bounds = derive_bounds(detection, gray.width(), gray.height(), layout)?;
    let region = image::imageops::crop_imm(gray, bounds.x, bounds.y, bounds.width, bounds.height).to_image();

    let density = edge_density(&region, thresholds.canny_low, thresholds.canny_high);
    let variance = variance(&region);
    Some(TextRegionAnalysis {
        bounds,
        density,
        variance,
        has_content: density > thresholds.min_edge_density && variance > thresholds.min_variance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhysicalPoint;
    use image::Luma;

    fn det(x: i32, y: i32, w: u32, h: u32) -> Detection {
        Detection {
            template_id: "a.png".into(),
            position: PhysicalPoint::new(x, y),
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    fn layout(offset_x: u32, width: u32, height: u32) -> TextRegionLayout {
        TextRegionLayout { offset_x, width, height }
    }

    #[test]
    fn region_sits_right_of_avatar() {
        let b = derive_bounds(&det(10, 20, 30, 30), 500, 400, &layout(10, 100, 50)).unwrap();
        assert_eq!(b, Bounds::new(50, 20, 100, 50));
    }

    #[test]
    fn region_is_clipped_not_rejected() {
        let b = derive_bounds(&det(10, 80, 30, 30), 120, 100, &layout(10, 420, 222)).unwrap();
        assert_eq!(b, Bounds::new(50, 80, 70, 20));
    }

    #[test]
    fn origin_outside_gives_none() {
        assert!(derive_bounds(&det(80, 0, 30, 30), 120, 100, &layout(10, 50, 50)).is_none());
        assert!(derive_bounds(&det(0, 100, 10, 10), 120, 100, &layout(0, 50, 50)).is_none());
    }

    #[test]
    fn blank_region_has_no_content() {
        let gray = GrayImage::from_pixel(300, 100, Luma([128]));
        let a = analyze(&gray, &det(0, 0, 10, 10), &layout(0, 280, 50), &ContentThresholds::default()).unwrap();
        assert_eq!(a.density, 0.0);
        assert_eq!(a.variance, 0.0);
        assert!(!a.has_content);
    }

    #[test]
    fn textured_region_has_content() {
        let gray = GrayImage::from_fn(300, 100, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 { Luma([0]) } else { Luma([255]) }
        });
        let a = analyze(&gray, &det(0, 0, 10, 10), &layout(0, 280, 50), &ContentThresholds::default()).unwrap();
        assert!(a.density > 0.02, "density {}", a.density);
        assert!(a.variance > 100.0);
        assert!(a.has_content);
    }

    #[test]
    fn high_variance_alone_is_not_content() {
        // one vertical step: large variance, almost no edges
        let gray = GrayImage::from_fn(300, 100, |x, _| if x < 150 { Luma([0]) } else { Luma([255]) });
        let a = analyze(&gray, &det(0, 0, 10, 10), &layout(0, 280, 50), &ContentThresholds::default()).unwrap();
        assert!(a.variance > 100.0);
        assert!(a.density < 0.02, "density {}", a.density);
        assert!(!a.has_content);
    }

    #[test]
    fn variance_of_two_levels() {
        let gray = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 20 }]));
        assert_eq!(variance(&gray), 100.0);
    }
}
