//! Saves what an avatar search saw: the raw chat capture and an annotated
//! copy with avatar boxes, text regions and click points (recommended in
//! blue, alternates in yellow).

use std::path::{Path, PathBuf};

use chrono::Local;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::error::{AutomationError, Result};
use crate::types::{Bounds, Capture, Detection, TextRegionAnalysis};

const AVATAR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const TEXT_CONTENT: Rgba<u8> = Rgba([255, 0, 0, 255]);
const TEXT_BLANK: Rgba<u8> = Rgba([128, 128, 128, 255]);
const CLICK: Rgba<u8> = Rgba([0, 0, 255, 255]);
const ALT_CLICK: Rgba<u8> = Rgba([255, 255, 0, 255]);

fn rect(b: Bounds) -> Option<Rect> {
    (!b.is_empty()).then(|| Rect::at(b.x as i32, b.y as i32).of_size(b.width, b.height))
}

pub fn annotate(
    chat: &Capture,
    detections: &[Detection],
    analyses: &[Option<TextRegionAnalysis>],
) -> RgbaImage {
    let mut out = chat.image.clone();
    for (det, analysis) in detections.iter().zip(analyses) {
        if let Some(r) = rect(det.bounds()) {
            draw_hollow_rect_mut(&mut out, r, AVATAR);
        }
        if let Some(a) = analysis {
            let color = if a.has_content { TEXT_CONTENT } else { TEXT_BLANK };
            if let Some(r) = rect(a.bounds) {
                draw_hollow_rect_mut(&mut out, r, color);
            }
        }
        let points = det.click_points();
        for alt in [points.avatar_right_edge, points.message_left_area] {
            draw_filled_circle_mut(&mut out, (alt.x, alt.y), 2, ALT_CLICK);
        }
        let p = points.recommended();
        draw_filled_circle_mut(&mut out, (p.x, p.y), 3, CLICK);
    }
    out
}

fn save(image: &RgbaImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|e| AutomationError::LoadFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write `chat_<ts>.png` and `annotated_<ts>.png` into `dir`. Returns the
/// annotated file's path.
pub fn save_search(
    dir: &Path,
    chat: &Capture,
    detections: &[Detection],
    analyses: &[Option<TextRegionAnalysis>],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| AutomationError::LoadFailure {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let ts = Local::now().format("%Y%m%d_%H%M%S_%3f");
    save(&chat.image, &dir.join(format!("chat_{}.png", ts)))?;
    let annotated = dir.join(format!("annotated_{}.png", ts));
    save(&annotate(chat, detections, analyses), &annotated)?;
    Ok(annotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhysicalPoint;

    fn scene() -> (Capture, Vec<Detection>, Vec<Option<TextRegionAnalysis>>) {
        let chat = Capture::new(RgbaImage::from_pixel(100, 60, Rgba([40, 40, 40, 255])));
        let det = Detection {
            template_id: "a.png".into(),
            position: PhysicalPoint::new(10, 10),
            width: 20,
            height: 20,
            confidence: 0.9,
        };
        let analysis = TextRegionAnalysis {
            bounds: Bounds::new(40, 10, 50, 30),
            density: 0.1,
            variance: 500.0,
            has_content: true,
        };
        (chat, vec![det], vec![Some(analysis)])
    }

    #[test]
    fn annotation_marks_boxes_and_click_point() {
        let (chat, dets, analyses) = scene();
        let out = annotate(&chat, &dets, &analyses);
        assert_eq!(*out.get_pixel(10, 10), AVATAR);
        assert_eq!(*out.get_pixel(40, 10), TEXT_CONTENT);
        assert_eq!(*out.get_pixel(20, 20), CLICK);
        assert_eq!(*out.get_pixel(25, 20), ALT_CLICK);
        assert_eq!(*out.get_pixel(5, 20), ALT_CLICK);
        assert_eq!(*out.get_pixel(60, 50), Rgba([40, 40, 40, 255]));
    }

    #[test]
    fn saves_both_images() {
        let dir = tempfile::tempdir().unwrap();
        let (chat, dets, analyses) = scene();
        let path = save_search(&dir.path().join("debug"), &chat, &dets, &analyses).unwrap();
        assert!(path.is_file());
        let count = std::fs::read_dir(dir.path().join("debug")).unwrap().count();
        assert_eq!(count, 2);
    }
}
