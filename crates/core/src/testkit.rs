//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::gateway::{Classifier, Verdict};
use crate::platform::{Capabilities, Platform};
use crate::sleep::Sleeper;
use crate::types::*;

/// Deterministic texture with no flat areas.
pub fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(12345);
    GrayImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        Luma([60 + ((state >> 16) % 180) as u8])
    })
}

pub fn paste(dst: &mut GrayImage, src: &GrayImage, x: u32, y: u32) {
    image::imageops::replace(dst, src, x as i64, y as i64);
}

/// Paste a luma patch into an RGBA buffer as neutral gray.
pub fn paste_rgba(dst: &mut RgbaImage, src: &GrayImage, x: u32, y: u32) {
    for (sx, sy, p) in src.enumerate_pixels() {
        let v = p[0];
        dst.put_pixel(x + sx, y + sy, Rgba([v, v, v, 255]));
    }
}

pub fn blank_screen(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([40, 40, 40, 255]))
}

/// In-memory platform. The physical screen is `logical * factor`.
/// Successive captures walk through `screens`, repeating the last one.
pub struct FakePlatform {
    pub logical: (u32, u32),
    pub screens: Vec<RgbaImage>,
    pub pointer: Option<LogicalPoint>,
    pub clicks: Vec<LogicalPoint>,
    pub scrolls: Vec<(LogicalPoint, i32)>,
    pub opens: Vec<PathBuf>,
    pub captures: usize,
    pub open_fails: bool,
    pub capabilities: Capabilities,
}

impl FakePlatform {
    pub fn new(logical: (u32, u32), factor: f64) -> Self {
        let w = (logical.0 as f64 * factor) as u32;
        let h = (logical.1 as f64 * factor) as u32;
        Self {
            logical,
            screens: vec![blank_screen(w, h)],
            pointer: Some(LogicalPoint::new(logical.0 as i32 / 2, logical.1 as i32 / 2)),
            clicks: Vec::new(),
            scrolls: Vec::new(),
            opens: Vec::new(),
            captures: 0,
            open_fails: false,
            capabilities: Capabilities { input: true, capture: true, classifier: false },
        }
    }
}

impl Platform for FakePlatform {
    fn screen_size(&self) -> Option<(u32, u32)> {
        Some(self.logical)
    }

    fn capture(&mut self) -> Option<Capture> {
        let idx = self.captures.min(self.screens.len().saturating_sub(1));
        self.captures += 1;
        self.screens.get(idx).cloned().map(Capture::new)
    }

    fn pointer_position(&self) -> Option<LogicalPoint> {
        self.pointer
    }

    fn click(&mut self, at: LogicalPoint) {
        self.clicks.push(at);
    }

    fn scroll(&mut self, at: LogicalPoint, lines: i32) {
        self.scrolls.push((at, lines));
    }

    fn open(&mut self, path: &Path) -> std::io::Result<()> {
        self.opens.push(path.to_path_buf());
        if self.open_fails {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "open refused"));
        }
        Ok(())
    }

    fn probe(&mut self) -> Capabilities {
        self.capabilities
    }
}

/// Answers from a queue; once empty every call is unrelated. Records the
/// keywords and region size of each call.
#[derive(Default)]
pub struct ScriptedClassifier {
    pub verdicts: VecDeque<Verdict>,
    pub calls: Vec<(Vec<String>, (u32, u32))>,
}

impl ScriptedClassifier {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        Self { verdicts: verdicts.into(), calls: Vec::new() }
    }
}

pub fn verdict(is_related: bool, confidence: u8) -> Verdict {
    Verdict {
        is_related,
        confidence,
        explanation: String::new(),
        extracted_content: String::new(),
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self, region: &RgbaImage, keywords: &[String]) -> Verdict {
        self.calls.push((keywords.to_vec(), region.dimensions()));
        self.verdicts
            .pop_front()
            .unwrap_or_else(|| Verdict::unrelated("script exhausted"))
    }
}

#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub slept: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}
