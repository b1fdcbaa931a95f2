use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::types::*;
use crate::logger;
use super::{Capabilities, Platform};

/// Logs every call and pretends to be a 1920x1080 display at 1x scale.
pub struct StubPlatform {
    size: (u32, u32),
    pointer: LogicalPoint,
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self {
            size: (1920, 1080),
            pointer: LogicalPoint::new(960, 540),
        }
    }
}

impl Platform for StubPlatform {
    fn screen_size(&self) -> Option<(u32, u32)> {
        Some(self.size)
    }

    fn capture(&mut self) -> Option<Capture> {
        logger::debug_p("stub", &format!("capture() -> blank {}x{}", self.size.0, self.size.1));
        Some(Capture::new(RgbaImage::from_pixel(
            self.size.0,
            self.size.1,
            Rgba([40, 40, 40, 255]),
        )))
    }

    fn pointer_position(&self) -> Option<LogicalPoint> {
        Some(self.pointer)
    }

    fn click(&mut self, at: LogicalPoint) {
        logger::info_p("stub", &format!("click{}", at));
        self.pointer = at;
    }

    fn scroll(&mut self, at: LogicalPoint, lines: i32) {
        logger::info_p("stub", &format!("scroll({}) at {}", lines, at));
        self.pointer = at;
    }

    fn open(&mut self, path: &Path) -> std::io::Result<()> {
        logger::info_p("stub", &format!("open(\"{}\")", path.display()));
        Ok(())
    }

    fn probe(&mut self) -> Capabilities {
        Capabilities { input: true, capture: true, classifier: false }
    }
}
