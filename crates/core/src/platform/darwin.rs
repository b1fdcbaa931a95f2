use std::path::Path;
use std::process::Command as ProcessCommand;

use core_graphics::display::CGDisplay;
use core_graphics::event::*;
use core_graphics::event_source::*;
use core_graphics::geometry::*;

use crate::logger;
use crate::sleep;
use crate::types::*;
use super::{Capabilities, Platform};

pub struct DarwinPlatform {
    display: CGDisplay,
}

impl DarwinPlatform {
    pub fn new() -> Self {
        DarwinPlatform { display: CGDisplay::main() }
    }

    fn source() -> Option<CGEventSource> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState).ok()
    }
}

impl Platform for DarwinPlatform {
    fn screen_size(&self) -> Option<(u32, u32)> {
        let bounds = self.display.bounds();
        let (w, h) = (bounds.size.width as u32, bounds.size.height as u32);
        if w == 0 || h == 0 {
            return None;
        }
        Some((w, h))
    }

    fn capture(&mut self) -> Option<Capture> {
        let image = match self.display.image() {
            Some(i) => i,
            None => {
                logger::warn_p("darwin", "display capture failed (screen recording permission?)");
                return None;
            }
        };

        let bpr = image.bytes_per_row() as u32;
        let width = image.width() as u32;
        let height = image.height() as u32;

        let cf_data = image.data();
        Capture::from_bgra(cf_data.bytes(), width, height, bpr)
    }

    fn pointer_position(&self) -> Option<LogicalPoint> {
        let source = Self::source()?;
        let event = CGEvent::new(source).ok()?;
        let p = event.location();
        Some(LogicalPoint::new(p.x as i32, p.y as i32))
    }

    fn click(&mut self, at: LogicalPoint) {
        let point = CGPoint::new(at.x as f64, at.y as f64);
        let source = match Self::source() {
            Some(s) => s,
            None => {
                logger::error_p("darwin", "failed to create event source");
                return;
            }
        };

        if let Ok(mouse_down) = CGEvent::new_mouse_event(
            source.clone(),
            CGEventType::LeftMouseDown,
            point,
            CGMouseButton::Left,
        ) {
            mouse_down.post(CGEventTapLocation::HID);
        }

        sleep::sleep_ms(15);

        if let Ok(mouse_up) = CGEvent::new_mouse_event(
            source,
            CGEventType::LeftMouseUp,
            point,
            CGMouseButton::Left,
        ) {
            mouse_up.post(CGEventTapLocation::HID);
        }

        sleep::sleep_ms(15);
    }

    fn scroll(&mut self, at: LogicalPoint, lines: i32) {
        let Some(source) = Self::source() else { return };
        let point = CGPoint::new(at.x as f64, at.y as f64);

        // Scroll events go to whatever is under the pointer
        if let Ok(mv) = CGEvent::new_mouse_event(
            source.clone(),
            CGEventType::MouseMoved,
            point,
            CGMouseButton::Left,
        ) {
            mv.post(CGEventTapLocation::HID);
        }
        sleep::sleep_ms(15);

        if let Ok(wheel) = CGEvent::new_scroll_event(source, ScrollEventUnit::LINE, 1, lines, 0, 0) {
            wheel.post(CGEventTapLocation::HID);
        }
    }

    fn open(&mut self, path: &Path) -> std::io::Result<()> {
        let status = ProcessCommand::new("open")
            .arg(path)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!("open exited with {}", status)))
        }
    }

    fn probe(&mut self) -> Capabilities {
        let input = Self::source().is_some();
        let capture = self.display.image().is_some();
        logger::info_p("darwin", &format!("probe: input={} capture={}", input, capture));
        Capabilities { input, capture, classifier: false }
    }
}
