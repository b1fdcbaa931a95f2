pub mod stub;

#[cfg(target_os = "macos")]
pub mod darwin;

use std::path::Path;

use crate::error::{AutomationError, Result};
use crate::types::*;
use crate::logger;

/// Pointer position that aborts any injected click.
pub const FAILSAFE_CORNER: LogicalPoint = LogicalPoint::new(0, 0);

/// What the host environment can do. Probed once at startup and passed to
/// the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub input: bool,
    pub capture: bool,
    /// Gateway credentials are present. Informational only: without them
    /// every verdict is not-related and avatar searches end in a miss.
    pub classifier: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self { input: true, capture: true, classifier: true }
    }

    /// Log each missing capability once.
    pub fn report(&self) {
        if !self.input {
            logger::warn("pointer injection unavailable: click actions are disabled");
        }
        if !self.capture {
            logger::warn("screen capture unavailable: template and avatar actions are disabled");
        }
        if !self.classifier {
            logger::warn("classification gateway has no credentials: avatar messages will never match");
        }
    }
}

/// Host operations: screen geometry, capture, pointer injection, app launch.
pub trait Platform {
    /// Screen size in logical (pointer) coordinates.
    fn screen_size(&self) -> Option<(u32, u32)>;
    /// Full-screen capture in physical pixels.
    fn capture(&mut self) -> Option<Capture>;
    fn pointer_position(&self) -> Option<LogicalPoint>;
    fn click(&mut self, at: LogicalPoint);
    /// Scroll by `lines` wheel lines with the pointer at `at`.
    fn scroll(&mut self, at: LogicalPoint, lines: i32);
    /// Hand `path` to the OS open mechanism.
    fn open(&mut self, path: &Path) -> std::io::Result<()>;
    /// Probe input and capture availability. `classifier` is left false for
    /// the caller to fill in.
    fn probe(&mut self) -> Capabilities;
}

/// Click at `at` unless the pointer rests on the fail-safe corner.
pub fn guarded_click(platform: &mut dyn Platform, at: LogicalPoint) -> Result<()> {
    if platform.pointer_position() == Some(FAILSAFE_CORNER) {
        return Err(AutomationError::Aborted(format!(
            "pointer is in the fail-safe corner {}, refusing to click {}",
            FAILSAFE_CORNER, at
        )));
    }
    platform.click(at);
    Ok(())
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    if force_stub {
        return Box::new(stub::StubPlatform::default());
    }
    #[cfg(target_os = "macos")]
    {
        return Box::new(darwin::DarwinPlatform::new());
    }
    #[cfg(not(target_os = "macos"))]
    {
        logger::warn_p("stub", "no native platform for this OS, using stub");
        return Box::new(stub::StubPlatform::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::FakePlatform;

    #[test]
    fn failsafe_corner_blocks_click() {
        let mut p = FakePlatform::new((100, 100), 1.0);
        p.pointer = Some(FAILSAFE_CORNER);
        let err = guarded_click(&mut p, LogicalPoint::new(5, 5)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Aborted);
        assert!(p.clicks.is_empty());

        p.pointer = Some(LogicalPoint::new(50, 50));
        guarded_click(&mut p, LogicalPoint::new(5, 5)).unwrap();
        assert_eq!(p.clicks, vec![LogicalPoint::new(5, 5)]);
    }
}
