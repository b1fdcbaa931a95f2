//! Conversion between logical (pointer) and physical (capture) coordinates.
//!
//! A single scalar covers both axes; it is the mean of the horizontal and
//! vertical capture/logical ratios.

use crate::platform::Platform;
use crate::types::{LogicalPoint, PhysicalPoint};

/// Mean of the per-axis ratios `capture / logical`. Zero-sized logical
/// dimensions contribute a ratio of 0, which callers must reject.
pub fn scaling_factor(logical: (u32, u32), capture: (u32, u32)) -> f64 {
    let ratio = |c: u32, l: u32| if l == 0 { 0.0 } else { c as f64 / l as f64 };
    (ratio(capture.0, logical.0) + ratio(capture.1, logical.1)) / 2.0
}

/// Measure the factor by taking one capture and comparing its size with the
/// reported logical screen size. `None` when either side is unavailable.
pub fn detect_scaling(platform: &mut dyn Platform) -> Option<f64> {
    let logical = platform.screen_size()?;
    let capture = platform.capture()?;
    Some(scaling_factor(logical, (capture.width(), capture.height())))
}

pub fn to_physical(p: LogicalPoint, factor: f64) -> PhysicalPoint {
    PhysicalPoint::new((p.x as f64 * factor) as i32, (p.y as f64 * factor) as i32)
}

pub fn to_logical(p: PhysicalPoint, factor: f64) -> LogicalPoint {
    if factor == 0.0 {
        return LogicalPoint::new(p.x, p.y);
    }
    LogicalPoint::new((p.x as f64 / factor) as i32, (p.y as f64 / factor) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_uses_one_capture() {
        let mut p = crate::testkit::FakePlatform::new((200, 100), 2.0);
        assert_eq!(detect_scaling(&mut p), Some(2.0));
        assert_eq!(p.captures, 1);
    }

    #[test]
    fn retina_display_is_two() {
        assert_eq!(scaling_factor((1440, 900), (2880, 1800)), 2.0);
    }

    #[test]
    fn mismatched_axes_average() {
        assert_eq!(scaling_factor((100, 100), (200, 100)), 1.5);
    }

    #[test]
    fn degenerate_logical_size_gives_zero() {
        assert_eq!(scaling_factor((0, 0), (100, 100)), 0.0);
    }

    #[test]
    fn conversion_truncates() {
        assert_eq!(to_physical(LogicalPoint::new(3, 5), 1.5), PhysicalPoint::new(4, 7));
        assert_eq!(to_logical(PhysicalPoint::new(5, 9), 2.0), LogicalPoint::new(2, 4));
    }

    #[test]
    fn round_trip_within_one_unit() {
        for &factor in &[1.0, 1.25, 1.5, 2.0, 2.5, 3.0] {
            for x in (0..400).step_by(7) {
                for y in (0..300).step_by(11) {
                    let p = LogicalPoint::new(x, y);
                    let back = to_logical(to_physical(p, factor), factor);
                    assert!((back.x - x).abs() <= 1, "x {} f {} -> {}", x, factor, back.x);
                    assert!((back.y - y).abs() <= 1, "y {} f {} -> {}", y, factor, back.y);
                }
            }
        }
    }
}
