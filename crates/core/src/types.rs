use std::fmt;
use std::marker::PhantomData;

use image::{GrayImage, RgbaImage};

/// Coordinate space used for pointer placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Logical;

/// Coordinate space of captured pixel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Physical;

/// A point tagged with its coordinate space. Points from different spaces
/// cannot be compared or measured against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point<S> {
    pub x: i32,
    pub y: i32,
    space: PhantomData<S>,
}

pub type LogicalPoint = Point<Logical>;
pub type PhysicalPoint = Point<Physical>;

impl<S> Point<S> {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y, space: PhantomData }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Euclidean distance to another point of the same space.
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl<S> fmt::Display for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned box in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Immutable screenshot in physical pixels. `origin` is where the buffer's
/// top-left pixel sits in full-screen physical space, so a cropped region
/// still knows how to map back onto the screen.
#[derive(Debug, Clone)]
pub struct Capture {
    pub image: RgbaImage,
    pub origin: PhysicalPoint,
}

impl Capture {
    pub fn new(image: RgbaImage) -> Self {
        Self { image, origin: PhysicalPoint::new(0, 0) }
    }

    /// Build a capture from a raw BGRA buffer whose rows may be padded.
    pub fn from_bgra(data: &[u8], width: u32, height: u32, bytes_per_row: u32) -> Option<Self> {
        if bytes_per_row < width * 4 || data.len() < (bytes_per_row * height) as usize {
            return None;
        }
        let mut image = RgbaImage::new(width, height);
        for (x, y, px) in image.enumerate_pixels_mut() {
            let idx = (y * bytes_per_row + x * 4) as usize;
            px.0 = [data[idx + 2], data[idx + 1], data[idx], data[idx + 3]];
        }
        Some(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn gray(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }

    /// Crop to `rect` (buffer-relative), clipped to the buffer. Returns `None`
    /// when nothing of `rect` lies inside the buffer.
    pub fn crop(&self, rect: Bounds) -> Option<Capture> {
        if rect.x >= self.width() || rect.y >= self.height() {
            return None;
        }
        let width = rect.width.min(self.width() - rect.x);
        let height = rect.height.min(self.height() - rect.y);
        if width == 0 || height == 0 {
            return None;
        }
        let image = image::imageops::crop_imm(&self.image, rect.x, rect.y, width, height).to_image();
        Some(Capture {
            image,
            origin: self.origin.offset(rect.x as i32, rect.y as i32),
        })
    }

    /// Translate a buffer-relative point into full-screen physical space.
    pub fn to_screen(&self, p: PhysicalPoint) -> PhysicalPoint {
        p.offset(self.origin.x, self.origin.y)
    }
}

/// One template match inside a capture. Positions are buffer-relative
/// physical pixels of the capture that was searched.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub template_id: String,
    pub position: PhysicalPoint,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl Detection {
    pub fn center(&self) -> PhysicalPoint {
        self.position
            .offset(self.width as i32 / 2, self.height as i32 / 2)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.position.x.max(0) as u32,
            self.position.y.max(0) as u32,
            self.width,
            self.height,
        )
    }

    /// Candidate click points, recommended first.
    pub fn click_points(&self) -> ClickPoints {
        let center = self.center();
        ClickPoints {
            avatar_center: center,
            avatar_right_edge: PhysicalPoint::new(self.position.x + self.width as i32 - 5, center.y),
            message_left_area: PhysicalPoint::new((self.position.x - 10).max(5), center.y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickPoints {
    pub avatar_center: PhysicalPoint,
    pub avatar_right_edge: PhysicalPoint,
    pub message_left_area: PhysicalPoint,
}

impl ClickPoints {
    pub fn recommended(&self) -> PhysicalPoint {
        self.avatar_center
    }
}

/// Signal features of the sub-region next to a detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRegionAnalysis {
    pub bounds: Bounds,
    pub density: f64,
    pub variance: f64,
    pub has_content: bool,
}

/// Where a click target came from.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSource {
    Named(String),
    Literal,
    Template { name: String, path: String },
    Detection { template_id: String },
}

/// A resolved click target, always in logical space.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickTarget {
    pub point: LogicalPoint,
    pub source: TargetSource,
}

/// Retry bookkeeping for the avatar-keyword scroll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollAttemptState {
    pub attempt_number: u32,
    pub max_attempts: u32,
}

impl ScrollAttemptState {
    pub fn new(max_attempts: u32) -> Self {
        Self { attempt_number: 0, max_attempts }
    }

    /// Count one scroll. Returns false once the budget is spent.
    pub fn advance(&mut self) -> bool {
        self.attempt_number += 1;
        !self.is_terminal()
    }

    pub fn is_terminal(&self) -> bool {
        self.attempt_number > self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_rows_with_padding_convert_to_rgba() {
        // 1x2 image, 8 bytes per row (4 bytes padding)
        let data = vec![
            10, 20, 30, 255, 0, 0, 0, 0, //
            1, 2, 3, 255, 0, 0, 0, 0,
        ];
        let cap = Capture::from_bgra(&data, 1, 2, 8).unwrap();
        assert_eq!(cap.image.get_pixel(0, 0).0, [30, 20, 10, 255]);
        assert_eq!(cap.image.get_pixel(0, 1).0, [3, 2, 1, 255]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(Capture::from_bgra(&[0; 4], 2, 1, 8).is_none());
    }

    #[test]
    fn crop_clips_and_tracks_origin() {
        let cap = Capture::new(RgbaImage::new(100, 50));
        let region = cap.crop(Bounds::new(80, 40, 50, 50)).unwrap();
        assert_eq!((region.width(), region.height()), (20, 10));
        assert_eq!(region.origin, PhysicalPoint::new(80, 40));
        assert_eq!(region.to_screen(PhysicalPoint::new(1, 1)), PhysicalPoint::new(81, 41));
        assert!(cap.crop(Bounds::new(100, 0, 10, 10)).is_none());
    }

    #[test]
    fn scroll_state_allows_exactly_max_scrolls() {
        let mut state = ScrollAttemptState::new(2);
        assert!(state.advance());
        assert!(state.advance());
        assert!(!state.advance());
        assert!(state.is_terminal());
    }

    #[test]
    fn click_points_prefer_center() {
        let det = Detection {
            template_id: "a.png".into(),
            position: PhysicalPoint::new(2, 10),
            width: 20,
            height: 30,
            confidence: 0.9,
        };
        let points = det.click_points();
        assert_eq!(points.recommended(), PhysicalPoint::new(12, 25));
        assert_eq!(points.avatar_right_edge, PhysicalPoint::new(17, 25));
        assert_eq!(points.message_left_area, PhysicalPoint::new(5, 25));
    }
}
