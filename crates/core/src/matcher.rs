//! Template matching on luma buffers, scored with zero-mean normalized
//! cross-correlation.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::{find_extremes, match_template_parallel, Extremes, MatchTemplateMethod};

use crate::error::{AutomationError, Result};
use crate::logger;
use crate::types::{Capture, Detection, PhysicalPoint};

/// Default minimum score for a match.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// A reference image, identified by the path it was loaded from.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub path: PathBuf,
    pub image: GrayImage,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AutomationError::ResourceNotFound(path.to_path_buf()));
        }
        let image = image::open(path)
            .map_err(|e| AutomationError::LoadFailure {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_luma8();
        Ok(Self::from_image(path, image))
    }

    pub fn from_image(path: impl Into<PathBuf>, image: GrayImage) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { id, path, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Running sums of pixel values and squared values, one row and column
/// larger than the image so any window sum is four lookups.
struct SumTable {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl SumTable {
    fn new(image: &GrayImage) -> Self {
        let stride = image.width() as usize + 1;
        let rows = image.height() as usize + 1;
        let mut sum = vec![0u64; stride * rows];
        let mut sq = vec![0u64; stride * rows];
        for y in 0..image.height() as usize {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..image.width() as usize {
                let v = image.get_pixel(x as u32, y as u32)[0] as u64;
                row_sum += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row_sum;
                sq[i] = sq[i - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    /// (sum, sum of squares) over the `w` x `h` window at (x, y).
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (u64, u64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |t: &[u64], x: usize, y: usize| t[y * self.stride + x];
        let rect = |t: &[u64]| at(t, x1, y1) + at(t, x0, y0) - at(t, x1, y0) - at(t, x0, y1);
        (rect(&self.sum), rect(&self.sq))
    }
}

/// Pixel count, sum and `n^2 * variance` of a template, exact in integers.
struct TemplateStats {
    n: u128,
    sum: u128,
    var: u128,
}

impl TemplateStats {
    fn new(template: &GrayImage) -> Self {
        let n = template.width() as u128 * template.height() as u128;
        let (sum, sq) = template.pixels().fold((0u128, 0u128), |(s, q), p| {
            let v = p[0] as u128;
            (s + v, q + v * v)
        });
        Self { n, sum, var: n * sq - sum * sum }
    }

    /// Centred score of the window at (x, y) given its raw cross-correlation.
    fn score(&self, table: &SumTable, x: u32, y: u32, w: u32, h: u32, cross: f64) -> f32 {
        let (s, q) = table.window(x, y, w, h);
        let (s, q) = (s as u128, q as u128);
        let i_var = self.n * q - s * s;
        if i_var == 0 || self.var == 0 {
            return 0.0;
        }
        let numerator = self.n as f64 * cross - self.sum as f64 * s as f64;
        let denominator = (i_var as f64).sqrt() * (self.var as f64).sqrt();
        (numerator / denominator) as f32
    }
}

fn fits(haystack: &GrayImage, template: &GrayImage) -> bool {
    let (tw, th) = template.dimensions();
    tw > 0 && th > 0 && tw <= haystack.width() && th <= haystack.height()
}

/// Zero-mean normalized cross-correlation of `template` at every alignment
/// inside `haystack`, in [-1, 1]. Flat windows and flat templates score 0.
/// `None` when the template does not fit.
fn score_map(haystack: &GrayImage, template: &GrayImage) -> Option<ImageBuffer<Luma<f32>, Vec<f32>>> {
    if !fits(haystack, template) {
        return None;
    }
    let (tw, th) = template.dimensions();
    let stats = TemplateStats::new(template);
    let cross = match_template_parallel(haystack, template, MatchTemplateMethod::CrossCorrelation);
    let table = SumTable::new(haystack);

    Some(ImageBuffer::from_fn(cross.width(), cross.height(), |x, y| {
        Luma([stats.score(&table, x, y, tw, th, cross.get_pixel(x, y)[0] as f64)])
    }))
}

/// Coarse template side, in pixels, that the pyramid pass keeps at minimum.
const COARSE_MIN_SIDE: u32 = 12;
/// How far below the wanted score a coarse alignment may fall and still be
/// refined at full resolution.
const COARSE_SLACK: f32 = 0.3;

/// Downscale factor for the coarse pass: 1 (exhaustive), 2 or 4.
fn pyramid_step(template: &GrayImage) -> u32 {
    match template.width().min(template.height()) / COARSE_MIN_SIDE {
        0 | 1 => 1,
        2 | 3 => 2,
        _ => 4,
    }
}

/// Shrink by exactly `step`, dropping the right and bottom remainder.
fn downscale(image: &GrayImage, step: u32) -> GrayImage {
    let (w, h) = (image.width() / step, image.height() / step);
    let trimmed = imageops::crop_imm(image, 0, 0, w * step, h * step).to_image();
    imageops::resize(&trimmed, w, h, FilterType::Triangle)
}

fn cross_at(haystack: &GrayImage, template: &GrayImage, x: u32, y: u32) -> u64 {
    template
        .enumerate_pixels()
        .map(|(tx, ty, t)| t[0] as u64 * haystack.get_pixel(x + tx, y + ty)[0] as u64)
        .sum()
}

/// Score every alignment at or above `floor`, row-major. Large templates
/// are first matched on a downscaled pair; only alignments near a promising
/// coarse score are scored at full resolution.
fn scored(haystack: &GrayImage, template: &GrayImage, floor: f32) -> Option<Vec<(u32, u32, f32)>> {
    if !fits(haystack, template) {
        return None;
    }
    let step = pyramid_step(template);
    let coarse = if step > 1 {
        score_map(&downscale(haystack, step), &downscale(template, step))
    } else {
        None
    };
    let Some(coarse) = coarse else {
        let scores = score_map(haystack, template)?;
        return Some(
            scores
                .enumerate_pixels()
                .filter(|(_, _, s)| s[0] >= floor)
                .map(|(x, y, s)| (x, y, s[0]))
                .collect(),
        );
    };

    let (tw, th) = template.dimensions();
    let (max_x, max_y) = (haystack.width() - tw, haystack.height() - th);
    let cols = max_x + 1;
    let mut marked = vec![false; cols as usize * (max_y + 1) as usize];
    for (cx, cy, s) in coarse.enumerate_pixels() {
        if s[0] < floor - COARSE_SLACK {
            continue;
        }
        let (x0, x1) = ((cx * step).saturating_sub(step), (cx * step + step).min(max_x));
        let (y0, y1) = ((cy * step).saturating_sub(step), (cy * step + step).min(max_y));
        for y in y0..=y1 {
            for x in x0..=x1 {
                marked[(y * cols + x) as usize] = true;
            }
        }
    }

    let stats = TemplateStats::new(template);
    let table = SumTable::new(haystack);
    Some(
        marked
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .filter_map(|(i, _)| {
                let (x, y) = (i as u32 % cols, i as u32 / cols);
                let score = stats.score(&table, x, y, tw, th, cross_at(haystack, template, x, y) as f64);
                (score >= floor).then_some((x, y, score))
            })
            .collect(),
    )
}

fn detection(template: &Template, x: u32, y: u32, score: f32) -> Detection {
    Detection {
        template_id: template.id.clone(),
        position: PhysicalPoint::new(x as i32, y as i32),
        width: template.width(),
        height: template.height(),
        confidence: score.clamp(0.0, 1.0),
    }
}

/// Every alignment scoring at least `confidence`, in row-major scan order.
pub fn find_all_gray(haystack: &GrayImage, template: &Template, confidence: f32) -> Vec<Detection> {
    let Some(found) = scored(haystack, &template.image, confidence) else {
        logger::debug_p(
            "matcher",
            &format!(
                "{} ({}x{}) larger than capture ({}x{})",
                template.id,
                template.width(),
                template.height(),
                haystack.width(),
                haystack.height()
            ),
        );
        return Vec::new();
    };
    found.into_iter().map(|(x, y, s)| detection(template, x, y, s)).collect()
}

/// The single highest-scoring alignment, if it reaches `confidence`.
pub fn best_match_gray(haystack: &GrayImage, template: &Template, confidence: f32) -> Option<Detection> {
    if pyramid_step(&template.image) == 1 {
        let scores = score_map(haystack, &template.image)?;
        let Extremes {
            max_value,
            max_value_location,
            ..
        } = find_extremes(&scores);

        if max_value < confidence {
            return None;
        }
        return Some(detection(template, max_value_location.0, max_value_location.1, max_value));
    }

    scored(haystack, &template.image, confidence)?
        .into_iter()
        .fold(None, |best: Option<(u32, u32, f32)>, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        })
        .map(|(x, y, s)| detection(template, x, y, s))
}

pub fn best_match(capture: &Capture, template: &Template, confidence: f32) -> Option<Detection> {
    best_match_gray(&capture.gray(), template, confidence)
}
