//! Blur gate for candidate photos.
//!
//! Not a true Laplacian: each interior pixel is compared against the integer
//! average of its 8 neighbours on a width-anchored downscale, and the
//! population variance of that local-contrast signal is the score. Smooth or
//! blurry images score low, sharp edges score high.
//!
//! The default threshold was tuned against this exact pipeline (200 px working
//! width, `(R + G + B) / 3` grayscale, 8-connected neighbour average). Changing
//! any of those steps invalidates it.

use std::borrow::Cow;

use image::imageops;
use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pixels::{channel_average, PixelBuffer};

pub const DEFAULT_BLUR_VARIANCE_THRESHOLD: f64 = 15.0;
pub const DEFAULT_WORKING_WIDTH: u32 = 200;

/// Upper bound on the downscaled working image. Extremely tall inputs would
/// otherwise allocate without limit; they are rejected instead.
const MAX_WORKING_PIXELS: u64 = 1 << 24;

/// Tunables for the blur gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityConfig {
    /// Variance below which an image is rejected as blurry.
    pub blur_variance_threshold: f64,
    /// Width of the working image; height follows the aspect ratio.
    pub working_width: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            blur_variance_threshold: DEFAULT_BLUR_VARIANCE_THRESHOLD,
            working_width: DEFAULT_WORKING_WIDTH,
        }
    }
}

/// Outcome of the blur gate for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScore {
    /// Local-contrast variance; `None` when the image was rejected before scoring.
    pub variance: Option<f64>,
    pub is_blurry: bool,
}

impl QualityScore {
    fn rejected() -> Self {
        Self {
            variance: None,
            is_blurry: true,
        }
    }

    pub fn is_acceptable(&self) -> bool {
        !self.is_blurry
    }
}

/// Score an image and decide whether it is too blurry to use.
///
/// Never fails: a missing, empty or degenerate image is reported as blurry.
pub fn assess(image: Option<&PixelBuffer>, config: &QualityConfig) -> QualityScore {
    let Some(image) = image else {
        tracing::debug!("no image supplied; rejecting as blurry");
        return QualityScore::rejected();
    };

    let (width, height) = (image.width(), image.height());
    let Some((target_w, target_h)) = working_size(width, height, config.working_width) else {
        tracing::debug!(width, height, "image has no interior pixels at working size; rejecting");
        return QualityScore::rejected();
    };

    let working: Cow<'_, RgbImage> = if (width, height) == (target_w, target_h) {
        Cow::Borrowed(image.as_image())
    } else {
        match scale_bilinear(image.as_image(), target_w, target_h) {
            Some(scaled) => Cow::Owned(scaled),
            None => {
                tracing::debug!(width, height, "could not sample working image; rejecting");
                return QualityScore::rejected();
            }
        }
    };

    let gray: Vec<u8> = working.pixels().map(channel_average).collect();
    let stats = local_contrast(&gray, target_w as usize, target_h as usize);
    let Some(variance) = stats.variance() else {
        tracing::debug!(target_w, target_h, "no interior pixels scored; rejecting");
        return QualityScore::rejected();
    };

    let is_blurry = variance < config.blur_variance_threshold;
    tracing::debug!(
        width,
        height,
        variance,
        threshold = config.blur_variance_threshold,
        is_blurry,
        "blur gate"
    );

    QualityScore {
        variance: Some(variance),
        is_blurry,
    }
}

/// Shorthand for `assess(..).is_blurry`.
pub fn is_blurry(image: Option<&PixelBuffer>, config: &QualityConfig) -> bool {
    assess(image, config).is_blurry
}

/// Width-anchored working size: `(w', w' * h / w)` with integer division.
///
/// `None` when the result could not contain an interior pixel or would be
/// unreasonably large.
fn working_size(width: u32, height: u32, working_width: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let target_h = working_width as u64 * height as u64 / width as u64;
    if working_width < 3 || target_h < 3 {
        return None;
    }
    if working_width as u64 * target_h > MAX_WORKING_PIXELS {
        return None;
    }
    Some((working_width, u32::try_from(target_h).ok()?))
}

/// Point-sampled bilinear scale: each target pixel reads the 2×2 source
/// neighbourhood around its centre-mapped coordinate.
///
/// Area-averaging filters wash out the fine texture the score measures, so
/// the kernel must not widen with the downscale ratio.
fn scale_bilinear(src: &RgbImage, target_w: u32, target_h: u32) -> Option<RgbImage> {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let step_x = width as f32 / target_w as f32;
    let step_y = height as f32 / target_h as f32;
    let (max_x, max_y) = ((width - 1) as f32, (height - 1) as f32);

    let mut out = RgbImage::new(target_w, target_h);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let sx = ((x as f32 + 0.5) * step_x - 0.5).clamp(0.0, max_x);
        let sy = ((y as f32 + 0.5) * step_y - 0.5).clamp(0.0, max_y);
        *pixel = imageops::interpolate_bilinear(src, sx, sy)?;
    }
    Some(out)
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct ContrastSums {
    sum: i64,
    sum_sq: i64,
    count: u64,
}

impl ContrastSums {
    fn merge(self, other: Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
            count: self.count + other.count,
        }
    }

    /// Population variance of the diffs, `E[d²] - E[d]²`.
    fn variance(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum as f64 / n;
        Some(self.sum_sq as f64 / n - mean * mean)
    }
}

/// Accumulate `gray - navg` over every interior pixel, one row per task.
///
/// Integer sums are associative, so the row partitioning does not change the result.
fn local_contrast(gray: &[u8], width: usize, height: usize) -> ContrastSums {
    if width < 3 || height < 3 || gray.len() < width * height {
        return ContrastSums::default();
    }
    (1..height - 1)
        .into_par_iter()
        .map(|y| row_contrast(gray, width, y))
        .reduce(ContrastSums::default, ContrastSums::merge)
}

fn row_contrast(gray: &[u8], width: usize, y: usize) -> ContrastSums {
    let above = &gray[(y - 1) * width..y * width];
    let row = &gray[y * width..(y + 1) * width];
    let below = &gray[(y + 1) * width..(y + 2) * width];

    let mut sums = ContrastSums::default();
    for x in 1..width - 1 {
        let neighbours = above[x - 1] as i32
            + above[x] as i32
            + above[x + 1] as i32
            + row[x - 1] as i32
            + row[x + 1] as i32
            + below[x - 1] as i32
            + below[x] as i32
            + below[x + 1] as i32;
        let diff = row[x] as i32 - neighbours / 8;
        sums.sum += diff as i64;
        sums.sum_sq += (diff * diff) as i64;
        sums.count += 1;
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> PixelBuffer {
        PixelBuffer::from_raw(width, height, vec![value; (width * height * 3) as usize]).unwrap()
    }

    fn checkerboard(width: u32, height: u32, cell: u32) -> PixelBuffer {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        })
        .into()
    }

    /// Straight-line rendition of the scan, used to check the parallel one.
    fn sequential_variance(gray: &[u8], width: usize, height: usize) -> Option<f64> {
        let (mut sum, mut sum_sq, mut count) = (0i64, 0i64, 0i64);
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let mut nsum = 0i32;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let idx = (y as i32 + dy) as usize * width + (x as i32 + dx) as usize;
                        nsum += gray[idx] as i32;
                    }
                }
                let diff = gray[y * width + x] as i32 - nsum / 8;
                sum += diff as i64;
                sum_sq += (diff * diff) as i64;
                count += 1;
            }
        }
        if count == 0 {
            return None;
        }
        let mean = sum as f64 / count as f64;
        Some(sum_sq as f64 / count as f64 - mean * mean)
    }

    #[test]
    fn test_missing_image_is_blurry() {
        let score = assess(None, &QualityConfig::default());
        assert!(score.is_blurry);
        assert_eq!(score.variance, None);
    }

    #[test]
    fn test_missing_or_empty_is_blurry_at_any_threshold() {
        let accept_all = QualityConfig {
            blur_variance_threshold: f64::NEG_INFINITY,
            ..QualityConfig::default()
        };
        assert!(assess(None, &accept_all).is_blurry);
        assert!(assess(Some(&flat(0, 0, 0)), &accept_all).is_blurry);
        assert!(assess(Some(&flat(0, 40, 0)), &accept_all).is_blurry);
    }

    #[test]
    fn test_empty_image_is_blurry() {
        let empty = flat(0, 0, 0);
        assert!(is_blurry(Some(&empty), &QualityConfig::default()));
    }

    #[test]
    fn test_flat_gray_is_blurry() {
        let score = assess(Some(&flat(200, 150, 128)), &QualityConfig::default());
        assert_eq!(score.variance, Some(0.0));
        assert!(score.is_blurry);
    }

    #[test]
    fn test_flat_gray_is_blurry_after_downscale() {
        let score = assess(Some(&flat(640, 480, 90)), &QualityConfig::default());
        assert_eq!(score.variance, Some(0.0));
        assert!(score.is_blurry);
    }

    #[test]
    fn test_checkerboard_is_sharp() {
        let score = assess(Some(&checkerboard(200, 200, 1)), &QualityConfig::default());
        let variance = score.variance.unwrap();
        // White: navg = 1020 / 8 = 127, diff = 128. Black: diff = -127.
        assert!(variance > 16_000.0, "variance = {variance}");
        assert!(!score.is_blurry);
    }

    #[test]
    fn test_block_checkerboard_is_sharp_after_downscale() {
        let score = assess(Some(&checkerboard(800, 600, 32)), &QualityConfig::default());
        assert!(score.variance.unwrap() >= DEFAULT_BLUR_VARIANCE_THRESHOLD);
        assert!(score.is_acceptable());
    }

    #[test]
    fn test_fine_texture_survives_downscale() {
        // 2 px cells at 5:1. The samples land on whole source pixels, so the
        // working image is still a high-contrast pattern.
        let score = assess(Some(&checkerboard(1000, 750, 2)), &QualityConfig::default());
        let variance = score.variance.unwrap();
        assert!(variance > 1_000.0, "variance = {variance}");
        assert!(!score.is_blurry);
    }

    #[test]
    fn test_scale_bilinear_point_samples() {
        // 4:1 horizontally, 1:1 vertically: x maps to 4x + 1.5, between columns 4x+1 and 4x+2.
        let src = RgbImage::from_fn(8, 1, |x, _| image::Rgb([(x * 10) as u8; 3]));
        let out = scale_bilinear(&src, 2, 1).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [15; 3]);
        assert_eq!(out.get_pixel(1, 0).0, [55; 3]);
    }

    #[test]
    fn test_scale_bilinear_upscale_clamps_edges() {
        let src = RgbImage::from_fn(2, 2, |x, y| image::Rgb([(x * 100 + y * 10) as u8; 3]));
        let out = scale_bilinear(&src, 8, 8).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0; 3]);
        assert_eq!(out.get_pixel(7, 7).0, [110; 3]);
    }

    #[test]
    fn test_too_wide_has_no_interior() {
        // 200 * 10 / 1000 = 2 rows, no interior pixels.
        let score = assess(Some(&flat(1000, 10, 50)), &QualityConfig::default());
        assert!(score.is_blurry);
        assert_eq!(score.variance, None);
    }

    #[test]
    fn test_small_image_is_upscaled() {
        // A 4x3 image still maps to a 200x150 working image.
        assert_eq!(working_size(4, 3, 200), Some((200, 150)));
        let score = assess(Some(&flat(4, 3, 200)), &QualityConfig::default());
        assert_eq!(score.variance, Some(0.0));
    }

    #[test]
    fn test_working_size_integer_division() {
        assert_eq!(working_size(640, 480, 200), Some((200, 150)));
        assert_eq!(working_size(333, 500, 200), Some((200, 300)));
        assert_eq!(working_size(0, 480, 200), None);
        assert_eq!(working_size(1, 1_000_000, 200), None);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let strict = QualityConfig {
            blur_variance_threshold: 1e9,
            ..QualityConfig::default()
        };
        assert!(is_blurry(Some(&checkerboard(200, 200, 1)), &strict));

        let lenient = QualityConfig {
            blur_variance_threshold: 0.0,
            ..QualityConfig::default()
        };
        // variance 0 is not below 0
        assert!(!is_blurry(Some(&flat(200, 100, 7)), &lenient));
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let (w, h) = (37usize, 23usize);
        let gray: Vec<u8> = (0..w * h).map(|i| ((i * 7919) % 251) as u8).collect();
        let parallel = local_contrast(&gray, w, h).variance().unwrap();
        let sequential = sequential_variance(&gray, w, h).unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_negative_diff_uses_truncating_division() {
        // Centre 0 surrounded by 7 x 255 and one 0: navg = 1785 / 8 = 223.
        let mut gray = vec![255u8; 9];
        gray[4] = 0;
        gray[0] = 0;
        let sums = local_contrast(&gray, 3, 3);
        assert_eq!(sums.sum, -223);
        assert_eq!(sums.count, 1);
    }

    #[test]
    fn test_config_serde_keys() {
        let cfg: QualityConfig = serde_json::from_str(r#"{"blurVarianceThreshold": 20.5}"#).unwrap();
        assert_eq!(cfg.blur_variance_threshold, 20.5);
        assert_eq!(cfg.working_width, DEFAULT_WORKING_WIDTH);
    }
}
