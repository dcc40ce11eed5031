//! Decoded RGB pixel buffer handed in by the image loader.

use image::{DynamicImage, Rgb, RgbImage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixelBufferError {
    #[error("invalid pixel buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A decoded, orientation-corrected image: `width × height` RGB samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    image: RgbImage,
}

impl PixelBuffer {
    /// Wrap packed RGB bytes (3 per pixel, row-major).
    pub fn from_raw(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, PixelBufferError> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(PixelBufferError::InvalidLength {
                expected,
                actual: rgb.len(),
            });
        }
        let actual = rgb.len();
        RgbImage::from_raw(width, height, rgb)
            .map(|image| Self { image })
            .ok_or(PixelBufferError::InvalidLength { expected, actual })
    }

    /// Wrap packed RGBA bytes, dropping the alpha channel.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, PixelBufferError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(PixelBufferError::InvalidLength {
                expected,
                actual: rgba.len(),
            });
        }
        let rgb = rgba
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect();
        Self::from_raw(width, height, rgb)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Unweighted grayscale intensity of the pixel at (x, y).
    pub fn gray_at(&self, x: u32, y: u32) -> Option<u8> {
        self.image.get_pixel_checked(x, y).map(channel_average)
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(image: RgbImage) -> Self {
        Self { image }
    }
}

impl From<&DynamicImage> for PixelBuffer {
    fn from(image: &DynamicImage) -> Self {
        Self {
            image: image.to_rgb8(),
        }
    }
}

/// `(R + G + B) / 3` with integer division.
pub fn channel_average(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}
