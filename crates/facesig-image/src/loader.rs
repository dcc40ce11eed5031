//! Decoding image files into [`PixelBuffer`]s with a memory cap.

use std::path::{Path, PathBuf};

use facesig_core::PixelBuffer;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use thiserror::Error;

use crate::transform;

/// Largest width or height kept after decoding.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("image file not found: {0}")]
    NotFound(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode: {0}")]
    Decode(#[from] image::ImageError),
}

/// Anything that can hand over a decoded, upright pixel buffer.
pub trait ImageSource {
    fn load(&self) -> Result<PixelBuffer, LoadError>;
}

/// An image file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
    pub max_dimension: u32,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }
}

impl ImageSource for FileSource {
    fn load(&self) -> Result<PixelBuffer, LoadError> {
        load_oriented(&self.path, self.max_dimension)
    }
}

/// Smallest power-of-two divisor that brings both sides within `max_dimension`.
pub fn sample_factor(width: u32, height: u32, max_dimension: u32) -> u32 {
    let max = max_dimension.max(1);
    let mut factor = 1u32;
    while width / factor > max || height / factor > max {
        factor *= 2;
    }
    factor
}

/// Decode `path` and downsample it by [`sample_factor`]. Orientation is ignored.
pub fn load_capped(path: impl AsRef<Path>, max_dimension: u32) -> Result<PixelBuffer, LoadError> {
    let (image, _) = decode(path.as_ref())?;
    Ok(PixelBuffer::from(&cap(image, max_dimension)))
}

/// Decode, cap, then rotate according to the EXIF orientation tag.
///
/// An unreadable orientation tag leaves the image as decoded.
pub fn load_oriented(path: impl AsRef<Path>, max_dimension: u32) -> Result<PixelBuffer, LoadError> {
    let (image, orientation) = decode(path.as_ref())?;
    let image = transform::apply_orientation(cap(image, max_dimension), orientation);
    Ok(PixelBuffer::from(&image))
}

/// Read only the orientation tag of an image file.
pub fn read_orientation(path: impl AsRef<Path>) -> Result<Orientation, LoadError> {
    let path = path.as_ref();
    ensure_exists(path)?;
    let mut decoder = ImageReader::open(path)?.with_guessed_format()?.into_decoder()?;
    Ok(decoder.orientation()?)
}

fn decode(path: &Path) -> Result<(DynamicImage, Orientation), LoadError> {
    ensure_exists(path)?;
    let mut decoder = ImageReader::open(path)?.with_guessed_format()?.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "unreadable orientation tag; using image as stored");
        Orientation::NoTransforms
    });
    let image = DynamicImage::from_decoder(decoder)?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        ?orientation,
        "decoded image"
    );
    Ok((image, orientation))
}

fn cap(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let factor = sample_factor(image.width(), image.height(), max_dimension);
    if factor == 1 {
        return image;
    }
    let (width, height) = (image.width() / factor, image.height() / factor);
    tracing::debug!(factor, width, height, "downsampling oversized image");
    image.resize_exact(width.max(1), height.max(1), FilterType::Triangle)
}

fn ensure_exists(path: &Path) -> Result<(), LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }
    Ok(())
}
