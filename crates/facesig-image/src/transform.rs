//! Orientation correction and rescaling.

use facesig_core::PixelBuffer;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::DynamicImage;

/// Clockwise rotation applied for an orientation tag.
///
/// Only the pure rotations are honoured; mirrored orientations are left as stored.
pub fn rotation_degrees(orientation: Orientation) -> u32 {
    match orientation {
        Orientation::Rotate90 => 90,
        Orientation::Rotate180 => 180,
        Orientation::Rotate270 => 270,
        _ => 0,
    }
}

/// Rotate `image` upright according to `orientation`.
pub fn apply_orientation(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match rotation_degrees(orientation) {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    }
}

/// Bilinear rescale to exactly `width × height`.
///
/// A zero target dimension returns the input unchanged.
pub fn resize(buffer: &PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    if width == 0 || height == 0 || buffer.is_empty() {
        return buffer.clone();
    }
    if (buffer.width(), buffer.height()) == (width, height) {
        return buffer.clone();
    }
    imageops::resize(buffer.as_image(), width, height, FilterType::Triangle).into()
}
