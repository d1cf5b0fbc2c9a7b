//! Crop + PNG encoding. Pure pixel work, no OS calls.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};

use super::geometry::CropRect;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({},{} {}x{}) exceeds raster bounds ({}x{})",
        requested.0, requested.1, requested.2, requested.3,
        raster_size.0, raster_size.1
    )]
    OutOfBounds {
        requested: (u32, u32, u32, u32),
        raster_size: (u32, u32),
    },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Crop the raster to `crop` and return PNG bytes.
///
/// The geometry engine already clamped the rectangle; the bounds are
/// re-checked here so a bug upstream surfaces as an error instead of a
/// panic inside the imaging crate.
pub fn crop_to_png_bytes(image: &RgbaImage, crop: &CropRect) -> Result<Vec<u8>, ExtractError> {
    if crop.width == 0 || crop.height == 0 {
        return Err(ExtractError::ZeroDimension);
    }

    let (raster_w, raster_h) = image.dimensions();
    if crop.left + crop.width > raster_w || crop.top + crop.height > raster_h {
        return Err(ExtractError::OutOfBounds {
            requested: (crop.left, crop.top, crop.width, crop.height),
            raster_size: (raster_w, raster_h),
        });
    }

    let cropped = image::imageops::crop_imm(image, crop.left, crop.top, crop.width, crop.height)
        .to_image();
    encode_png(&cropped)
}

/// Encode a full raster as PNG (used by the whole-screen capture path).
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExtractError> {
    let mut png_bytes: Vec<u8> = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| ExtractError::EncodingFailed(e.to_string()))?;
    Ok(png_bytes)
}
