use std::path::Path;

use image::buffer::ConvertBuffer;
use image::{Rgb, RgbImage, RgbaImage};

use super::error::{GfxError, GfxResult};

/// Decodes an image file into tightly packed RGB8, whatever its source
/// channel count.
pub fn load_rgb(path: &Path) -> GfxResult<RgbImage> {
    let decoded = image::open(path).map_err(|source| GfxError::Texture {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded.into_rgb8())
}

/// Single white texel used in place of a texture that failed to load.
pub fn fallback_rgb() -> RgbImage {
    RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]))
}

/// RGB8 has no GPU format; uploads go through RGBA8 with opaque alpha.
pub fn expand_rgba(image: &RgbImage) -> RgbaImage {
    image.convert()
}
