//! Image normalization: validate an upload and re-encode it as a square WEBP

use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use crate::error::MediaError;

/// Bytes examined when sniffing the content type
const SNIFF_LEN: usize = 512;

pub const MIN_SIDE: u32 = 100;

pub const WEBP_QUALITY: f32 = 60.0;

/// Only the content is trusted, never a declared type
fn sniff(bytes: &[u8]) -> Result<ImageFormat, MediaError> {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    match image::guess_format(head) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif)) => Ok(format),
        Ok(other) => Err(MediaError::NotImage(format!("{:?} is not accepted", other))),
        Err(_) => Err(MediaError::NotImage("unrecognised content".to_string())),
    }
}

/// Centered square of side min(width, height), copied into a fresh raster
fn square_crop(image: &DynamicImage) -> image::RgbaImage {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    image.crop_imm(x, y, side, side).to_rgba8()
}

/// Run an upload through the whole pipeline and return the encoded WEBP.
///
/// CPU bound; call from a blocking task.
pub fn normalize(bytes: &[u8], max_size: usize) -> Result<Vec<u8>, MediaError> {
    if bytes.len() > max_size {
        return Err(MediaError::TooBig { limit: max_size });
    }

    let format = sniff(bytes)?;

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| MediaError::NotImage(e.to_string()))?;

    let (width, height) = decoded.dimensions();
    if width < MIN_SIDE || height < MIN_SIDE {
        return Err(MediaError::BadDimensions {
            width,
            height,
            min: MIN_SIDE,
        });
    }

    let square = square_crop(&decoded);
    let side = square.width();
    let encoded = webp::Encoder::from_rgba(square.as_raw(), side, side).encode(WEBP_QUALITY);

    if encoded.len() > max_size {
        return Err(MediaError::TooBig { limit: max_size });
    }

    debug!(
        ?format,
        width,
        height,
        side,
        bytes = encoded.len(),
        "Image normalized"
    );
    Ok(encoded.to_vec())
}
