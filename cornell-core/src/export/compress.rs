//! Best-effort recompression of embedded images before rasterization.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageResult, Rgb, RgbImage, RgbaImage};

use super::Surface;
use crate::error::CompressionSkipped;
use crate::model::EmbeddedImage;

/// Target size for an image of natural size `width x height`: scaled by
/// `min(1, max_width / width)`, aspect ratio preserved.
pub fn downscaled_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width == 0 {
        return (width, height);
    }
    let ratio = (f64::from(max_width) / f64::from(width)).min(1.0);
    (
        (f64::from(width) * ratio).round() as u32,
        (f64::from(height) * ratio).round() as u32,
    )
}

/// Redraw an image at its export size and re-encode it as JPEG
pub fn compress_image(
    image: &EmbeddedImage,
    max_width: u32,
    quality: u8,
) -> Result<EmbeddedImage, CompressionSkipped> {
    let decoded = image.decode().map_err(|e| CompressionSkipped {
        reason: e.to_string(),
    })?;

    let (width, height) = downscaled_size(decoded.width(), decoded.height(), max_width);
    if width == 0 || height == 0 {
        return Err(CompressionSkipped {
            reason: format!(
                "{}x{} image has no area at export size",
                decoded.width(),
                decoded.height()
            ),
        });
    }

    let pixels = decoded.to_rgba8();
    let pixels = if (width, height) == pixels.dimensions() {
        pixels
    } else {
        imageops::resize(&pixels, width, height, FilterType::Triangle)
    };

    let bytes = encode_jpeg(&flatten_onto_white(&pixels), quality).map_err(|e| CompressionSkipped {
        reason: e.to_string(),
    })?;
    Ok(EmbeddedImage::new("image/jpeg", bytes))
}

/// Compress every image on the surface in place. Returns how many were
/// left at their original encoding.
pub fn compress_images(surface: &mut Surface, max_width: u32, quality: u8) -> usize {
    let mut skipped = 0;
    surface.for_each_image_mut(|image| match compress_image(image, max_width, quality) {
        Ok(compressed) => *image = compressed,
        Err(e) => {
            tracing::warn!(error = %e, mime = %image.mime_type, "keeping original image encoding");
            skipped += 1;
        }
    });
    skipped
}

/// JPEG has no alpha; composite onto the white export background
pub(crate) fn flatten_onto_white(pixels: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(pixels.width(), pixels.height(), |x, y| {
        let p = pixels.get_pixel(x, y);
        let alpha = u32::from(p[3]);
        let over = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([over(p[0]), over(p[1]), over(p[2])])
    })
}

pub(crate) fn encode_jpeg(pixels: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.encode_image(pixels)?;
    Ok(bytes)
}
