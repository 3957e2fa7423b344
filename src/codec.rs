//! Image encoding helpers shared by the storage path and the remote client.

use image::{DynamicImage, ImageFormat, ImageResult};
use std::io::Cursor;

/// Maps an allowed upload extension to the format its original is stored in.
pub fn format_for_extension(ext: &str) -> Option<ImageFormat> {
    match ext.to_lowercase().as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "webp" => Some(ImageFormat::WebP),
        "bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// Encodes `image` as `format`, converting the pixel layout to one the encoder accepts.
pub fn encode(image: &DynamicImage, format: ImageFormat) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    match format {
        // JPEG has no alpha channel.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut cursor, format)?,
        ImageFormat::WebP => match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image.write_to(&mut cursor, format)?,
            other => DynamicImage::ImageRgba8(other.to_rgba8()).write_to(&mut cursor, format)?,
        },
        // 8-bit layouts only.
        ImageFormat::Bmp => match image {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_) => image.write_to(&mut cursor, format)?,
            other => DynamicImage::ImageRgba8(other.to_rgba8()).write_to(&mut cursor, format)?,
        },
        _ => image.write_to(&mut cursor, format)?,
    }
    Ok(buf)
}

pub fn encode_png(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    encode(image, ImageFormat::Png)
}
