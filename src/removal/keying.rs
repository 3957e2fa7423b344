use super::BackgroundRemover;
use crate::error::RemovalError;
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};

/// Thresholds for border-colour keying, in RGB euclidean distance (0..=441).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyingOptions {
    /// Pixels closer than this to the background colour become transparent.
    pub tolerance: f32,
    /// Width of the ramp between fully transparent and fully opaque.
    pub softness: f32,
}

impl Default for KeyingOptions {
    fn default() -> Self {
        Self {
            tolerance: 40.0,
            softness: 30.0,
        }
    }
}

/// Border-colour keying. Handles flat studio backdrops only, and is what runs
/// when no segmentation model can be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorKeyRemover {
    options: KeyingOptions,
}

impl ColorKeyRemover {
    pub fn new(options: KeyingOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BackgroundRemover for ColorKeyRemover {
    fn name(&self) -> &'static str {
        "color-key"
    }

    async fn remove(&self, image: &DynamicImage) -> Result<DynamicImage, RemovalError> {
        let input = image.clone();
        let options = self.options;
        let keyed = tokio::task::spawn_blocking(move || key_out_background(&input, options)).await?;
        Ok(DynamicImage::ImageRgba8(keyed))
    }
}

/// Makes pixels matching the dominant border colour transparent.
pub fn key_out_background(image: &DynamicImage, options: KeyingOptions) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    let Some(background) = border_color(&rgba) else {
        return rgba;
    };

    let softness = options.softness.max(1.0);
    for pixel in rgba.pixels_mut() {
        let keep = ((distance(pixel, background) - options.tolerance) / softness).clamp(0.0, 1.0);
        pixel[3] = (f32::from(pixel[3]) * keep).round() as u8;
    }
    rgba
}

/// Per-channel median of the outermost ring of pixels.
fn border_color(image: &RgbaImage) -> Option<[f32; 3]> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let mut channels: [Vec<u8>; 3] = Default::default();
    let mut push = |p: &Rgba<u8>| {
        for (c, values) in channels.iter_mut().enumerate() {
            values.push(p[c]);
        }
    };

    for x in 0..width {
        push(image.get_pixel(x, 0));
        if height > 1 {
            push(image.get_pixel(x, height - 1));
        }
    }
    for y in 1..height.saturating_sub(1) {
        push(image.get_pixel(0, y));
        if width > 1 {
            push(image.get_pixel(width - 1, y));
        }
    }

    let mut median = [0.0; 3];
    for (slot, values) in median.iter_mut().zip(channels.iter_mut()) {
        values.sort_unstable();
        *slot = f32::from(values[values.len() / 2]);
    }
    Some(median)
}

fn distance(pixel: &Rgba<u8>, background: [f32; 3]) -> f32 {
    (0..3)
        .map(|c| {
            let d = f32::from(pixel[c]) - background[c];
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
