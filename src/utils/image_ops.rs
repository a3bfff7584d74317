use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::core::types::{CropRect, FrameDimensions};

/// Asynchronously decode a photo using spawn_blocking.
///
/// Camera photos are large; decoding them synchronously would stall the runtime.
pub async fn load_image_from_memory_async(bytes: &[u8]) -> Result<DynamicImage> {
    let bytes = bytes.to_vec(); // Clone to move into blocking task
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).context("Failed to decode image from memory")
    })
    .await
    .context("Failed to spawn blocking task for image loading")?
}

/// Pixel dimensions of a decoded image as a frame snapshot
pub fn image_frame(img: &DynamicImage) -> FrameDimensions {
    let (width, height) = img.dimensions();
    FrameDimensions::from_pixels(width, height)
}

/// Crop to `rect` and encode as PNG in a single blocking task.
pub async fn crop_and_encode_png_async(img: DynamicImage, rect: CropRect) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let cropped = img.crop_imm(rect.origin_x, rect.origin_y, rect.width, rect.height);
        encode_png(&cropped)
    })
    .await
    .context("Failed to spawn blocking task for crop and encode")?
}

/// Encode the whole image as PNG using spawn_blocking.
pub async fn encode_png_async(img: DynamicImage) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_png(&img))
        .await
        .context("Failed to spawn blocking task for PNG encoding")?
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut png_bytes);
    img.write_to(&mut cursor, ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(png_bytes)
}
