// Region-restricted text recognition
//
// The overlay rectangle is mapped onto the photo's pixel grid, the photo is
// cropped to it, and only the crop is sent to the recognition service.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::errors::{RemoteResult, ServiceError, ServiceResult};
use crate::core::types::{CropRect, RegionSelection};
use crate::geometry::map_viewport_rect_to_image_rect;
use crate::utils::{crop_and_encode_png_async, image_frame, load_image_from_memory_async, Metrics};

/// Remote OCR service: image bytes in, recognized text out ("" when nothing is found)
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn recognize_text(&self, image: &[u8]) -> RemoteResult<String>;
}

/// Crop `photo` to the overlay selection and re-encode the crop as PNG
pub async fn crop_region(photo: &[u8], selection: &RegionSelection) -> ServiceResult<(CropRect, Vec<u8>)> {
    let img = load_image_from_memory_async(photo)
        .await
        .map_err(|e| ServiceError::InvalidImage(format!("{:#}", e)))?;

    let rect = map_viewport_rect_to_image_rect(&selection.rect, &selection.viewport, &image_frame(&img))?;
    debug!(
        "Cropping photo to {}x{} at ({}, {})",
        rect.width, rect.height, rect.origin_x, rect.origin_y
    );

    let png = crop_and_encode_png_async(img, rect)
        .await
        .map_err(|e| ServiceError::InvalidImage(format!("{:#}", e)))?;
    Ok((rect, png))
}

#[derive(Clone)]
pub struct RegionRecognizer {
    backend: Arc<dyn RecognitionBackend>,
    metrics: Option<Metrics>,
}

impl RegionRecognizer {
    pub fn new(backend: Arc<dyn RecognitionBackend>, metrics: Option<Metrics>) -> Self {
        Self { backend, metrics }
    }

    /// Recognize text inside `selection`, or in the whole photo when there is none.
    ///
    /// `Ok(None)` means the service found no text.
    #[instrument(skip(self, photo, selection), fields(photo_bytes = photo.len(), cropped = selection.is_some()))]
    pub async fn recognize(
        &self,
        photo: &[u8],
        selection: Option<&RegionSelection>,
    ) -> ServiceResult<Option<String>> {
        if photo.is_empty() {
            return Err(ServiceError::InvalidImage("photo is empty".to_string()));
        }

        if let Some(ref m) = self.metrics {
            m.record_operation("recognize");
        }

        let image = match selection {
            Some(selection) => crop_region(photo, selection).await?.1,
            None => photo.to_vec(),
        };

        let start = std::time::Instant::now();
        let result = self.backend.recognize_text(&image).await;
        if let Some(ref m) = self.metrics {
            m.record_remote_call(result.is_ok(), start.elapsed());
        }

        let text = result?;
        let text = text.trim();
        if text.is_empty() {
            debug!("No text recognized");
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{ErrorKind, RemoteError};
    use crate::core::types::{FrameDimensions, ViewportRect};
    use crate::utils::encode_png_async;
    use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
    use parking_lot::Mutex;

    /// Reports the size of the image it was sent
    #[derive(Default)]
    struct SizeReader {
        sizes: Mutex<Vec<(u32, u32)>>,
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl RecognitionBackend for SizeReader {
        async fn recognize_text(&self, image: &[u8]) -> RemoteResult<String> {
            let img = image::load_from_memory(image)
                .map_err(|e| RemoteError::CallFailed(e.to_string()))?;
            self.sizes.lock().push(img.dimensions());
            Ok(self.reply.unwrap_or("  Hello world \n").to_string())
        }
    }

    async fn photo(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255])));
        encode_png_async(img).await.unwrap()
    }

    fn selection(rect: ViewportRect) -> RegionSelection {
        RegionSelection {
            rect,
            viewport: FrameDimensions::new(100.0, 200.0),
        }
    }

    #[tokio::test]
    async fn test_only_the_selected_region_is_sent() {
        let backend = Arc::new(SizeReader::default());
        let recognizer = RegionRecognizer::new(backend.clone(), None);
        let photo = photo(300, 400).await;

        let text = recognizer
            .recognize(&photo, Some(&selection(ViewportRect::new(10.0, 20.0, 50.0, 40.0))))
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("Hello world"));
        assert_eq!(*backend.sizes.lock(), vec![(150, 80)]);
    }

    #[tokio::test]
    async fn test_without_selection_the_whole_photo_is_sent() {
        let backend = Arc::new(SizeReader::default());
        let recognizer = RegionRecognizer::new(backend.clone(), None);

        recognizer.recognize(&photo(30, 40).await, None).await.unwrap();
        assert_eq!(*backend.sizes.lock(), vec![(30, 40)]);
    }

    #[tokio::test]
    async fn test_blank_text_is_none() {
        let backend = Arc::new(SizeReader {
            reply: Some(" \n "),
            ..Default::default()
        });
        let recognizer = RegionRecognizer::new(backend, None);

        assert_eq!(recognizer.recognize(&photo(10, 10).await, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_selection_outside_photo_is_invalid_region() {
        let recognizer = RegionRecognizer::new(Arc::new(SizeReader::default()), None);

        let err = recognizer
            .recognize(
                &photo(300, 400).await,
                Some(&selection(ViewportRect::new(100.0, 0.0, 20.0, 20.0))),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRegion);
    }

    #[tokio::test]
    async fn test_undecodable_photo_is_invalid_image() {
        let recognizer = RegionRecognizer::new(Arc::new(SizeReader::default()), None);

        let err = recognizer
            .recognize(b"jpeg?", Some(&selection(ViewportRect::new(0.0, 0.0, 10.0, 10.0))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidImage);

        let err = recognizer.recognize(&[], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidImage);
    }
}
