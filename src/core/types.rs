// Shared data types for capture geometry, translation and speech results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rectangle in on-screen (viewport) logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Width/height snapshot of the viewport or of a captured image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: f64,
    pub height: f64,
}

impl FrameDimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Crop rectangle in source-image pixel space.
///
/// Only produced by the geometry mapper, so `origin + size` always lies
/// inside the image it was derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
}

/// Overlay selection captured together with a photo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSelection {
    pub rect: ViewportRect,
    pub viewport: FrameDimensions,
}

/// Result of a text translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub translated_text: String,
    /// Detected source language, else the caller's source, else "unknown"
    pub source_language: String,
    pub target_language: String,
}

impl Translation {
    /// Result returned for blank input without touching cache or network
    pub fn empty(target_language: &str) -> Self {
        Self {
            translated_text: String::new(),
            source_language: String::new(),
            target_language: target_language.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.translated_text.is_empty()
    }
}

/// One record of the persistent translation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub timestamp: DateTime<Utc>,
}

/// Encoding of synthesized audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioEncoding {
    Mp3,
    Linear16,
    OggOpus,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "MP3",
            AudioEncoding::Linear16 => "LINEAR16",
            AudioEncoding::OggOpus => "OGG_OPUS",
        }
    }
}

/// Synthesized audio handed back to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub encoding: AudioEncoding,
    pub bytes: Vec<u8>,
}
