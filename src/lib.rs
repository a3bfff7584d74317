// Library exports for the scan-and-translate core
//
// Region capture geometry plus cached, batched translation and speech services

// Core modules
pub mod core;
pub mod geometry;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{ConfigError, ErrorKind, GeometryError, RemoteError, ServiceError, StoreError},
    types::{
        AudioClip, AudioEncoding, CropRect, FrameDimensions, HistoryRecord, RegionSelection,
        Translation, ViewportRect,
    },
};

pub use geometry::{map_viewport_rect_to_image_rect, FramePreset};

pub use orchestration::{CaptureResult, Collaborators, Engine};

pub use services::{
    HistoryStore, KeyValueStore, MemoryHistory, MemoryStore, RecognitionBackend, RegionRecognizer,
    SpeechBackend, Synthesizer, TranslationBackend, Translator, VoiceOptions,
};

pub use utils::{crop_and_encode_png_async, load_image_from_memory_async, Metrics};
