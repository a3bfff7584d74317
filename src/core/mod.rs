pub mod clock;
pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use errors::{
    ConfigError, ErrorKind, GeometryError, RemoteError, ServiceError, ServiceResult, StoreError,
};
pub use types::{
    AudioClip, AudioEncoding, CropRect, FrameDimensions, HistoryRecord, RegionSelection,
    Translation, ViewportRect,
};
