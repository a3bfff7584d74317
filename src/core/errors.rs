// Error types for the capture / translation core
//
// Using thiserror for ergonomic error definitions with:
// - Stable kinds the UI layer can branch on
// - Clonable service errors so one batch failure reaches every waiter
// - Source error chaining where the source is owned by this crate

use thiserror::Error;

/// Geometry mapper errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Selected region maps to an empty crop ({width}x{height} px)")]
    InvalidRegion { width: i64, height: i64 },

    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidFrame { width: f64, height: f64 },
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Required configuration missing: {0}")]
    Missing(&'static str),

    #[error("TTL for {cache} cache must be > 0")]
    InvalidTtl { cache: &'static str },

    #[error("Batch size must be in [1, {max}], got {value}")]
    InvalidBatchSize { value: usize, max: usize },

    #[error("Batch window must be <= {max_ms} ms, got {value_ms} ms")]
    InvalidBatchWindow { value_ms: u128, max_ms: u128 },

    #[error("Eviction interval must be > 0")]
    InvalidEvictionInterval,

    #[error("Cache capacity must be > 0")]
    InvalidCapacity,

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

/// Backing key-value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key-value store operation failed: {0}")]
    Backend(String),

    #[error("Cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reported by remote collaborators (translation, speech, recognition)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("Missing credential or configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Remote call failed: {0}")]
    CallFailed(String),
}

/// Stable error discriminant for callers mapping failures to messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRegion,
    ConfigurationMissing,
    RemoteCallFailed,
    NoResultFound,
    EmptyInput,
    InvalidImage,
    StoreFailed,
}

/// Errors surfaced by the translation, speech and recognition façades
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidRegion(#[from] GeometryError),

    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),

    #[error("No result: {0}")]
    NoResultFound(String),

    #[error("Nothing to {0}: input text is empty")]
    EmptyInput(&'static str),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Cache store failed: {0}")]
    StoreFailed(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidRegion(_) => ErrorKind::InvalidRegion,
            ServiceError::ConfigurationMissing(_) => ErrorKind::ConfigurationMissing,
            ServiceError::RemoteCallFailed(_) => ErrorKind::RemoteCallFailed,
            ServiceError::NoResultFound(_) => ErrorKind::NoResultFound,
            ServiceError::EmptyInput(_) => ErrorKind::EmptyInput,
            ServiceError::InvalidImage(_) => ErrorKind::InvalidImage,
            ServiceError::StoreFailed(_) => ErrorKind::StoreFailed,
        }
    }
}

impl From<RemoteError> for ServiceError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::ConfigurationMissing(what) => ServiceError::ConfigurationMissing(what),
            RemoteError::CallFailed(reason) => ServiceError::RemoteCallFailed(reason),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::StoreFailed(err.to_string())
    }
}

impl From<ConfigError> for ServiceError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing(name) => ServiceError::ConfigurationMissing(name.to_string()),
            other => ServiceError::ConfigurationMissing(other.to_string()),
        }
    }
}

// Convenience type aliases for Results
pub type GeometryResult<T> = Result<T, GeometryError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type RemoteResult<T> = Result<T, RemoteError>;
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_errors_map_to_kinds() {
        let missing: ServiceError = RemoteError::ConfigurationMissing("api key".into()).into();
        assert_eq!(missing.kind(), ErrorKind::ConfigurationMissing);

        let failed: ServiceError = RemoteError::CallFailed("503".into()).into();
        assert_eq!(failed.kind(), ErrorKind::RemoteCallFailed);
        assert!(failed.to_string().contains("503"));
    }

    #[test]
    fn test_geometry_error_keeps_region_kind() {
        let err: ServiceError = GeometryError::InvalidRegion { width: 0, height: 12 }.into();
        assert_eq!(err.kind(), ErrorKind::InvalidRegion);
    }

    #[test]
    fn test_missing_config_is_configuration_missing() {
        let err: ServiceError = ConfigError::Missing("GOOGLE_CLOUD_API_KEY").into();
        assert_eq!(err.kind(), ErrorKind::ConfigurationMissing);
        assert!(err.to_string().contains("GOOGLE_CLOUD_API_KEY"));
    }
}
