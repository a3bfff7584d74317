use crate::core::errors::{ConfigError, ConfigResult};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

const DAY_SECS: u64 = 24 * 60 * 60;

/// Upper bound of texts per outbound translation call
pub const MAX_REMOTE_BATCH_SIZE: usize = 128;
const MAX_BATCH_WINDOW: Duration = Duration::from_secs(5);

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: Level,
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which a cached translation is refreshed (default: 30 days)
    pub translation_ttl: Duration,
    /// Age after which cached synthesized audio is refreshed (default: 7 days)
    pub speech_ttl: Duration,
    /// Period of the background eviction sweep (default: 24 hours)
    pub eviction_interval: Duration,
    /// Capacity of the in-memory backing store (default: 10000)
    pub max_entries: usize,
}

/// Batch dispatch configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of texts per outbound call (default: 128)
    pub max_batch_size: usize,
    /// How long requests are collected before a batch is sent (default: 10 ms)
    pub batch_window: Duration,
}

/// Remote service configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub default_target_language: String,
    pub default_voice_language: String,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                log_level: Level::INFO,
            },
            cache: CacheConfig {
                translation_ttl: Duration::from_secs(30 * DAY_SECS),
                speech_ttl: Duration::from_secs(7 * DAY_SECS),
                eviction_interval: Duration::from_secs(DAY_SECS),
                max_entries: 10_000,
            },
            batch: BatchConfig {
                max_batch_size: MAX_REMOTE_BATCH_SIZE,
                batch_window: Duration::from_millis(10),
            },
            api: ApiConfig {
                api_key: None,
                default_target_language: "da".to_string(),
                default_voice_language: "da-DK".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present)
    pub fn new() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup, then validate it
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_level = match lookup("LOG_LEVEL") {
            Some(raw) => parse_level(&raw)?,
            None => defaults.logging.log_level,
        };

        let config = Self {
            logging: LoggingConfig { log_level },
            cache: CacheConfig {
                translation_ttl: parse_or(&lookup, "TRANSLATION_CACHE_TTL_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.translation_ttl),
                speech_ttl: parse_or(&lookup, "SPEECH_CACHE_TTL_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.speech_ttl),
                eviction_interval: parse_or(&lookup, "CACHE_EVICTION_INTERVAL_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.eviction_interval),
                max_entries: parse_or(&lookup, "CACHE_MAX_ENTRIES")?
                    .unwrap_or(defaults.cache.max_entries),
            },
            batch: BatchConfig {
                max_batch_size: parse_or(&lookup, "MAX_BATCH_SIZE")?
                    .unwrap_or(defaults.batch.max_batch_size),
                batch_window: parse_or(&lookup, "BATCH_WINDOW_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.batch.batch_window),
            },
            api: ApiConfig {
                api_key: lookup("GOOGLE_CLOUD_API_KEY")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                default_target_language: lookup("DEFAULT_TARGET_LANGUAGE")
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(defaults.api.default_target_language),
                default_voice_language: lookup("DEFAULT_VOICE_LANGUAGE")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(defaults.api.default_voice_language),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.translation_ttl.is_zero() {
            return Err(ConfigError::InvalidTtl {
                cache: "translation",
            });
        }
        if self.cache.speech_ttl.is_zero() {
            return Err(ConfigError::InvalidTtl { cache: "speech" });
        }
        if self.cache.eviction_interval.is_zero() {
            return Err(ConfigError::InvalidEvictionInterval);
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidCapacity);
        }

        if !(1..=MAX_REMOTE_BATCH_SIZE).contains(&self.batch.max_batch_size) {
            return Err(ConfigError::InvalidBatchSize {
                value: self.batch.max_batch_size,
                max: MAX_REMOTE_BATCH_SIZE,
            });
        }
        if self.batch.batch_window > MAX_BATCH_WINDOW {
            return Err(ConfigError::InvalidBatchWindow {
                value_ms: self.batch.batch_window.as_millis(),
                max_ms: MAX_BATCH_WINDOW.as_millis(),
            });
        }

        Ok(())
    }

    /// API key for the remote services; absence is fatal to any remote call
    pub fn require_api_key(&self) -> ConfigResult<&str> {
        self.api
            .api_key
            .as_deref()
            .ok_or(ConfigError::Missing("GOOGLE_CLOUD_API_KEY"))
    }

    pub fn log_level(&self) -> Level {
        self.logging.log_level
    }

    pub fn translation_ttl(&self) -> Duration {
        self.cache.translation_ttl
    }

    pub fn speech_ttl(&self) -> Duration {
        self.cache.speech_ttl
    }

    pub fn eviction_interval(&self) -> Duration {
        self.cache.eviction_interval
    }

    pub fn max_entries(&self) -> usize {
        self.cache.max_entries
    }

    pub fn max_batch_size(&self) -> usize {
        self.batch.max_batch_size
    }

    pub fn batch_window(&self) -> Duration {
        self.batch.batch_window
    }

    pub fn default_target_language(&self) -> &str {
        &self.api.default_target_language
    }

    pub fn default_voice_language(&self) -> &str {
        &self.api.default_voice_language
    }
}

fn parse_level(raw: &str) -> ConfigResult<Level> {
    match raw.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(ConfigError::EnvVarError(format!(
            "LOG_LEVEL: unknown level '{}'",
            other
        ))),
    }
}

fn parse_or<F, T>(lookup: &F, name: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarError(format!("{}: cannot parse '{}'", name, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.max_batch_size(), 128);
        assert_eq!(config.translation_ttl(), Duration::from_secs(30 * DAY_SECS));
        assert_eq!(config.speech_ttl(), Duration::from_secs(7 * DAY_SECS));
        assert_eq!(config.batch_window(), Duration::from_millis(10));
        assert_eq!(config.log_level(), Level::INFO);
        assert!(config.api.api_key.is_none());
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("LOG_LEVEL", "Debug"),
            ("TRANSLATION_CACHE_TTL_SECS", "60"),
            ("MAX_BATCH_SIZE", "16"),
            ("BATCH_WINDOW_MS", "0"),
            ("GOOGLE_CLOUD_API_KEY", "  secret "),
            ("DEFAULT_TARGET_LANGUAGE", "EN"),
        ]))
        .unwrap();

        assert_eq!(config.log_level(), Level::DEBUG);
        assert_eq!(config.translation_ttl(), Duration::from_secs(60));
        assert_eq!(config.max_batch_size(), 16);
        assert!(config.batch_window().is_zero());
        assert_eq!(config.require_api_key().unwrap(), "secret");
        assert_eq!(config.default_target_language(), "en");
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = Config::from_lookup(lookup_from(&[("MAX_BATCH_SIZE", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidBatchSize { value: 0, max: 128 });

        let err = Config::from_lookup(lookup_from(&[("MAX_BATCH_SIZE", "500")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchSize { value: 500, .. }));

        let err = Config::from_lookup(lookup_from(&[("SPEECH_CACHE_TTL_SECS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidTtl { cache: "speech" });

        let err = Config::from_lookup(lookup_from(&[("BATCH_WINDOW_MS", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarError(_)));

        let err = Config::from_lookup(lookup_from(&[("LOG_LEVEL", "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarError(_)));
    }

    #[test]
    fn test_missing_api_key_is_reported() {
        let config = Config::from_lookup(lookup_from(&[("GOOGLE_CLOUD_API_KEY", "   ")])).unwrap();
        assert_eq!(
            config.require_api_key().unwrap_err(),
            ConfigError::Missing("GOOGLE_CLOUD_API_KEY")
        );
    }
}
