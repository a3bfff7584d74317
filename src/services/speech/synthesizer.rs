use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::clock::Clock;
use crate::core::config::Config;
use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::types::{AudioClip, AudioEncoding};
use crate::services::cache::{derive_key, KeyValueStore, TtlCache};
use crate::services::dispatch::{BatchDispatcher, DispatchConfig};
use crate::services::speech::backend::{SpeechBackend, SpeechCalls, SpeechItem};
use crate::services::speech::playback::{AudioSink, PlaybackHandle};
use crate::services::speech::voice::VoiceOptions;
use crate::utils::Metrics;

/// Storage namespace of cached audio
pub const SPEECH_NAMESPACE: &str = "tts_";

/// Cached audio: the encoded bytes travel as base64 inside the JSON entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAudio {
    pub encoding: AudioEncoding,
    pub audio_base64: String,
}

impl StoredAudio {
    fn from_bytes(encoding: AudioEncoding, bytes: &[u8]) -> Self {
        Self {
            encoding,
            audio_base64: BASE64.encode(bytes),
        }
    }

    fn decode(&self) -> Option<AudioClip> {
        BASE64.decode(&self.audio_base64).ok().map(|bytes| AudioClip {
            encoding: self.encoding,
            bytes,
        })
    }
}

/// Cached, single-flight speech synthesis
#[derive(Clone)]
pub struct Synthesizer {
    cache: TtlCache<StoredAudio>,
    dispatcher: BatchDispatcher<SpeechCalls>,
    default_language: String,
    metrics: Option<Metrics>,
}

impl Synthesizer {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        store: Arc<dyn KeyValueStore>,
        config: &Config,
        clock: Arc<dyn Clock>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            cache: TtlCache::new(
                store,
                SPEECH_NAMESPACE,
                config.speech_ttl(),
                clock,
                metrics.clone(),
            ),
            dispatcher: BatchDispatcher::new(
                Arc::new(SpeechCalls::new(backend)),
                DispatchConfig::unbatched(),
                metrics.clone(),
            ),
            default_language: config.default_voice_language().to_string(),
            metrics,
        }
    }

    pub fn cache(&self) -> &TtlCache<StoredAudio> {
        &self.cache
    }

    /// Options for the configured default voice language
    pub fn default_options(&self) -> VoiceOptions {
        VoiceOptions::for_language(&self.default_language)
    }

    /// Synthesize `text`, reusing cached audio generated for the same voice settings
    #[instrument(skip(self, text, options), fields(chars = text.len(), language = %options.language_code))]
    pub async fn synthesize(&self, text: &str, options: &VoiceOptions) -> ServiceResult<AudioClip> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::EmptyInput("synthesize"));
        }

        if let Some(ref m) = self.metrics {
            m.record_operation("synthesize");
        }

        let mut options = options.clone();
        if options.language_code.is_empty() {
            options.language_code = self.default_language.clone();
        }
        let voice = options.resolve();
        let key = derive_key(&voice.key_request(trimmed));

        if let Some(stored) = self.cache.get(&key).await? {
            match stored.decode() {
                Some(clip) => return Ok(clip),
                None => warn!("Cached audio {} is not valid base64, synthesizing again", key),
            }
        }

        let encoding = voice.encoding;
        let bytes = self
            .dispatcher
            .request(
                key.clone(),
                (),
                SpeechItem {
                    text: trimmed.to_string(),
                    voice,
                },
            )
            .await?;

        if bytes.is_empty() {
            return Err(ServiceError::NoResultFound(
                "speech service returned no audio".to_string(),
            ));
        }

        self.cache
            .set(&key, StoredAudio::from_bytes(encoding, &bytes))
            .await?;
        debug!("Synthesized {} bytes of {}", bytes.len(), encoding.as_str());

        Ok(AudioClip { encoding, bytes })
    }

    /// Synthesize and start playing on `sink`
    pub async fn speak(
        &self,
        text: &str,
        options: &VoiceOptions,
        sink: Arc<dyn AudioSink>,
    ) -> ServiceResult<PlaybackHandle> {
        let clip = self.synthesize(text, options).await?;
        Ok(PlaybackHandle::start(sink, clip))
    }
}
