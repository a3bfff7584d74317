// Engine: explicit-lifecycle composition of the capture and translation services

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Config;
use crate::core::errors::ServiceResult;
use crate::core::types::{RegionSelection, Translation};
use crate::services::cache::{EvictionHandle, KeyValueStore};
use crate::services::history::HistoryStore;
use crate::services::recognition::{RecognitionBackend, RegionRecognizer};
use crate::services::speech::{SpeechBackend, Synthesizer};
use crate::services::translation::{TranslationBackend, Translator};
use crate::utils::Metrics;

/// Remote services the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub translation: Arc<dyn TranslationBackend>,
    pub speech: Arc<dyn SpeechBackend>,
    pub recognition: Arc<dyn RecognitionBackend>,
    pub history: Option<Arc<dyn HistoryStore>>,
}

/// Text found in a captured region together with its translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub recognized_text: String,
    pub translation: Translation,
}

pub struct Engine {
    config: Arc<Config>,
    translator: Translator,
    synthesizer: Synthesizer,
    recognizer: RegionRecognizer,
    metrics: Metrics,
    eviction: Mutex<Vec<EvictionHandle>>,
}

impl Engine {
    /// Build the services and start cache eviction for both caches.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: Arc<Config>, collaborators: Collaborators, store: Arc<dyn KeyValueStore>) -> Self {
        Self::start_with_clock(config, collaborators, store, Arc::new(SystemClock))
    }

    #[instrument(skip_all)]
    pub fn start_with_clock(
        config: Arc<Config>,
        collaborators: Collaborators,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let metrics = Metrics::new();

        let mut translator = Translator::new(
            collaborators.translation,
            Arc::clone(&store),
            &config,
            Arc::clone(&clock),
            Some(metrics.clone()),
        );
        if let Some(history) = collaborators.history {
            translator = translator.with_history(history);
        }

        let synthesizer = Synthesizer::new(
            collaborators.speech,
            store,
            &config,
            clock,
            Some(metrics.clone()),
        );
        let recognizer = RegionRecognizer::new(collaborators.recognition, Some(metrics.clone()));

        let interval = config.eviction_interval();
        let eviction = vec![
            translator.cache().start_eviction(interval),
            synthesizer.cache().start_eviction(interval),
        ];

        info!(
            "✓ Engine ready (batch: {} items / {} ms, translation ttl {}s, speech ttl {}s)",
            config.max_batch_size(),
            config.batch_window().as_millis(),
            config.translation_ttl().as_secs(),
            config.speech_ttl().as_secs()
        );

        Self {
            config,
            translator,
            synthesizer,
            recognizer,
            metrics,
            eviction: Mutex::new(eviction),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    pub fn recognizer(&self) -> &RegionRecognizer {
        &self.recognizer
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Whether eviction timers are still running
    pub fn is_running(&self) -> bool {
        self.eviction.lock().iter().any(EvictionHandle::is_running)
    }

    /// Recognize text in the selected region and translate it.
    ///
    /// Falls back to the configured default target language. `Ok(None)` when
    /// no text was recognized. Successful translations are recorded in the
    /// history store, if one was supplied.
    #[instrument(skip(self, photo, selection))]
    pub async fn capture_and_translate(
        &self,
        photo: &[u8],
        selection: Option<&RegionSelection>,
        target_lang: Option<&str>,
    ) -> ServiceResult<Option<CaptureResult>> {
        let Some(recognized_text) = self.recognizer.recognize(photo, selection).await? else {
            debug!("Nothing to translate");
            return Ok(None);
        };

        let target = target_lang.unwrap_or_else(|| self.config.default_target_language());
        let translation = self
            .translator
            .translate_and_record(&recognized_text, target, None)
            .await?;

        Ok(Some(CaptureResult {
            recognized_text,
            translation,
        }))
    }

    /// Stop the eviction timers; safe to call more than once
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.eviction.lock());
        if handles.is_empty() {
            return;
        }

        for handle in handles {
            handle.stop().await;
        }
        info!("Engine stopped");
    }
}
