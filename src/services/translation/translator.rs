use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::clock::Clock;
use crate::core::config::Config;
use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::types::{HistoryRecord, Translation};
use crate::services::cache::key::normalize_lang;
use crate::services::cache::{derive_key, KeyRequest, KeyValueStore, TtlCache};
use crate::services::dispatch::{BatchDispatcher, DispatchConfig};
use crate::services::history::HistoryStore;
use crate::services::translation::backend::{
    LanguagePair, TranslatedText, TranslationBackend, TranslationCalls,
};
use crate::utils::Metrics;

/// Storage namespace of cached translations
pub const TRANSLATION_NAMESPACE: &str = "translate_";

/// Cached, de-duplicated and batched text translation.
///
/// Cheap to clone; clones share the cache and the in-flight registry.
#[derive(Clone)]
pub struct Translator {
    cache: TtlCache<Translation>,
    dispatcher: BatchDispatcher<TranslationCalls>,
    history: Option<Arc<dyn HistoryStore>>,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
}

impl Translator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn KeyValueStore>,
        config: &Config,
        clock: Arc<dyn Clock>,
        metrics: Option<Metrics>,
    ) -> Self {
        let cache = TtlCache::new(
            store,
            TRANSLATION_NAMESPACE,
            config.translation_ttl(),
            Arc::clone(&clock),
            metrics.clone(),
        );
        let dispatcher = BatchDispatcher::new(
            Arc::new(TranslationCalls::new(backend)),
            DispatchConfig::from_config(config),
            metrics.clone(),
        );

        Self {
            cache,
            dispatcher,
            history: None,
            clock,
            metrics,
        }
    }

    /// Record every successful [`Translator::translate_and_record`] in `history`
    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn cache(&self) -> &TtlCache<Translation> {
        &self.cache
    }

    pub fn history(&self) -> Option<&Arc<dyn HistoryStore>> {
        self.history.as_ref()
    }

    /// Translate `text` into `target_lang`.
    ///
    /// Blank input yields an empty translation without touching the cache or
    /// the remote service. Otherwise a live cache entry is returned as-is; on
    /// a miss the text joins the next outbound batch and the fresh result is
    /// cached before it is returned.
    #[instrument(skip(self, text), fields(chars = text.len(), target = target_lang))]
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> ServiceResult<Translation> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Translation::empty(&normalize_lang(target_lang)));
        }

        if let Some(ref m) = self.metrics {
            m.record_operation("translate");
        }

        let key = derive_key(&KeyRequest::new(trimmed, target_lang, source_lang));
        if let Some(cached) = self.cache.get(&key).await? {
            return Ok(cached);
        }

        let pair = LanguagePair::new(target_lang, source_lang);
        let target = pair.target.clone();
        let translated = self
            .dispatcher
            .request(key.clone(), pair, trimmed.to_string())
            .await?;

        let translation = into_translation(translated, &target, source_lang)?;
        self.cache.set(&key, translation.clone()).await?;
        debug!("Translated {} chars to {}", trimmed.len(), target_lang);

        Ok(translation)
    }

    /// Translate many texts; one result per input, in input order.
    ///
    /// All non-blank texts are resolved concurrently, so misses sharing a
    /// language pair travel in as few outbound calls as the batch size allows.
    #[instrument(skip(self, texts), fields(batch_size = texts.len(), target = target_lang))]
    pub async fn translate_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> ServiceResult<Vec<Translation>> {
        try_join_all(
            texts
                .iter()
                .map(|text| self.translate(text.as_ref(), target_lang, source_lang)),
        )
        .await
    }

    /// Translate and append the result to the history store, if one is attached.
    ///
    /// Empty results are returned but not recorded. A failing history store
    /// fails the call; the translation itself is already cached by then.
    pub async fn translate_and_record(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> ServiceResult<Translation> {
        let translation = self.translate(text, target_lang, source_lang).await?;

        if let Some(ref history) = self.history {
            if !translation.is_empty() {
                let record = HistoryRecord {
                    original_text: text.trim().to_string(),
                    translated_text: translation.translated_text.clone(),
                    source_language: translation.source_language.clone(),
                    target_language: translation.target_language.clone(),
                    timestamp: self.timestamp(),
                };
                history.save(record).await.map_err(|e| {
                    warn!("Failed to record translation history: {}", e);
                    ServiceError::from(e)
                })?;
            }
        }

        Ok(translation)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_millis() as i64).unwrap_or_else(Utc::now)
    }
}

fn into_translation(
    translated: TranslatedText,
    target_lang: &str,
    source_lang: Option<&str>,
) -> ServiceResult<Translation> {
    if translated.text.trim().is_empty() {
        return Err(ServiceError::NoResultFound(
            "translation service returned no text".to_string(),
        ));
    }

    let source_language = translated
        .detected_source_language
        .filter(|lang| !lang.trim().is_empty())
        .or_else(|| source_lang.map(str::to_string).filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Translation {
        translated_text: translated.text,
        source_language,
        target_language: target_lang.to_string(),
    })
}
