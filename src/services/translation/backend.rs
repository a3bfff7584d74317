use async_trait::async_trait;
use std::sync::Arc;

use crate::core::errors::RemoteResult;
use crate::services::cache::key::normalize_lang;
use crate::services::dispatch::BatchBackend;

/// One translated text as returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedText {
    pub text: String,
    pub detected_source_language: Option<String>,
}

impl TranslatedText {
    pub fn new(text: impl Into<String>, detected_source_language: Option<&str>) -> Self {
        Self {
            text: text.into(),
            detected_source_language: detected_source_language.map(str::to_string),
        }
    }
}

/// Remote text translation service.
///
/// Must return exactly one result per input text, in input order. A missing
/// credential is reported as `RemoteError::ConfigurationMissing`.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate_batch(
        &self,
        texts: Vec<String>,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> RemoteResult<Vec<TranslatedText>>;
}

/// Language pair shared by every text of one outbound call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub target: String,
    pub source: Option<String>,
}

impl LanguagePair {
    pub fn new(target: &str, source: Option<&str>) -> Self {
        Self {
            target: normalize_lang(target),
            source: source.map(normalize_lang).filter(|s| !s.is_empty()),
        }
    }
}

/// Adapts a [`TranslationBackend`] to the batch dispatcher
pub(crate) struct TranslationCalls {
    backend: Arc<dyn TranslationBackend>,
}

impl TranslationCalls {
    pub(crate) fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BatchBackend for TranslationCalls {
    type Item = String;
    type Output = TranslatedText;
    type Group = LanguagePair;

    async fn call(&self, pair: &LanguagePair, texts: Vec<String>) -> RemoteResult<Vec<TranslatedText>> {
        self.backend
            .translate_batch(texts, &pair.target, pair.source.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_pair_normalizes_codes() {
        assert_eq!(LanguagePair::new(" DA ", Some("EN")), LanguagePair::new("da", Some("en")));
        assert_eq!(LanguagePair::new("da", Some("  ")).source, None);
    }
}
