use async_trait::async_trait;
use std::sync::Arc;

use crate::core::errors::RemoteResult;
use crate::services::dispatch::BatchBackend;
use crate::services::speech::voice::ResolvedVoice;

/// Remote text-to-speech service, one text per call
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &ResolvedVoice) -> RemoteResult<Vec<u8>>;
}

pub(crate) struct SpeechItem {
    pub text: String,
    pub voice: ResolvedVoice,
}

/// Adapts a [`SpeechBackend`] to the batch dispatcher.
///
/// The service takes a single input per call, so the dispatcher runs
/// unbatched and only contributes single-flight.
pub(crate) struct SpeechCalls {
    backend: Arc<dyn SpeechBackend>,
}

impl SpeechCalls {
    pub(crate) fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BatchBackend for SpeechCalls {
    type Item = SpeechItem;
    type Output = Vec<u8>;
    type Group = ();

    async fn call(&self, _group: &(), items: Vec<SpeechItem>) -> RemoteResult<Vec<Vec<u8>>> {
        let mut audio = Vec::with_capacity(items.len());
        for item in items {
            audio.push(self.backend.synthesize(&item.text, &item.voice).await?);
        }
        Ok(audio)
    }
}
