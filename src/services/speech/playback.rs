use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};

use crate::core::errors::ServiceResult;
use crate::core::types::AudioClip;

/// Output device that plays a clip to completion
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Resolves when the clip has finished playing
    async fn play(&self, clip: AudioClip) -> ServiceResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Failed(String),
    Cancelled,
}

/// Stops a playback from anywhere; cloneable and detached from the handle
#[derive(Clone)]
pub struct PlaybackCanceller {
    signal: Arc<Notify>,
}

impl PlaybackCanceller {
    pub fn cancel(&self) {
        // Stores a permit, so cancelling before the task is polled still counts
        self.signal.notify_one();
    }
}

/// Completion of one playback; resolves exactly once
pub struct PlaybackHandle {
    canceller: PlaybackCanceller,
    outcome: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackHandle {
    /// Start playing `clip` on `sink` in a background task
    pub fn start(sink: Arc<dyn AudioSink>, clip: AudioClip) -> Self {
        let signal = Arc::new(Notify::new());
        let cancelled = Arc::clone(&signal);
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancelled.notified() => PlaybackOutcome::Cancelled,
                result = sink.play(clip) => match result {
                    Ok(()) => PlaybackOutcome::Finished,
                    Err(e) => {
                        warn!("Audio playback failed: {}", e);
                        PlaybackOutcome::Failed(e.to_string())
                    }
                },
            };
            debug!("Playback ended: {:?}", outcome);
            let _ = tx.send(outcome);
        });

        Self {
            canceller: PlaybackCanceller { signal },
            outcome: rx,
        }
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> PlaybackCanceller {
        self.canceller.clone()
    }

    /// Wait for the playback to end
    pub async fn finished(self) -> PlaybackOutcome {
        // Sender only disappears if the playback task itself was torn down
        self.outcome.await.unwrap_or(PlaybackOutcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ServiceError;
    use crate::core::types::AudioEncoding;
    use std::time::Duration;

    struct SleepySink {
        duration: Duration,
        fail: bool,
    }

    #[async_trait]
    impl AudioSink for SleepySink {
        async fn play(&self, _clip: AudioClip) -> ServiceResult<()> {
            tokio::time::sleep(self.duration).await;
            if self.fail {
                return Err(ServiceError::RemoteCallFailed("device unplugged".to_string()));
            }
            Ok(())
        }
    }

    fn clip() -> AudioClip {
        AudioClip {
            encoding: AudioEncoding::Mp3,
            bytes: vec![1, 2, 3],
        }
    }

    fn sink(millis: u64, fail: bool) -> Arc<dyn AudioSink> {
        Arc::new(SleepySink {
            duration: Duration::from_millis(millis),
            fail,
        })
    }

    #[tokio::test]
    async fn test_resolves_when_playback_finishes() {
        let handle = PlaybackHandle::start(sink(5, false), clip());
        assert_eq!(handle.finished().await, PlaybackOutcome::Finished);
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let handle = PlaybackHandle::start(sink(5, true), clip());
        assert!(matches!(handle.finished().await, PlaybackOutcome::Failed(msg) if msg.contains("unplugged")));
    }

    #[tokio::test]
    async fn test_cancel_stops_playback() {
        let handle = PlaybackHandle::start(sink(10_000, false), clip());
        let canceller = handle.canceller();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.finished())
            .await
            .unwrap();
        assert_eq!(outcome, PlaybackOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_after_finish_is_ignored() {
        let handle = PlaybackHandle::start(sink(0, false), clip());
        let canceller = handle.canceller();
        let outcome = handle.finished().await;
        canceller.cancel();
        assert_eq!(outcome, PlaybackOutcome::Finished);
    }
}
