pub mod cache;
pub mod dispatch;
pub mod history;
pub mod recognition;
pub mod speech;
pub mod translation;

// Re-export commonly used services
pub use cache::{KeyValueStore, MemoryStore, TtlCache};
pub use dispatch::{BatchBackend, BatchDispatcher, DispatchConfig};
pub use history::{HistoryStore, MemoryHistory};
pub use recognition::{RecognitionBackend, RegionRecognizer};
pub use speech::{AudioSink, PlaybackHandle, SpeechBackend, Synthesizer, VoiceOptions};
pub use translation::{TranslationBackend, Translator};
