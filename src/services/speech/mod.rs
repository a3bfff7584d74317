pub mod backend;
pub mod playback;
pub mod synthesizer;
pub mod voice;

pub use backend::SpeechBackend;
pub use playback::{AudioSink, PlaybackCanceller, PlaybackHandle, PlaybackOutcome};
pub use synthesizer::{StoredAudio, Synthesizer, SPEECH_NAMESPACE};
pub use voice::{preset_for, ResolvedVoice, VoiceGender, VoiceOptions, VoicePreset, VOICE_PRESETS};
