use serde::{Deserialize, Serialize};

use crate::core::types::AudioEncoding;
use crate::services::cache::KeyRequest;

/// Language whose voice is used when no preset matches
pub const FALLBACK_VOICE_LANGUAGE: &str = "da-DK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoiceGender {
    Female,
    Male,
    Neutral,
}

impl VoiceGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceGender::Female => "FEMALE",
            VoiceGender::Male => "MALE",
            VoiceGender::Neutral => "NEUTRAL",
        }
    }
}

/// Default voice for one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePreset {
    pub language_code: &'static str,
    pub voice_name: &'static str,
    pub gender: VoiceGender,
}

pub const VOICE_PRESETS: &[VoicePreset] = &[
    VoicePreset {
        language_code: "da-DK",
        voice_name: "da-DK-Standard-A",
        gender: VoiceGender::Female,
    },
    VoicePreset {
        language_code: "en-US",
        voice_name: "en-US-Standard-C",
        gender: VoiceGender::Female,
    },
    VoicePreset {
        language_code: "de-DE",
        voice_name: "de-DE-Standard-A",
        gender: VoiceGender::Female,
    },
    VoicePreset {
        language_code: "es-ES",
        voice_name: "es-ES-Standard-A",
        gender: VoiceGender::Female,
    },
    VoicePreset {
        language_code: "fr-FR",
        voice_name: "fr-FR-Standard-A",
        gender: VoiceGender::Female,
    },
    VoicePreset {
        language_code: "it-IT",
        voice_name: "it-IT-Standard-A",
        gender: VoiceGender::Female,
    },
];

/// Preset for `language_code` (case-insensitive), if there is one
pub fn preset_for(language_code: &str) -> Option<&'static VoicePreset> {
    let code = language_code.trim();
    VOICE_PRESETS
        .iter()
        .find(|p| p.language_code.eq_ignore_ascii_case(code))
}

fn fallback_preset() -> &'static VoicePreset {
    &VOICE_PRESETS[0]
}

/// Caller-facing voice request; unset fields come from the language preset
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOptions {
    pub language_code: String,
    pub voice_name: Option<String>,
    pub gender: Option<VoiceGender>,
    pub pitch: f32,
    pub speaking_rate: f32,
    pub encoding: AudioEncoding,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self::for_language(FALLBACK_VOICE_LANGUAGE)
    }
}

impl VoiceOptions {
    pub fn for_language(language_code: &str) -> Self {
        Self {
            language_code: language_code.trim().to_string(),
            voice_name: None,
            gender: None,
            pitch: 0.0,
            speaking_rate: 1.0,
            encoding: AudioEncoding::Mp3,
        }
    }

    pub fn with_voice(mut self, voice_name: &str) -> Self {
        self.voice_name = Some(voice_name.to_string());
        self
    }

    pub fn with_gender(mut self, gender: VoiceGender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_speaking_rate(mut self, speaking_rate: f32) -> Self {
        self.speaking_rate = speaking_rate;
        self
    }

    pub fn with_encoding(mut self, encoding: AudioEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Fill unset fields from the preset table.
    ///
    /// A language without a preset keeps its code only when an explicit
    /// voice name is given; otherwise the whole fallback voice is used.
    pub fn resolve(&self) -> ResolvedVoice {
        let (language_code, preset) = match preset_for(&self.language_code) {
            Some(preset) => (preset.language_code.to_string(), preset),
            None if self.voice_name.is_some() && !self.language_code.is_empty() => {
                (self.language_code.clone(), fallback_preset())
            }
            None => {
                let preset = fallback_preset();
                (preset.language_code.to_string(), preset)
            }
        };

        ResolvedVoice {
            language_code,
            voice_name: self
                .voice_name
                .clone()
                .unwrap_or_else(|| preset.voice_name.to_string()),
            gender: self.gender.unwrap_or(preset.gender),
            pitch: self.pitch,
            speaking_rate: self.speaking_rate,
            encoding: self.encoding,
        }
    }
}

/// Fully specified voice configuration sent to the synthesis service
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVoice {
    pub language_code: String,
    pub voice_name: String,
    pub gender: VoiceGender,
    pub pitch: f32,
    pub speaking_rate: f32,
    pub encoding: AudioEncoding,
}

impl ResolvedVoice {
    /// Cache key request: every field that changes the produced audio
    pub fn key_request(&self, text: &str) -> KeyRequest {
        KeyRequest::new(text, &self.language_code, None)
            .with_option("voice", &self.voice_name)
            .with_option("gender", self.gender.as_str())
            .with_option("pitch", self.pitch)
            .with_option("rate", self.speaking_rate)
            .with_option("encoding", self.encoding.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::derive_key;

    #[test]
    fn test_preset_defaults() {
        let voice = VoiceOptions::for_language("en-US").resolve();
        assert_eq!(voice.voice_name, "en-US-Standard-C");
        assert_eq!(voice.gender, VoiceGender::Female);
        assert_eq!(voice.pitch, 0.0);
        assert_eq!(voice.speaking_rate, 1.0);
        assert_eq!(voice.encoding, AudioEncoding::Mp3);
    }

    #[test]
    fn test_explicit_fields_override_preset() {
        let voice = VoiceOptions::for_language("de-de")
            .with_voice("de-DE-Wavenet-B")
            .with_gender(VoiceGender::Male)
            .with_speaking_rate(0.8)
            .resolve();
        assert_eq!(voice.language_code, "de-DE");
        assert_eq!(voice.voice_name, "de-DE-Wavenet-B");
        assert_eq!(voice.gender, VoiceGender::Male);
        assert_eq!(voice.speaking_rate, 0.8);
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let voice = VoiceOptions::for_language("sv-SE").resolve();
        assert_eq!(voice.language_code, "da-DK");
        assert_eq!(voice.voice_name, "da-DK-Standard-A");

        let custom = VoiceOptions::for_language("sv-SE")
            .with_voice("sv-SE-Standard-A")
            .resolve();
        assert_eq!(custom.language_code, "sv-SE");
        assert_eq!(custom.voice_name, "sv-SE-Standard-A");
    }

    #[test]
    fn test_key_depends_on_voice_settings() {
        let base = VoiceOptions::for_language("da-DK").resolve();
        let faster = VoiceOptions::for_language("da-DK").with_speaking_rate(1.5).resolve();
        let male = VoiceOptions::for_language("da-DK").with_gender(VoiceGender::Male).resolve();

        let k = |v: &ResolvedVoice| derive_key(&v.key_request("hej"));
        assert_eq!(k(&base), k(&VoiceOptions::default().resolve()));
        assert_ne!(k(&base), k(&faster));
        assert_ne!(k(&base), k(&male));
    }
}
