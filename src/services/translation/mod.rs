pub mod backend;
pub mod translator;

pub use backend::{LanguagePair, TranslatedText, TranslationBackend};
pub use translator::{Translator, TRANSLATION_NAMESPACE};
