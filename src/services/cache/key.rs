use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed-length (64 hex chars) SHA-256 fingerprint of a normalized request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields that identify a cacheable remote request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRequest {
    pub text: String,
    pub source_lang: Option<String>,
    pub target_lang: String,
    /// Extra parameters (voice name, pitch, ...); ordered so the key is stable
    pub options: BTreeMap<String, String>,
}

impl KeyRequest {
    pub fn new(text: &str, target_lang: &str, source_lang: Option<&str>) -> Self {
        Self {
            text: text.to_string(),
            source_lang: source_lang.map(str::to_string),
            target_lang: target_lang.to_string(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, name: &str, value: impl ToString) -> Self {
        self.options.insert(name.to_string(), value.to_string());
        self
    }
}

/// Derive the cache key of a request.
///
/// Text is trimmed and language codes lower-cased (a blank source language is
/// the same as none). Every field is written as `tag, length, bytes` so no
/// field content can be mistaken for a separator.
pub fn derive_key(request: &KeyRequest) -> CacheKey {
    let mut hasher = Sha256::new();

    write_field(&mut hasher, b"text", request.text.trim());
    write_field(&mut hasher, b"target", &normalize_lang(&request.target_lang));

    match request
        .source_lang
        .as_deref()
        .map(normalize_lang)
        .filter(|s| !s.is_empty())
    {
        Some(source) => write_field(&mut hasher, b"source", &source),
        None => hasher.update(b"source?"),
    }

    for (name, value) in &request.options {
        write_field(&mut hasher, b"opt", &name.trim().to_lowercase());
        write_field(&mut hasher, b"val", value.trim());
    }

    CacheKey(format!("{:x}", hasher.finalize()))
}

pub(crate) fn normalize_lang(code: &str) -> String {
    code.trim().to_lowercase()
}

fn write_field(hasher: &mut Sha256, tag: &[u8], value: &str) {
    hasher.update(tag);
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic_and_fixed_length() {
        let request = KeyRequest::new("Hej verden", "en", Some("da"));
        let key1 = derive_key(&request);
        let key2 = derive_key(&request.clone());

        assert_eq!(key1, key2);
        assert_eq!(key1.as_str().len(), 64);
        assert!(key1.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_is_stable_across_processes() {
        // Pinned digest: a change here invalidates every persisted cache entry
        let key = derive_key(&KeyRequest::new("hello", "da", None));
        assert_eq!(
            key.as_str(),
            "47068fe586eb09a18458c03d9262df1480c64acc90599b2f1b023395ec694cc8"
        );
        assert_eq!(key, derive_key(&KeyRequest::new("  hello\n", "DA", Some("  "))));
        assert_eq!(key.to_string(), key.as_str());
    }

    #[test]
    fn test_normalization_ignores_incidental_formatting() {
        let a = derive_key(&KeyRequest::new("  Good morning ", " EN ", Some("Da")));
        let b = derive_key(&KeyRequest::new("Good morning", "en", Some("da")));
        assert_eq!(a, b);
    }

    #[test]
    fn test_each_field_changes_the_key() {
        let base = derive_key(&KeyRequest::new("hello", "da", Some("en")));

        assert_ne!(base, derive_key(&KeyRequest::new("hello!", "da", Some("en"))));
        assert_ne!(base, derive_key(&KeyRequest::new("hello", "de", Some("en"))));
        assert_ne!(base, derive_key(&KeyRequest::new("hello", "da", Some("fr"))));
        assert_ne!(base, derive_key(&KeyRequest::new("hello", "da", None)));
        assert_ne!(
            base,
            derive_key(&KeyRequest::new("hello", "da", Some("en")).with_option("voice", "A"))
        );
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // Naive "text-source-target" concatenation would collide on these
        let a = derive_key(&KeyRequest::new("a-b", "c", Some("d")));
        let b = derive_key(&KeyRequest::new("a", "c", Some("b-d")));
        assert_ne!(a, b);

        let c = derive_key(&KeyRequest::new("x", "en", None).with_option("ab", "c"));
        let d = derive_key(&KeyRequest::new("x", "en", None).with_option("a", "bc"));
        assert_ne!(c, d);
    }

    #[test]
    fn test_option_order_does_not_matter() {
        let a = KeyRequest::new("t", "en", None)
            .with_option("pitch", 0.5)
            .with_option("voice", "en-US-Standard-C");
        let b = KeyRequest::new("t", "en", None)
            .with_option("voice", "en-US-Standard-C")
            .with_option("pitch", 0.5);
        assert_eq!(derive_key(&a), derive_key(&b));
    }
}
