//! Cache Key Module
//!
//! Derives short, stable cache keys from semantic descriptors using a
//! 32-bit polynomial rolling hash over the percent-encoded canonical text.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::cache::Namespace;

/// Characters left untouched by the browser's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Maximum number of base-36 digits kept from the hash.
const MAX_HASH_DIGITS: usize = 16;

// == Cache Key ==
/// A derived, namespace-prefixed cache key such as `char_1x2y3z` or `bg_9k0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps a key read back from the store without re-deriving it.
    pub(crate) fn from_stored(key: String) -> Self {
        CacheKey(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

// == Descriptors ==
/// Character attributes that identify a portrait.
///
/// Field order is the canonical encoding order and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDescriptor {
    pub nickname: String,
    pub gender: String,
    pub appearance: String,
    pub settings: String,
}

/// Anything a cache key can be derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Descriptor {
    Character(CharacterDescriptor),
    Scene(String),
}

impl Descriptor {
    /// Namespace the derived key lives in.
    pub fn namespace(&self) -> Namespace {
        match self {
            Descriptor::Character(_) => Namespace::Character,
            Descriptor::Scene(_) => Namespace::Background,
        }
    }

    /// Canonical text fed to the hash: compact JSON for characters,
    /// the raw description for scenes.
    pub fn canonical_text(&self) -> String {
        match self {
            Descriptor::Character(c) => {
                // Serializing a plain struct of strings cannot fail.
                serde_json::to_string(c).unwrap_or_default()
            }
            Descriptor::Scene(text) => text.clone(),
        }
    }

    /// Derives the cache key for this descriptor.
    pub fn derive_key(&self) -> CacheKey {
        let encoded = utf8_percent_encode(&self.canonical_text(), URI_COMPONENT).to_string();
        let hash = rolling_hash(&encoded);
        let mut digits = to_base36(hash.unsigned_abs());
        digits.truncate(MAX_HASH_DIGITS);
        CacheKey(format!("{}{}", self.namespace().key_prefix(), digits))
    }
}

impl From<CharacterDescriptor> for Descriptor {
    fn from(d: CharacterDescriptor) -> Self {
        Descriptor::Character(d)
    }
}

// == Hashing ==
/// `hash = hash * 31 + c`, wrapping at 32 bits on every step.
pub fn rolling_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(i32::from(unit))
    })
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn character(nickname: &str) -> CharacterDescriptor {
        CharacterDescriptor {
            nickname: nickname.to_string(),
            gender: "female".to_string(),
            appearance: "银色长发，蓝色眼睛".to_string(),
            settings: "温柔的图书管理员".to_string(),
        }
    }

    #[test]
    fn test_rolling_hash_matches_string_hash_code() {
        // Same recurrence as Java's String.hashCode
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 97 * 31 + 98);
        assert_eq!(rolling_hash("hello"), 99162322);
    }

    #[test]
    fn test_rolling_hash_wraps() {
        let long = "z".repeat(100);
        // Must not panic on overflow
        let _ = rolling_hash(&long);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(2_147_483_648), "zik0zk");
    }

    #[test]
    fn test_canonical_character_text_field_order() {
        let d = Descriptor::Character(CharacterDescriptor {
            nickname: "A".into(),
            gender: "male".into(),
            appearance: "B".into(),
            settings: "C".into(),
        });
        assert_eq!(
            d.canonical_text(),
            r#"{"nickname":"A","gender":"male","appearance":"B","settings":"C"}"#
        );
    }

    #[test]
    fn test_percent_encoding_matches_uri_component() {
        let encoded = utf8_percent_encode("a b-_.!~*'()中", URI_COMPONENT).to_string();
        assert_eq!(encoded, "a%20b-_.!~*'()%E4%B8%AD");
    }

    #[test]
    fn test_key_prefixes() {
        let ck = Descriptor::from(character("小雪")).derive_key();
        let bk = Descriptor::Scene("beautiful anime park scene".into()).derive_key();
        assert!(ck.as_str().starts_with("char_"));
        assert!(bk.as_str().starts_with("bg_"));
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = Descriptor::from(character("小雪")).derive_key();
        let b = Descriptor::from(character("小雪")).derive_key();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_differs_for_different_fields() {
        let a = Descriptor::from(character("小雪")).derive_key();
        let b = Descriptor::from(character("小雨")).derive_key();
        assert_ne!(a, b);
    }

    #[test]
    fn test_scene_key_known_value() {
        // "abc" -> 96354 -> base36 "22ci"
        let key = Descriptor::Scene("abc".into()).derive_key();
        assert_eq!(key.as_str(), "bg_22ci");
    }
}
