use crate::base62::Alphabet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;

/// The deterministic, fixed-width head of a [`ShortId`].
///
/// Every id allocated for a URL starts with the prefix derived from that
/// URL. All ids sharing a prefix form one collision bucket.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prefix(SmolStr);

impl Prefix {
    /// Creates a prefix from already rendered base62 text.
    pub fn new(text: impl Into<SmolStr>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Prefix").field(&self.0).finish()
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identifier handed out to users: a [`Prefix`] followed by a base62
/// suffix that tells apart the URLs of one collision bucket.
///
/// Ids read from the outside world are opaque; no validation is applied
/// because lookups of malformed ids simply miss.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortId(SmolStr);

impl ShortId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// Builds the id for slot `slot` of the bucket under `prefix`.
    pub fn compose(prefix: &Prefix, slot: u64, alphabet: Alphabet) -> Self {
        let suffix = alphabet.encode(slot);
        let mut id = String::with_capacity(prefix.len() + suffix.len());
        id.push_str(prefix.as_str());
        id.push_str(&suffix);
        Self(SmolStr::new(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn belongs_to(&self, prefix: &Prefix) -> bool {
        self.0.starts_with(prefix.as_str())
    }

    /// Generates the full short URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }
}

impl std::fmt::Debug for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortId").field(&self.0).finish()
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShortId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
