//! Deterministic prefix derivation for short ids.
//!
//! A prefix is a pure function of the canonical URL. It is not collision
//! free: distinct URLs may share a prefix, and the storage allocators are
//! responsible for telling them apart with a suffix.

pub mod error;
pub mod pbkdf;

pub use error::KeygenError;
pub use pbkdf::{DeriverSettings, KeyDeriver};

use burrow_core::{Alphabet, Prefix};

/// Trait for deriving the prefix of a URL's short id.
///
/// Implementations are pure functions that don't interact with storage.
pub trait PrefixDeriver: Send + Sync + 'static {
    /// Derives the prefix for a canonical URL.
    ///
    /// The same input must always produce the same prefix.
    fn derive(&self, url: &str) -> Prefix;

    /// The alphabet the prefix is rendered in. Allocators render suffixes in
    /// the same alphabet.
    fn alphabet(&self) -> Alphabet;
}
