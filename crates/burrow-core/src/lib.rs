//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the base62 codec, the id and record types, and the
//! [`Store`] contract implemented by the storage backends.

pub mod base62;
pub mod error;
pub mod record;
pub mod short_id;
pub mod store;

pub use base62::Alphabet;
pub use error::{CoreError, Result, StoreError};
pub use record::{ShortenRequest, UrlRecord};
pub use short_id::{Prefix, ShortId};
pub use store::Store;
