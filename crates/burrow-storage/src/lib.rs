//! Storage backends implementing the [`Store`][burrow_core::Store] contract.
//!
//! Two allocators are provided. [`OrderedStore`] keeps records in an embedded
//! redb database and resolves prefix collisions by scanning the bucket.
//! [`CounterStore`] keeps records in a key-value server (Redis, or an
//! in-process map) and resolves collisions with an atomic per-bucket counter.
//! Their collision handling differs; only the external contract is shared.

pub mod config;
pub mod counter;
pub mod ordered;

#[cfg(test)]
mod testing;

pub use config::{open_store, BackendKind, StoreConfig};
pub use counter::memory::InMemoryCounterBackend;
pub use counter::redis::RedisCounterBackend;
pub use counter::{CounterBackend, CounterKeys, CounterStore};
pub use ordered::OrderedStore;

/// Location sentinel selecting an in-memory backend.
pub const MEMORY_LOCATION: &str = "memory";
