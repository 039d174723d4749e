use crate::counter::{CounterKeys, CounterStore};
use crate::ordered::{OrderedStore, DEFAULT_MAX_COMMIT_RETRIES};
use crate::{InMemoryCounterBackend, RedisCounterBackend, MEMORY_LOCATION};
use burrow_core::{Result, Store, StoreError};
use burrow_keygen::{DeriverSettings, KeyDeriver};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use typed_builder::TypedBuilder;

/// Which allocator backs the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded redb database, collisions resolved by a prefix scan.
    #[default]
    Redb,
    /// Redis (or an in-process map), collisions resolved by a counter.
    Redis,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "redis" => Ok(Self::Redis),
            other => Err(StoreError::Operation(format!(
                "unknown storage backend '{}'",
                other
            ))),
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redb => write!(f, "redb"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Everything needed to open a [`Store`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct StoreConfig {
    #[builder(default)]
    pub backend: BackendKind,
    /// A file path or `redis://` URI, depending on the backend. The value
    /// `"memory"` selects an in-process store for either backend.
    #[builder(default = MEMORY_LOCATION.to_string(), setter(into))]
    pub location: String,
    #[builder(default)]
    pub deriver: DeriverSettings,
    /// Retry limit of the redb allocator. Ignored by the counter allocator.
    #[builder(default = DEFAULT_MAX_COMMIT_RETRIES)]
    pub max_commit_retries: u32,
    /// Key layout of the counter allocator. Ignored by the redb allocator.
    #[builder(default)]
    pub keys: CounterKeys,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Opens the store described by `config`.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    let deriver = KeyDeriver::new(config.deriver.clone())
        .map_err(|e| StoreError::Operation(format!("invalid key deriver settings: {}", e)))?;
    let in_memory = config.location == MEMORY_LOCATION;

    let store: Arc<dyn Store> = match config.backend {
        BackendKind::Redb => Arc::new(
            OrderedStore::with_deriver(&config.location, deriver)?
                .with_max_commit_retries(config.max_commit_retries),
        ),
        BackendKind::Redis if in_memory => Arc::new(CounterStore::with_deriver(
            InMemoryCounterBackend::new(),
            deriver,
            config.keys.clone(),
        )),
        BackendKind::Redis => Arc::new(CounterStore::with_deriver(
            RedisCounterBackend::connect(&config.location).await?,
            deriver,
            config.keys.clone(),
        )),
    };

    // Redis URIs may carry credentials, so only the kind is logged.
    info!(backend = %config.backend, in_memory, "Opened store");
    Ok(store)
}
