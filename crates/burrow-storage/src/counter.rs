use async_trait::async_trait;
use burrow_core::{Prefix, Result, ShortId, ShortenRequest, Store, StoreError, UrlRecord};
use burrow_keygen::{KeyDeriver, PrefixDeriver};
use jiff::Timestamp;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

pub mod memory;
pub mod redis;

/// Key-value primitives the counter allocator is built on.
///
/// The method set mirrors the Redis commands the allocator needs, so the
/// in-process implementation behaves like a single Redis instance.
#[async_trait]
pub trait CounterBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically adds `delta` to the integer at `key` (missing keys count as
    /// zero) and returns the new value.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64>;

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<()>;

    /// Returns every field of the hash at `key`, or an empty map.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    async fn close(&self) -> Result<()>;
}

/// Key layout of the counter allocator.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CounterKeys {
    /// Prepended to every key, so several deployments can share a server.
    #[builder(default = "burrow:".to_string(), setter(into))]
    pub namespace: String,
}

impl Default for CounterKeys {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CounterKeys {
    pub fn bucket_count(&self, prefix: &Prefix) -> String {
        format!("{}bket:{}:urlcount", self.namespace, prefix)
    }

    pub fn url_index(&self, prefix: &Prefix, url: &str) -> String {
        format!("{}bket:{}:urlid:{}", self.namespace, prefix, url)
    }

    pub fn record(&self, id: &str) -> String {
        format!("{}id:{}", self.namespace, id)
    }

    pub fn visits(&self, id: &str) -> String {
        format!("{}visits:{}", self.namespace, id)
    }
}

/// Allocator that hands out suffixes from an atomic per-prefix counter.
///
/// No scan is needed: the URL index key answers "was this URL stored?" and
/// the bucket counter answers "which suffix is next?". The two reads are not
/// atomic with the writes that follow, so two first-writers of the same URL
/// racing each other may both allocate, leaving two ids for one URL. The
/// index keeps whichever was written last. Likewise the index and the record
/// are separate writes; a crash between them leaves an index entry with no
/// record, which the next store of that URL replaces.
pub struct CounterStore<B, D = KeyDeriver> {
    backend: B,
    deriver: D,
    keys: CounterKeys,
}

impl<B: CounterBackend> CounterStore<B, KeyDeriver> {
    pub fn new(backend: B) -> Self {
        Self::with_deriver(backend, KeyDeriver::default(), CounterKeys::default())
    }
}

impl<B: CounterBackend, D: PrefixDeriver> CounterStore<B, D> {
    pub fn with_deriver(backend: B, deriver: D, keys: CounterKeys) -> Self {
        Self {
            backend,
            deriver,
            keys,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn keys(&self) -> &CounterKeys {
        &self.keys
    }

    async fn visits(&self, id: &str) -> Result<u64> {
        match self.backend.get(&self.keys.visits(id)).await? {
            Some(value) => value.parse().map_err(|e| {
                StoreError::InvalidData(format!("visit count for '{}' is not a number: {}", id, e))
            }),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl<B: CounterBackend, D: PrefixDeriver> Store for CounterStore<B, D> {
    async fn store(&self, request: ShortenRequest) -> Result<UrlRecord> {
        let prefix = self.deriver.derive(request.url());
        let index_key = self.keys.url_index(&prefix, request.url());
        debug!(prefix = %prefix, "Looking up URL index");

        if let Some(id) = self.backend.get(&index_key).await? {
            match self.fetch(&id).await {
                Ok(record) => {
                    info!(id = %record.id, "Found an existing entry for URL");
                    return Ok(record);
                }
                Err(StoreError::NotFound(_)) => {
                    warn!(
                        id = %id,
                        prefix = %prefix,
                        "URL index points at a missing record, allocating a new id"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let count = self.backend.incr(&self.keys.bucket_count(&prefix), 1).await?;
        let slot = u64::try_from(count - 1).map_err(|_| {
            StoreError::InvalidData(format!("bucket counter for '{}' is {}", prefix, count))
        })?;

        if slot > 0 {
            info!(prefix = %prefix, collisions = slot, "Collisions detected");
        }

        let record = UrlRecord::allocated(
            ShortId::compose(&prefix, slot, self.deriver.alphabet()),
            &request,
            Timestamp::now(),
        );

        self.backend.set(&index_key, record.id.as_str()).await?;
        self.backend
            .hset(
                &self.keys.record(record.id.as_str()),
                &[
                    ("url", record.url.clone()),
                    ("creator_ip", record.creator_ip.clone()),
                    ("date_added", record.date_added.to_string()),
                ],
            )
            .await?;

        debug!(id = %record.id, url = %record.url, "New URL stored with key");
        Ok(record)
    }

    async fn fetch(&self, id: &str) -> Result<UrlRecord> {
        trace!(id, "Fetching URL record");
        let mut fields = self.backend.hgetall(&self.keys.record(id)).await?;
        if fields.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let url = fields
            .remove("url")
            .ok_or_else(|| StoreError::InvalidData(format!("record '{}' has no url", id)))?;
        let date_added = match fields.get("date_added") {
            Some(value) => value.parse::<Timestamp>().map_err(|e| {
                StoreError::InvalidData(format!("record '{}' has a bad date_added: {}", id, e))
            })?,
            None => Timestamp::UNIX_EPOCH,
        };

        Ok(UrlRecord {
            url,
            id: ShortId::new(id),
            creator_ip: fields.remove("creator_ip").unwrap_or_default(),
            date_added,
            visits: self.visits(id).await?,
        })
    }

    async fn record_visit(&self, record: &UrlRecord) -> Result<UrlRecord> {
        let visits = self
            .backend
            .incr(&self.keys.visits(record.id.as_str()), 1)
            .await?;
        trace!(id = %record.id, visits, "Registered visit");

        let mut updated = record.clone();
        updated.visits = u64::try_from(visits).map_err(|_| {
            StoreError::InvalidData(format!("visit count for '{}' is {}", record.id, visits))
        })?;
        Ok(updated)
    }

    async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}
