use crate::MEMORY_LOCATION;
use async_trait::async_trait;
use burrow_core::{Prefix, Result, ShortId, ShortenRequest, Store, StoreError, UrlRecord};
use burrow_keygen::{KeyDeriver, PrefixDeriver};
use jiff::Timestamp;
use parking_lot::RwLock;
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const URLS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("urls");

/// How many times a store restarts after its bucket changed underneath it.
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 16;

/// Allocator backed by an embedded, ordered redb database.
///
/// Keys are short ids and values are JSON records. Because a prefix is a
/// byte-prefix of every id in its bucket, the whole bucket is one contiguous
/// key range.
///
/// Allocation is optimistic: the bucket is scanned in a read snapshot, then
/// the write transaction recounts it before inserting. Any concurrent insert
/// into the bucket changes the count, and the whole scan is retried, so a URL
/// is never stored twice. Visit registration rewrites the full record with
/// last-writer-wins semantics and may lose concurrent increments.
pub struct OrderedStore<D = KeyDeriver> {
    db: RwLock<Option<Arc<Database>>>,
    deriver: D,
    max_commit_retries: u32,
}

enum BucketScan {
    Found(UrlRecord),
    Vacant(u64),
}

impl OrderedStore<KeyDeriver> {
    /// Opens the database at `location` with the default key deriver.
    ///
    /// `location` is a file path, or [`MEMORY_LOCATION`] for a database that
    /// lives only as long as the store.
    pub fn open(location: &str) -> Result<Self> {
        Self::with_deriver(location, KeyDeriver::default())
    }
}

impl<D: PrefixDeriver> OrderedStore<D> {
    pub fn with_deriver(location: &str, deriver: D) -> Result<Self> {
        let db = if location == MEMORY_LOCATION {
            Database::builder().create_with_backend(InMemoryBackend::new())
        } else {
            Database::create(location)
        }
        .map_err(map_redb_error)?;

        // Read transactions fail on a missing table, so create it up front.
        let txn = db.begin_write().map_err(map_redb_error)?;
        {
            txn.open_table(URLS).map_err(map_redb_error)?;
        }
        txn.commit().map_err(map_redb_error)?;

        Ok(Self {
            db: RwLock::new(Some(Arc::new(db))),
            deriver,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        })
    }

    pub fn with_max_commit_retries(mut self, max_commit_retries: u32) -> Self {
        self.max_commit_retries = max_commit_retries;
        self
    }

    fn handle(&self) -> Result<Arc<Database>> {
        self.db.read().clone().ok_or(StoreError::Closed)
    }

    /// Runs `op` against the database on the blocking thread pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.handle()?;
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::Operation(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl<D: PrefixDeriver> Store for OrderedStore<D> {
    async fn store(&self, request: ShortenRequest) -> Result<UrlRecord> {
        let prefix = self.deriver.derive(request.url());
        let alphabet = self.deriver.alphabet();
        let attempts = self.max_commit_retries.saturating_add(1);
        debug!(prefix = %prefix, "Scanning datastore with prefix");

        for attempt in 1..=attempts {
            let scan = {
                let prefix = prefix.clone();
                let url = request.url().to_owned();
                self.blocking(move |db| scan_bucket(db, &prefix, &url))
                    .await?
            };

            let slot = match scan {
                BucketScan::Found(record) => {
                    info!(id = %record.id, "Found an existing entry for URL");
                    return Ok(record);
                }
                BucketScan::Vacant(slot) => slot,
            };

            if slot > 0 {
                info!(prefix = %prefix, collisions = slot, "Collisions detected");
            }

            let record = UrlRecord::allocated(
                ShortId::compose(&prefix, slot, alphabet),
                &request,
                Timestamp::now(),
            );

            let committed = {
                let prefix = prefix.clone();
                let record = record.clone();
                self.blocking(move |db| insert_if_unchanged(db, &prefix, slot, &record))
                    .await?
            };

            if committed {
                debug!(id = %record.id, url = %record.url, "New URL stored with key");
                return Ok(record);
            }

            warn!(prefix = %prefix, attempt, "Bucket changed before commit, retrying");
        }

        Err(StoreError::Conflict {
            prefix: prefix.to_string(),
            attempts,
        })
    }

    async fn fetch(&self, id: &str) -> Result<UrlRecord> {
        trace!(id, "Fetching URL record");
        let id = id.to_owned();

        self.blocking(move |db| {
            let txn = db.begin_read().map_err(map_redb_error)?;
            let table = txn.open_table(URLS).map_err(map_redb_error)?;

            let record = match table.get(id.as_bytes()).map_err(map_redb_error)? {
                Some(value) => decode_record(id.as_bytes(), value.value()),
                None => Err(StoreError::NotFound(id.clone())),
            };
            record
        })
        .await
    }

    async fn record_visit(&self, record: &UrlRecord) -> Result<UrlRecord> {
        let mut updated = record.clone();
        updated.visits += 1;
        let value = encode_record(&updated)?;
        let id = updated.id.clone();

        self.blocking(move |db| {
            let txn = db.begin_write().map_err(map_redb_error)?;
            let exists = {
                let mut table = txn.open_table(URLS).map_err(map_redb_error)?;
                let exists = table.get(id.as_bytes()).map_err(map_redb_error)?.is_some();
                if exists {
                    table
                        .insert(id.as_bytes(), value.as_slice())
                        .map_err(map_redb_error)?;
                }
                exists
            };

            if !exists {
                txn.abort().map_err(map_redb_error)?;
                return Err(StoreError::NotFound(id.to_string()));
            }

            txn.commit().map_err(map_redb_error)
        })
        .await?;

        trace!(id = %updated.id, visits = updated.visits, "Registered visit");
        Ok(updated)
    }

    async fn close(&self) -> Result<()> {
        // In-flight operations hold their own handle; the database is
        // released when the last of them finishes.
        match self.db.write().take() {
            Some(_) => {
                debug!("Closed ordered store");
                Ok(())
            }
            None => Err(StoreError::Closed),
        }
    }
}

fn scan_bucket(db: &Database, prefix: &Prefix, url: &str) -> Result<BucketScan> {
    let txn = db.begin_read().map_err(map_redb_error)?;
    let table = txn.open_table(URLS).map_err(map_redb_error)?;

    let mut count = 0;
    for entry in table.range(prefix.as_bytes()..).map_err(map_redb_error)? {
        let (key, value) = entry.map_err(map_redb_error)?;
        if !key.value().starts_with(prefix.as_bytes()) {
            break;
        }

        count += 1;
        let record = decode_record(key.value(), value.value())?;
        if record.url == url {
            return Ok(BucketScan::Found(record));
        }
    }

    Ok(BucketScan::Vacant(count))
}

/// Inserts `record` only if the bucket still holds `expected` ids.
///
/// redb serializes write transactions, so the recount and the insert see no
/// interleaved writer.
fn insert_if_unchanged(
    db: &Database,
    prefix: &Prefix,
    expected: u64,
    record: &UrlRecord,
) -> Result<bool> {
    let value = encode_record(record)?;
    let txn = db.begin_write().map_err(map_redb_error)?;

    let unchanged = {
        let mut table = txn.open_table(URLS).map_err(map_redb_error)?;
        let unchanged = count_bucket(&table, prefix)? == expected;
        if unchanged {
            table
                .insert(record.id.as_bytes(), value.as_slice())
                .map_err(map_redb_error)?;
        }
        unchanged
    };

    if unchanged {
        txn.commit().map_err(map_redb_error)?;
    } else {
        txn.abort().map_err(map_redb_error)?;
    }

    Ok(unchanged)
}

fn count_bucket<T>(table: &T, prefix: &Prefix) -> Result<u64>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut count = 0;
    for entry in table.range(prefix.as_bytes()..).map_err(map_redb_error)? {
        let (key, _) = entry.map_err(map_redb_error)?;
        if !key.value().starts_with(prefix.as_bytes()) {
            break;
        }
        count += 1;
    }
    Ok(count)
}

fn encode_record(record: &UrlRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record)
        .map_err(|e| StoreError::InvalidData(format!("failed to serialize record: {e}")))
}

fn decode_record(key: &[u8], value: &[u8]) -> Result<UrlRecord> {
    let id = std::str::from_utf8(key)
        .map_err(|e| StoreError::InvalidData(format!("stored key is not utf-8: {e}")))?;

    let mut record: UrlRecord = serde_json::from_slice(value).map_err(|e| {
        StoreError::InvalidData(format!("invalid record stored under '{}': {e}", id))
    })?;
    record.id = ShortId::new(id);
    Ok(record)
}

fn map_redb_error(err: impl Into<redb::Error>) -> StoreError {
    let err = err.into();
    let message = err.to_string();

    match err {
        redb::Error::Io(_) | redb::Error::DatabaseAlreadyOpen => StoreError::Unavailable(message),
        redb::Error::Corrupted(_) => StoreError::InvalidData(message),
        _ => StoreError::Operation(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedPrefix;
    use burrow_core::Alphabet;
    use std::collections::HashSet;

    const BUCKET: &str = "0I5Itzlw";

    fn request(url: &str) -> ShortenRequest {
        ShortenRequest::new(url, "127.0.0.1").unwrap()
    }

    fn bucketed_store() -> OrderedStore<FixedPrefix> {
        OrderedStore::with_deriver(MEMORY_LOCATION, FixedPrefix::new(BUCKET)).unwrap()
    }

    #[tokio::test]
    async fn store_then_fetch() {
        let store = OrderedStore::open(MEMORY_LOCATION).unwrap();

        let stored = store.store(request("http://example.com/a")).await.unwrap();
        assert_eq!(stored.id.as_str(), "0I5ItzlwZ");
        assert_eq!(stored.visits, 0);
        assert_eq!(stored.creator_ip, "127.0.0.1");

        let fetched = store.fetch(stored.id.as_str()).await.unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(store.fetch_url(stored.id.as_str()).await, "http://example.com/a");
    }

    #[tokio::test]
    async fn store_is_idempotent() {
        let store = OrderedStore::open(MEMORY_LOCATION).unwrap();

        let first = store.store(request("https://example.com/x")).await.unwrap();
        let second = store.store(request("https://example.com/x")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.date_added, second.date_added);
    }

    #[tokio::test]
    async fn resubmission_returns_current_visits() {
        let store = OrderedStore::open(MEMORY_LOCATION).unwrap();

        let first = store.store(request("https://example.com/x")).await.unwrap();
        store.record_visit(&first).await.unwrap();

        let again = store.store(request("https://example.com/x")).await.unwrap();
        assert_eq!(again.visits, 1);
    }

    #[tokio::test]
    async fn colliding_urls_get_dense_suffixes() {
        let store = bucketed_store();

        let a = store.store(request("http://example.com/a")).await.unwrap();
        let b = store.store(request("http://example.com/b")).await.unwrap();

        assert_eq!(a.id.as_str(), "0I5Itzlw0");
        assert_eq!(b.id.as_str(), "0I5Itzlw1");

        assert_eq!(store.fetch("0I5Itzlw0").await.unwrap().url, "http://example.com/a");
        assert_eq!(store.fetch("0I5Itzlw1").await.unwrap().url, "http://example.com/b");

        let a_again = store.store(request("http://example.com/a")).await.unwrap();
        assert_eq!(a_again.id, a.id);
    }

    #[tokio::test]
    async fn neighbouring_buckets_do_not_mix() {
        let first = OrderedStore::with_deriver(MEMORY_LOCATION, FixedPrefix::new("aaaaaaaa"))
            .unwrap();
        first.store(request("http://example.com/a")).await.unwrap();

        // Same database, neighbouring prefix: the scan must stop at the
        // bucket boundary.
        let db = first.handle().unwrap();
        let count = {
            let txn = db.begin_read().unwrap();
            let table = txn.open_table(URLS).unwrap();
            count_bucket(&table, &Prefix::new("aaaaaaab")).unwrap()
        };
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn fetch_unknown_id_is_not_found() {
        let store = OrderedStore::open(MEMORY_LOCATION).unwrap();

        let err = store.fetch("nonexistent-id").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.fetch_url("nonexistent-id").await, "");
    }

    #[tokio::test]
    async fn record_visit_counts_every_call() {
        let store = OrderedStore::open(MEMORY_LOCATION).unwrap();
        let mut record = store.store(request("https://example.com/v")).await.unwrap();

        for _ in 0..5 {
            record = store.record_visit(&record).await.unwrap();
        }

        assert_eq!(record.visits, 5);
        assert_eq!(store.fetch(record.id.as_str()).await.unwrap().visits, 5);
    }

    #[tokio::test]
    async fn record_visit_of_unknown_id_is_not_found() {
        let store = OrderedStore::open(MEMORY_LOCATION).unwrap();
        let stray = UrlRecord::allocated(
            ShortId::new("missing0"),
            &request("https://example.com/"),
            Timestamp::now(),
        );

        let err = store.record_visit(&stray).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stores_of_one_url_share_an_id() {
        let store = Arc::new(bucketed_store());
        let mut handles = vec![];

        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.store(request("https://example.com/race")).await.unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().id);
        }

        assert_eq!(ids.len(), 1);
        assert!(store.fetch("0I5Itzlw1").await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stores_fill_a_bucket_densely() {
        let store = Arc::new(bucketed_store());
        let mut handles = vec![];

        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .store(request(&format!("https://example.com/{}", i)))
                    .await
                    .unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().id.to_string());
        }

        let expected: HashSet<String> = (0..8)
            .map(|slot| format!("{}{}", BUCKET, slot))
            .collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn insert_refuses_a_bucket_that_changed_since_the_scan() {
        let store = bucketed_store();
        let stored = store.store(request("http://example.com/a")).await.unwrap();

        // A writer that scanned the bucket while it was still empty.
        let prefix = Prefix::new(BUCKET);
        let stale = UrlRecord::allocated(
            ShortId::compose(&prefix, 0, Alphabet::Ordered),
            &request("http://example.com/b"),
            Timestamp::now(),
        );
        assert_eq!(stale.id, stored.id);

        let db = store.handle().unwrap();
        assert!(!insert_if_unchanged(&db, &prefix, 0, &stale).unwrap());

        let count = {
            let txn = db.begin_read().unwrap();
            let table = txn.open_table(URLS).unwrap();
            count_bucket(&table, &prefix).unwrap()
        };
        assert_eq!(count, 1);
        assert_eq!(
            store.fetch(stored.id.as_str()).await.unwrap().url,
            "http://example.com/a"
        );

        assert!(insert_if_unchanged(
            &db,
            &prefix,
            1,
            &UrlRecord::allocated(
                ShortId::compose(&prefix, 1, Alphabet::Ordered),
                &request("http://example.com/b"),
                Timestamp::now(),
            ),
        )
        .unwrap());
        assert_eq!(
            store.fetch("0I5Itzlw1").await.unwrap().url,
            "http://example.com/b"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exhausted_retries_surface_as_conflict() {
        let store = Arc::new(bucketed_store().with_max_commit_retries(0));
        let mut handles = vec![];

        for i in 0..32 {
            let store = Arc::clone(&store);
            let url = format!("https://example.com/{}", i);
            handles.push(tokio::spawn(async move {
                (url.clone(), store.store(request(&url)).await)
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            match handle.await.unwrap() {
                (url, Ok(record)) => {
                    assert_eq!(record.url, url);
                    assert_eq!(store.fetch(record.id.as_str()).await.unwrap().url, url);
                    assert!(ids.insert(record.id));
                }
                (_, Err(StoreError::Conflict { prefix, attempts })) => {
                    assert_eq!(prefix, BUCKET);
                    assert_eq!(attempts, 1);
                }
                (_, Err(other)) => panic!("unexpected error: {other}"),
            }
        }

        assert!(!ids.is_empty());
    }

    #[tokio::test]
    async fn reopened_database_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burrow.redb");
        let location = path.to_str().unwrap();

        let store = OrderedStore::open(location).unwrap();
        let stored = store.store(request("https://example.com/kept")).await.unwrap();
        store.close().await.unwrap();

        let reopened = OrderedStore::open(location).unwrap();
        let fetched = reopened.fetch(stored.id.as_str()).await.unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let store = OrderedStore::open(MEMORY_LOCATION).unwrap();
        store.close().await.unwrap();

        assert!(matches!(store.close().await, Err(StoreError::Closed)));
        assert!(matches!(
            store.fetch("anything").await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            store.store(request("https://example.com/")).await,
            Err(StoreError::Closed)
        ));
    }
}
