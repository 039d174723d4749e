use crate::error::Result;
use crate::record::{ShortenRequest, UrlRecord};
use async_trait::async_trait;

/// The persistence contract shared by every backend.
///
/// Implementations differ in how they resolve prefix collisions, but all of
/// them guarantee that a stored record is fetchable by its id and that an id,
/// once handed out, keeps pointing at the same URL.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Returns the record for the request's URL, allocating an id if the URL
    /// has not been seen before.
    ///
    /// Storing the same canonical URL again returns the existing record with
    /// its original `date_added` and current visit count.
    async fn store(&self, request: ShortenRequest) -> Result<UrlRecord>;

    /// Looks up a record by its exact id.
    /// Returns `Err(NotFound)` if no record has that id.
    async fn fetch(&self, id: &str) -> Result<UrlRecord>;

    /// Returns only the URL for `id`, or an empty string on any failure.
    ///
    /// Meant for display purposes; errors are swallowed.
    async fn fetch_url(&self, id: &str) -> String {
        self.fetch(id)
            .await
            .map(|record| record.url)
            .unwrap_or_default()
    }

    /// Registers one visit of `record` and returns the updated record.
    async fn record_visit(&self, record: &UrlRecord) -> Result<UrlRecord>;

    /// Releases backend resources.
    ///
    /// Every operation after `close`, including a second `close`, fails with
    /// `Err(Closed)`.
    async fn close(&self) -> Result<()>;
}
