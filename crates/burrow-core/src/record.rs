use crate::error::CoreError;
use crate::short_id::ShortId;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored URL mapping.
///
/// `id` and `date_added` are assigned once by the allocator; `visits` is only
/// ever changed by visit registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The canonical URL that was shortened.
    pub url: String,
    #[serde(default, skip_serializing_if = "ShortId::is_empty")]
    pub id: ShortId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub creator_ip: String,
    #[serde(default, skip_serializing_if = "is_unset")]
    pub date_added: Timestamp,
    #[serde(rename = "times_visited", default)]
    pub visits: u64,
}

fn is_unset(timestamp: &Timestamp) -> bool {
    *timestamp == Timestamp::UNIX_EPOCH
}

impl UrlRecord {
    /// Builds the record for a freshly allocated id.
    pub fn allocated(id: ShortId, request: &ShortenRequest, date_added: Timestamp) -> Self {
        Self {
            url: request.url().to_owned(),
            id,
            creator_ip: request.creator_ip().to_owned(),
            date_added,
            visits: 0,
        }
    }
}

/// A validated request to shorten a URL.
///
/// The URL is parsed and re-serialized so that only canonical text reaches
/// the key deriver. Cosmetically different inputs that canonicalize to
/// different text are kept as different records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenRequest {
    url: String,
    creator_ip: String,
}

impl ShortenRequest {
    pub fn new(url: &str, creator_ip: impl Into<String>) -> Result<Self, CoreError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CoreError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let parsed = url::Url::parse(url)
            .map_err(|e| CoreError::InvalidUrl(format!("'{}': {}", url, e)))?;

        Ok(Self {
            url: parsed.to_string(),
            creator_ip: creator_ip.into(),
        })
    }

    /// The canonical URL text.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn creator_ip(&self) -> &str {
        &self.creator_ip
    }
}
