use axum::http::{header, HeaderMap};
use burrow_core::UrlRecord;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
pub struct ShortenForm {
    #[serde(default)]
    pub url: String,
}

/// Public view of a record. The creator IP stays private.
#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub url: String,
    pub id: String,
    pub short_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<Timestamp>,
    pub times_visited: u64,
}

impl ShortenResponse {
    pub fn new(record: &UrlRecord, short_url: String) -> Self {
        Self {
            url: record.url.clone(),
            id: record.id.to_string(),
            short_url,
            date_added: (record.date_added != Timestamp::UNIX_EPOCH).then_some(record.date_added),
            times_visited: record.visits,
        }
    }
}

/// XML layout of [`ShortenResponse`]: `<shorten id="...">` with one element
/// per field.
#[derive(Debug, Serialize)]
#[serde(rename = "shorten")]
pub struct XmlShortenResponse {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "ShortURL")]
    pub short_url: String,
    #[serde(rename = "DateAdded", skip_serializing_if = "Option::is_none")]
    pub date_added: Option<Timestamp>,
    #[serde(rename = "TimesVisited")]
    pub times_visited: u64,
}

impl From<ShortenResponse> for XmlShortenResponse {
    fn from(response: ShortenResponse) -> Self {
        Self {
            id: response.id,
            url: response.url,
            short_url: response.short_url,
            date_added: response.date_added,
            times_visited: response.times_visited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Xml,
    Plain,
}

impl OutputFormat {
    /// Picks the format from the first `Accept` entry whose media type ends
    /// in `json` or `xml`. Anything else gets plain text.
    pub fn negotiate(headers: &HeaderMap) -> Self {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        for entry in accept.split(',') {
            let media_type = entry.split(';').next().unwrap_or_default().trim();
            if media_type.ends_with("json") {
                return OutputFormat::Json;
            }
            if media_type.ends_with("xml") {
                return OutputFormat::Xml;
            }
        }

        OutputFormat::Plain
    }
}
