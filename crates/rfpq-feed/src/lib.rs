//! Bid feed client: one request per run, normalized into opportunity records.

use std::fs;
use std::path::Path;

use reqwest::Url;
use rfpq_core::OpportunityRecord;
use rfpq_http::{FetchError, HttpFetcher};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rfpq-feed";

pub const DEFAULT_FEED_URL: &str = "https://www.governmentnavigator.com/api/bidfeed";

/// Keys under which an object-shaped response may carry the record array.
pub const WRAPPER_KEYS: &[&str] = &["bids", "data", "results"];

/// Every way a feed fetch can fail. All variants are fatal to the run.
#[derive(Debug, Error)]
pub enum FeedUnavailable {
    #[error("feed unavailable: invalid feed url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("feed unavailable: {0}")]
    Fetch(#[from] FetchError),
    #[error("feed unavailable: reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("feed unavailable: body is not valid JSON: {0}")]
    Body(#[from] serde_json::Error),
    #[error("feed unavailable: unexpected response shape ({0})")]
    UnexpectedShape(String),
}

/// Feed location plus the caller identity carried as query parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedEndpoint {
    pub base_url: String,
    pub email: String,
    pub token: String,
}

impl std::fmt::Debug for FeedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEndpoint")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl FeedEndpoint {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            email: email.into(),
            token: token.into(),
        }
    }

    pub fn request_url(&self) -> Result<Url, FeedUnavailable> {
        let mut url = Url::parse(&self.base_url).map_err(|e| FeedUnavailable::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            if !self.email.is_empty() {
                pairs.append_pair("email", &self.email);
            }
            if !self.token.is_empty() {
                pairs.append_pair("token", &self.token);
            }
        }
        Ok(url)
    }
}

pub struct FeedClient {
    http: HttpFetcher,
    endpoint: FeedEndpoint,
}

impl FeedClient {
    pub fn new(http: HttpFetcher, endpoint: FeedEndpoint) -> Self {
        Self { http, endpoint }
    }

    pub async fn fetch(&self, run_id: Uuid) -> Result<Vec<OpportunityRecord>, FeedUnavailable> {
        let url = self.endpoint.request_url()?;
        // The query string carries the token; only the base url may reach logs and errors.
        let resp = self
            .http
            .fetch_labeled(run_id, url.as_str(), &self.endpoint.base_url)
            .await?;
        let records = parse_feed_body(&resp.body)?;
        info!(%run_id, records = records.len(), "feed fetched");
        Ok(records)
    }
}

/// Reads a saved feed response from disk.
pub fn load_feed_file(path: impl AsRef<Path>) -> Result<Vec<OpportunityRecord>, FeedUnavailable> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| FeedUnavailable::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_feed_body(&bytes)
}

pub fn parse_feed_body(bytes: &[u8]) -> Result<Vec<OpportunityRecord>, FeedUnavailable> {
    let value: JsonValue = serde_json::from_slice(bytes)?;
    normalize_feed(value)
}

/// Accepts a bare array of records or an object wrapping one under a known key.
pub fn normalize_feed(value: JsonValue) -> Result<Vec<OpportunityRecord>, FeedUnavailable> {
    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut obj) => {
            let key = WRAPPER_KEYS
                .iter()
                .find(|key| obj.get(**key).is_some_and(JsonValue::is_array))
                .ok_or_else(|| {
                    let mut keys = obj.keys().cloned().collect::<Vec<_>>();
                    keys.truncate(8);
                    FeedUnavailable::UnexpectedShape(format!(
                        "object without a record array; keys: [{}]",
                        keys.join(", ")
                    ))
                })?;
            match obj.remove(*key) {
                Some(JsonValue::Array(items)) => items,
                _ => return Err(FeedUnavailable::UnexpectedShape(format!("`{key}` is not an array"))),
            }
        }
        other => {
            return Err(FeedUnavailable::UnexpectedShape(format!(
                "top-level {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let records = items
        .into_iter()
        .filter_map(OpportunityRecord::from_json)
        .collect::<Vec<_>>();
    if records.len() < total {
        warn!(dropped = total - records.len(), "dropped non-object feed elements");
    }
    Ok(records)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
