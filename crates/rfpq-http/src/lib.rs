//! Bounded-timeout HTTP fetch utilities shared by the feed client and the document fetcher.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rfpq-http";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Lowercased `Content-Type` header, empty when the server sent none.
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request(err) if err.is_timeout())
    }
}

/// One-shot GET client. Every call is attempted exactly once.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self, run_id: Uuid, url: &str) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", %run_id, url);
        self.fetch_once(url, None).instrument(span).await
    }

    /// Fetches `url` but reports `label` in spans and errors, for URLs carrying credentials.
    pub async fn fetch_labeled(
        &self,
        run_id: Uuid,
        url: &str,
        label: &str,
    ) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", %run_id, url = label);
        self.fetch_once(url, Some(label)).instrument(span).await
    }

    async fn fetch_once(&self, url: &str, label: Option<&str>) -> Result<FetchedResponse, FetchError> {
        let scrub = |err: reqwest::Error| match label {
            Some(_) => FetchError::Request(err.without_url()),
            None => FetchError::Request(err),
        };

        let resp = self.client.get(url).send().await.map_err(scrub)?;
        let status = resp.status();

        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success response");
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: label.map_or_else(|| resp.url().to_string(), str::to_string),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let body = resp.bytes().await.map_err(scrub)?.to_vec();
        debug!(bytes = body.len(), %content_type, "fetched");

        Ok(FetchedResponse { content_type, body })
    }
}
