//! Best-effort attachment fetcher: downloads linked PDF/Word documents and scans their
//! text for domain keywords. Nothing in here ever returns an error to the caller.

pub mod extract;

use std::time::Duration;

use rfpq_core::{KeywordSet, OpportunityRecord};
use rfpq_http::HttpFetcher;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub use extract::{DocumentKind, ExtractionError};

pub const CRATE_NAME: &str = "rfpq-documents";

#[derive(Debug, Clone, Copy)]
pub struct DocumentFetcherConfig {
    pub max_documents_per_record: usize,
    /// Courtesy pause between consecutive fetches for the same record.
    pub inter_fetch_delay: Duration,
}

impl Default for DocumentFetcherConfig {
    fn default() -> Self {
        Self {
            max_documents_per_record: 3,
            inter_fetch_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentFailure {
    #[error("document unreachable: {0}")]
    Unreachable(String),
    #[error("document unparseable: {0}")]
    Unparseable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Extracted {
        url: String,
        kind: DocumentKind,
        chars: usize,
    },
    Skipped {
        url: String,
        content_type: String,
    },
    Failed {
        url: String,
        failure: DocumentFailure,
    },
}

impl DocumentOutcome {
    pub fn url(&self) -> &str {
        match self {
            DocumentOutcome::Extracted { url, .. }
            | DocumentOutcome::Skipped { url, .. }
            | DocumentOutcome::Failed { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentScan {
    pub match_found: bool,
    pub keywords_found: Vec<String>,
    pub outcomes: Vec<DocumentOutcome>,
}

impl DocumentScan {
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DocumentOutcome::Failed { .. }))
            .count()
    }
}

pub struct DocumentFetcher {
    http: HttpFetcher,
    keywords: KeywordSet,
    config: DocumentFetcherConfig,
}

impl DocumentFetcher {
    pub fn new(http: HttpFetcher, keywords: KeywordSet, config: DocumentFetcherConfig) -> Self {
        Self {
            http,
            keywords,
            config,
        }
    }

    pub async fn scan_record(&self, run_id: Uuid, record: &OpportunityRecord) -> DocumentScan {
        let urls = record.attachment_urls(self.config.max_documents_per_record);
        self.scan_urls(run_id, &urls).await
    }

    /// Fetches `urls` one after another and tests the combined extracted text.
    pub async fn scan_urls(&self, run_id: Uuid, urls: &[String]) -> DocumentScan {
        let mut texts = Vec::new();
        let mut outcomes = Vec::new();

        for (idx, url) in urls
            .iter()
            .take(self.config.max_documents_per_record)
            .enumerate()
        {
            if idx > 0 && !self.config.inter_fetch_delay.is_zero() {
                tokio::time::sleep(self.config.inter_fetch_delay).await;
            }
            let (outcome, text) = self.fetch_document(run_id, url).await;
            match &outcome {
                DocumentOutcome::Failed { failure, .. } => {
                    warn!(%run_id, url = %url, %failure, "document contributes no text")
                }
                DocumentOutcome::Skipped { content_type, .. } => {
                    debug!(%run_id, url = %url, %content_type, "unsupported document type skipped")
                }
                DocumentOutcome::Extracted { kind, chars, .. } => {
                    debug!(%run_id, url = %url, kind = kind.as_str(), chars, "document text extracted")
                }
            }
            if let Some(text) = text {
                texts.push(text);
            }
            outcomes.push(outcome);
        }

        let combined = texts.join("\n");
        let keywords_found = self.keywords.found_in(&combined);
        DocumentScan {
            match_found: !keywords_found.is_empty(),
            keywords_found,
            outcomes,
        }
    }

    async fn fetch_document(&self, run_id: Uuid, url: &str) -> (DocumentOutcome, Option<String>) {
        let resp = match self.http.fetch(run_id, url).await {
            Ok(resp) => resp,
            Err(err) => {
                let reason = if err.is_timeout() {
                    format!("timed out after {:?}", self.http.timeout())
                } else {
                    err.to_string()
                };
                return (
                    DocumentOutcome::Failed {
                        url: url.to_string(),
                        failure: DocumentFailure::Unreachable(reason),
                    },
                    None,
                );
            }
        };

        let Some(kind) = DocumentKind::from_content_type(&resp.content_type) else {
            return (
                DocumentOutcome::Skipped {
                    url: url.to_string(),
                    content_type: resp.content_type,
                },
                None,
            );
        };

        let body = resp.body;
        let extracted = run_extractor(kind, self.http.timeout(), move || {
            extract::extract_text(kind, &body)
        })
        .await;
        match extracted {
            Ok(text) => (
                DocumentOutcome::Extracted {
                    url: url.to_string(),
                    kind,
                    chars: text.chars().count(),
                },
                Some(text),
            ),
            Err(failure) => (
                DocumentOutcome::Failed {
                    url: url.to_string(),
                    failure,
                },
                None,
            ),
        }
    }
}

/// Runs a text extractor off the async runtime, bounded by `limit`.
///
/// Parsers can panic or spin on hostile input. A panic surfaces as a `JoinError`; both it and
/// an elapsed limit count as an unparseable document. A timed-out extractor thread is abandoned.
async fn run_extractor<F>(kind: DocumentKind, limit: Duration, extractor: F) -> Result<String, DocumentFailure>
where
    F: FnOnce() -> Result<String, ExtractionError> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(extractor)).await {
        Ok(Ok(Ok(text))) => Ok(text),
        Ok(Ok(Err(err))) => Err(DocumentFailure::Unparseable(err.to_string())),
        Ok(Err(join_err)) => Err(DocumentFailure::Unparseable(format!(
            "{} extractor aborted: {join_err}",
            kind.as_str()
        ))),
        Err(_) => Err(DocumentFailure::Unparseable(format!(
            "{} extraction exceeded {limit:?}",
            kind.as_str()
        ))),
    }
}
