//! Domain keyword matching over record text, optionally widened by linked documents.

use rfpq_core::{KeywordSet, OpportunityRecord};
use rfpq_documents::{DocumentFetcher, DocumentScan};
use uuid::Uuid;

/// Case-insensitive substring test of every keyword against `text`.
pub fn text_has_keyword(text: &str, keywords: &KeywordSet) -> bool {
    keywords.any_in(text)
}

/// Distinct keywords present in `text`, in keyword-list order.
pub fn keywords_in_text(text: &str, keywords: &KeywordSet) -> Vec<String> {
    keywords.found_in(text)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordMatch {
    pub networking_match: bool,
    pub text_keywords: Vec<String>,
    pub document_keywords: Vec<String>,
    pub documents: Option<DocumentScan>,
}

impl KeywordMatch {
    /// Text keywords first, then keywords only the documents contributed.
    pub fn all_keywords(&self) -> Vec<String> {
        let mut out = self.text_keywords.clone();
        for keyword in &self.document_keywords {
            if !out.contains(keyword) {
                out.push(keyword.clone());
            }
        }
        out
    }
}

pub struct KeywordMatcher {
    keywords: KeywordSet,
    documents: Option<DocumentFetcher>,
}

impl KeywordMatcher {
    pub fn new(keywords: KeywordSet) -> Self {
        Self {
            keywords,
            documents: None,
        }
    }

    pub fn with_document_fetcher(mut self, fetcher: DocumentFetcher) -> Self {
        self.documents = Some(fetcher);
        self
    }

    /// Text match, widened by a document scan when `doc_search_enabled` and a fetcher is configured.
    pub async fn record_has_keyword(
        &self,
        run_id: Uuid,
        record: &OpportunityRecord,
        doc_search_enabled: bool,
    ) -> KeywordMatch {
        let text_keywords = keywords_in_text(&record.searchable_text(), &self.keywords);

        let documents = match (&self.documents, doc_search_enabled) {
            (Some(fetcher), true) => Some(fetcher.scan_record(run_id, record).await),
            _ => None,
        };
        let document_keywords = documents
            .as_ref()
            .map(|scan| scan.keywords_found.clone())
            .unwrap_or_default();
        let document_match = documents.as_ref().is_some_and(|scan| scan.match_found);

        KeywordMatch {
            networking_match: !text_keywords.is_empty() || document_match,
            text_keywords,
            document_keywords,
            documents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use rfpq_documents::DocumentFetcherConfig;
    use rfpq_http::{HttpClientConfig, HttpFetcher};
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn record(value: serde_json::Value) -> OpportunityRecord {
        OpportunityRecord::from_json(value).unwrap()
    }

    async fn failing_document_server() -> String {
        let app = Router::new().route(
            "/addendum.pdf",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn matcher_with_documents() -> KeywordMatcher {
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let fetcher = DocumentFetcher::new(
            http,
            KeywordSet::default(),
            DocumentFetcherConfig {
                max_documents_per_record: 3,
                inter_fetch_delay: Duration::ZERO,
            },
        );
        KeywordMatcher::new(KeywordSet::default()).with_document_fetcher(fetcher)
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let keywords = KeywordSet::default();
        assert!(text_has_keyword("Enterprise WIFI rollout", &keywords));
        assert!(text_has_keyword("Citywide NETWORKING refresh", &keywords));
        assert!(!text_has_keyword("Janitorial services", &keywords));
        assert!(!text_has_keyword("", &keywords));
    }

    #[test]
    fn fixture_keyword_sets_can_replace_the_default() {
        let keywords = KeywordSet::new(["paving", "asphalt"]);
        assert!(text_has_keyword("Road Paving 2027", &keywords));
        assert!(!text_has_keyword("WiFi upgrade", &keywords));
        assert_eq!(
            keywords_in_text("Asphalt and paving", &keywords),
            vec!["paving".to_string(), "asphalt".to_string()]
        );
    }

    #[tokio::test]
    async fn text_fields_are_concatenated() {
        let matcher = KeywordMatcher::new(KeywordSet::default());
        let rec = record(json!({
            "title": "Library upgrade",
            "description": null,
            "short_description": "New access point hardware",
        }));
        let found = matcher.record_has_keyword(Uuid::new_v4(), &rec, false).await;
        assert!(found.networking_match);
        assert_eq!(found.text_keywords, vec!["access point".to_string()]);
        assert!(found.documents.is_none());
    }

    #[tokio::test]
    async fn disabled_document_search_makes_no_document_requests() {
        let rec = record(json!({
            "title": "Parks mowing",
            "document_url": "http://127.0.0.1:9/never-fetched.pdf",
        }));
        let found = matcher_with_documents()
            .record_has_keyword(Uuid::new_v4(), &rec, false)
            .await;
        assert!(!found.networking_match);
        assert!(found.documents.is_none());
    }

    #[tokio::test]
    async fn failing_document_falls_back_to_text_match() {
        let base = failing_document_server().await;
        let matcher = matcher_with_documents();

        let wifi = record(json!({
            "title": "Campus WiFi",
            "document_url": format!("{base}/addendum.pdf"),
        }));
        let found = matcher.record_has_keyword(Uuid::new_v4(), &wifi, true).await;
        assert!(found.networking_match);
        assert_eq!(found.text_keywords, vec!["wifi".to_string()]);
        assert!(found.document_keywords.is_empty());
        assert_eq!(found.documents.as_ref().map(DocumentScan::failures), Some(1));

        let mowing = record(json!({
            "title": "Parks mowing",
            "document_url": format!("{base}/addendum.pdf"),
        }));
        let found = matcher.record_has_keyword(Uuid::new_v4(), &mowing, true).await;
        assert!(!found.networking_match);
    }

    #[test]
    fn all_keywords_merges_without_duplicates() {
        let found = KeywordMatch {
            networking_match: true,
            text_keywords: vec!["wifi".into()],
            document_keywords: vec!["fiber".into(), "wifi".into()],
            documents: None,
        };
        assert_eq!(found.all_keywords(), vec!["wifi".to_string(), "fiber".to_string()]);
    }
}
