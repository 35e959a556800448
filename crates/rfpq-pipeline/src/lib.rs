//! Run orchestration: fetch the feed, classify and score every record, build ranked views and exports.

pub mod classify;
pub mod export;
pub mod keywords;
pub mod priority;

use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rfpq_core::{
    FilterConfig, KeywordSet, OpportunityRecord, PriorityLevel, PriorityThresholds,
    ScoredOpportunity, DEFAULT_JURISDICTIONS,
};
use rfpq_documents::{DocumentFetcher, DocumentFetcherConfig};
use rfpq_feed::{FeedClient, FeedEndpoint, DEFAULT_FEED_URL};
use rfpq_http::{HttpClientConfig, HttpFetcher};
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::export::ExportBundle;
use crate::keywords::KeywordMatcher;
use crate::priority::{days_until, PriorityScorer};

pub const CRATE_NAME: &str = "rfpq-pipeline";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub feed_url: String,
    pub feed_email: String,
    pub feed_token: String,
    pub http_timeout_secs: u64,
    pub document_timeout_secs: u64,
    pub document_delay_ms: u64,
    pub max_documents: usize,
    pub user_agent: String,
    pub filter: FilterConfig,
    pub export_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
                .unwrap_or(false)
        };
        let number = |key: &str, default: u64, range: std::ops::RangeInclusive<u64>| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| range.contains(v))
                .unwrap_or(default)
        };
        let jurisdictions = lookup("RFPQ_JURISDICTIONS")
            .map(|v| v.split(',').map(str::to_string).collect::<Vec<_>>())
            .filter(|list| list.iter().any(|j| !j.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_JURISDICTIONS.iter().map(|j| j.to_string()).collect());

        Self {
            feed_url: lookup("RFPQ_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            feed_email: lookup("RFPQ_FEED_EMAIL").unwrap_or_default(),
            feed_token: lookup("RFPQ_FEED_TOKEN").unwrap_or_default(),
            http_timeout_secs: number("RFPQ_HTTP_TIMEOUT_SECS", 10, 1..=120),
            document_timeout_secs: number("RFPQ_DOCUMENT_TIMEOUT_SECS", 15, 1..=120),
            document_delay_ms: number("RFPQ_DOCUMENT_DELAY_MS", 500, 0..=10_000),
            max_documents: number("RFPQ_MAX_DOCUMENTS", 3, 0..=10) as usize,
            user_agent: lookup("RFPQ_USER_AGENT").unwrap_or_else(|| "rfpq-bot/0.1".to_string()),
            filter: FilterConfig::new(jurisdictions)
                .with_include_expired(flag("RFPQ_INCLUDE_EXPIRED"))
                .with_search_documents(flag("RFPQ_SEARCH_DOCUMENTS")),
            export_dir: lookup("RFPQ_EXPORT_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    pub total: usize,
    pub status_open: usize,
    pub location_match: usize,
    pub good_fit: usize,
    pub networking_match: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl RunMetrics {
    pub fn from_scored<'a>(items: impl IntoIterator<Item = &'a ScoredOpportunity>) -> Self {
        let mut metrics = Self::default();
        for item in items {
            metrics.total += 1;
            metrics.status_open += usize::from(item.status_open);
            metrics.location_match += usize::from(item.location_match);
            metrics.good_fit += usize::from(item.good_fit);
            metrics.networking_match += usize::from(item.networking_match);
            match item.priority_level {
                PriorityLevel::High => metrics.high += 1,
                PriorityLevel::Medium => metrics.medium += 1,
                PriorityLevel::Low => metrics.low += 1,
            }
        }
        metrics
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub filter: FilterConfig,
    /// Every scored record, in feed order.
    pub records: Vec<ScoredOpportunity>,
    pub exports: Option<ExportBundle>,
}

impl RunReport {
    /// Records due before today are hidden unless the filter includes expired bids.
    pub fn is_shown(&self, scored: &ScoredOpportunity) -> bool {
        self.filter.include_expired
            || scored
                .due_date()
                .map_or(true, |due| days_until(due, self.started_at) >= 0)
    }

    /// Shown records in ranking order.
    pub fn visible(&self) -> Vec<&ScoredOpportunity> {
        let mut rows = self
            .records
            .iter()
            .filter(|s| self.is_shown(s))
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| rank_order(a, b));
        rows
    }

    pub fn good_fit(&self) -> Vec<&ScoredOpportunity> {
        self.visible().into_iter().filter(|s| s.good_fit).collect()
    }

    pub fn metrics(&self) -> RunMetrics {
        RunMetrics::from_scored(self.visible())
    }
}

/// Highest score first, then good fits, then the earliest due date (undated last), then id.
pub fn rank_order(a: &ScoredOpportunity, b: &ScoredOpportunity) -> Ordering {
    b.priority_score
        .cmp(&a.priority_score)
        .then_with(|| b.good_fit.cmp(&a.good_fit))
        .then_with(|| match (a.due_date(), b.due_date()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.record.id().cmp(&b.record.id()))
}

pub struct Pipeline {
    config: RunConfig,
    feed: FeedClient,
    matcher: KeywordMatcher,
    scorer: PriorityScorer,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Result<Self> {
        Self::with_rules(config, KeywordSet::default(), PriorityThresholds::default())
    }

    pub fn with_rules(
        config: RunConfig,
        keywords: KeywordSet,
        thresholds: PriorityThresholds,
    ) -> Result<Self> {
        let feed_http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
        })
        .context("building feed http client")?;
        let document_http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.document_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
        })
        .context("building document http client")?;

        let feed = FeedClient::new(
            feed_http,
            FeedEndpoint::new(
                config.feed_url.clone(),
                config.feed_email.clone(),
                config.feed_token.clone(),
            ),
        );
        let documents = DocumentFetcher::new(
            document_http,
            keywords.clone(),
            DocumentFetcherConfig {
                max_documents_per_record: config.max_documents,
                inter_fetch_delay: Duration::from_millis(config.document_delay_ms),
            },
        );

        Ok(Self {
            matcher: KeywordMatcher::new(keywords.clone()).with_document_fetcher(documents),
            scorer: PriorityScorer::new(keywords, thresholds),
            feed,
            config,
        })
    }

    /// Fetches the live feed. A feed failure aborts the run with no partial results.
    pub async fn run_once(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, search_documents = self.config.filter.search_documents, "run started");

        let records = self.feed.fetch(run_id).await?;
        self.finish(run_id, started_at, records).await
    }

    /// Scores records from a saved feed response instead of the live feed.
    pub async fn replay(&self, records: Vec<OpportunityRecord>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        info!(%run_id, records = records.len(), "replay started");
        self.finish(run_id, Utc::now(), records).await
    }

    async fn finish(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        records: Vec<OpportunityRecord>,
    ) -> Result<RunReport> {
        let mut report = self.report_for(run_id, started_at, records).await;
        if let Some(dir) = &self.config.export_dir {
            let bundle = export::write_exports(dir, &report)
                .with_context(|| format!("writing exports to {}", dir.display()))?;
            report.exports = Some(bundle);
        }
        let metrics = report.metrics();
        info!(
            %run_id,
            scored = report.records.len(),
            shown = metrics.total,
            good_fit = metrics.good_fit,
            high = metrics.high,
            "run finished"
        );
        Ok(report)
    }

    /// Scores `records` against `now` without touching the feed or the filesystem.
    pub async fn report_for(
        &self,
        run_id: Uuid,
        now: DateTime<Utc>,
        records: Vec<OpportunityRecord>,
    ) -> RunReport {
        let scored = self.score_records(run_id, records, now).await;
        RunReport {
            run_id,
            started_at: now,
            finished_at: Utc::now(),
            filter: self.config.filter.clone(),
            records: scored,
            exports: None,
        }
    }

    /// Records are scored strictly one after another.
    pub async fn score_records(
        &self,
        run_id: Uuid,
        records: Vec<OpportunityRecord>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredOpportunity> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let span = info_span!("score_record", %run_id, id = %record.id());
            out.push(self.score_record(run_id, record, now).instrument(span).await);
        }
        out
    }

    pub async fn score_record(
        &self,
        run_id: Uuid,
        record: OpportunityRecord,
        now: DateTime<Utc>,
    ) -> ScoredOpportunity {
        let fit = classify::classify(&record, &self.config.filter);
        let found = self
            .matcher
            .record_has_keyword(run_id, &record, self.config.filter.search_documents)
            .await;
        let priority = self.scorer.score(&record, now);

        ScoredOpportunity {
            status_open: fit.status_open,
            location_match: fit.location_match,
            good_fit: fit.good_fit,
            networking_match: found.networking_match,
            matched_keywords: found.all_keywords(),
            document_keywords: found.document_keywords,
            priority_score: priority.score,
            priority_level: priority.level,
            record,
        }
    }
}
