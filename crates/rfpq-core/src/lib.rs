//! Core domain model for RFPQ: feed records, filter configuration, keyword sets and priority levels.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const CRATE_NAME: &str = "rfpq-core";

/// Attachment URL fields, in the order they are consulted.
pub const ATTACHMENT_FIELDS: &[&str] = &[
    "document_url",
    "attachment_url",
    "file_url",
    "documents",
    "attachments",
    "files",
];

pub const DEFAULT_JURISDICTIONS: &[&str] = &["california", "sunnyvale", "claremont"];

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "wifi",
    "wi-fi",
    "wireless",
    "network",
    "networking",
    "broadband",
    "fiber",
    "access point",
    "ethernet",
    "router",
    "switching",
    "cabling",
    "connectivity",
    "5g",
    "distributed antenna",
];

const DUE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DUE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];

/// One solicitation exactly as the feed delivered it.
///
/// Fields are read through typed accessors so that "missing", `null` and
/// wrongly typed values all collapse to the same default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpportunityRecord {
    fields: Map<String, JsonValue>,
}

impl OpportunityRecord {
    /// Returns `None` unless the value is a JSON object.
    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Text value of `field`; numbers and booleans are rendered, everything else is empty.
    pub fn text(&self, field: &str) -> String {
        match self.fields.get(field) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(JsonValue::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn id(&self) -> String {
        self.text("id")
    }

    pub fn title(&self) -> String {
        self.text("title")
    }

    pub fn opportunity_status(&self) -> String {
        self.text("opportunity_status")
    }

    pub fn jurisdiction_title(&self) -> String {
        self.text("jurisdiction_title")
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.fields.get("due_date").and_then(parse_due_date)
    }

    /// Title, description and short description joined by single spaces, lowercased.
    pub fn searchable_text(&self) -> String {
        ["title", "description", "short_description"]
            .iter()
            .map(|field| self.text(field))
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// First usable URL of each attachment field, de-duplicated and capped at `limit`.
    pub fn attachment_urls(&self, limit: usize) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for field in ATTACHMENT_FIELDS {
            if urls.len() >= limit {
                break;
            }
            let Some(url) = self.fields.get(*field).and_then(first_url) else {
                continue;
            };
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

fn first_url(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => http_url(s),
        JsonValue::Array(items) => items.iter().find_map(|item| match item {
            JsonValue::String(s) => http_url(s),
            JsonValue::Object(obj) => ["url", "href"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(JsonValue::as_str).and_then(http_url)),
            _ => None,
        }),
        JsonValue::Object(obj) => ["url", "href"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(JsonValue::as_str).and_then(http_url)),
        _ => None,
    }
}

fn http_url(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Lenient due date parsing. Naive timestamps are read as UTC; numbers are Unix epoch
/// seconds, or milliseconds when too large to be seconds.
pub fn parse_due_date(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => parse_due_date_str(s),
        JsonValue::Number(n) => {
            let raw = match n.as_i64() {
                Some(raw) => raw,
                None => epoch_from_f64(n.as_f64()?)?,
            };
            if raw.unsigned_abs() > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

fn epoch_from_f64(value: f64) -> Option<i64> {
    // `as` saturates, so anything outside the i64 range is rejected first.
    if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

pub fn parse_due_date_str(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DUE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DUE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Caller-chosen filter inputs for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub target_jurisdictions: BTreeSet<String>,
    pub include_expired: bool,
    pub search_documents: bool,
}

impl FilterConfig {
    pub fn new<I, S>(jurisdictions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            target_jurisdictions: normalize_jurisdictions(jurisdictions),
            include_expired: false,
            search_documents: false,
        }
    }

    pub fn with_include_expired(mut self, include_expired: bool) -> Self {
        self.include_expired = include_expired;
        self
    }

    pub fn with_search_documents(mut self, search_documents: bool) -> Self {
        self.search_documents = search_documents;
        self
    }

    pub fn targets(&self, jurisdiction: &str) -> bool {
        self.target_jurisdictions
            .contains(&jurisdiction.trim().to_lowercase())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_JURISDICTIONS)
    }
}

pub fn normalize_jurisdictions<I, S>(jurisdictions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    jurisdictions
        .into_iter()
        .map(|j| j.as_ref().trim().to_lowercase())
        .filter(|j| !j.is_empty())
        .collect()
}

/// Ordered, de-duplicated lowercase keyword substrings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !out.contains(&keyword) {
                out.push(keyword);
            }
        }
        Self { keywords: out }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    /// Whether any keyword occurs in `text`, ignoring case.
    pub fn any_in(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.iter().any(|keyword| haystack.contains(keyword))
    }

    /// Keywords occurring in `text`, ignoring case, in list order.
    pub fn found_in(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.iter()
            .filter(|keyword| haystack.contains(*keyword))
            .map(ToString::to_string)
            .collect()
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
}

impl PriorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "Low",
            PriorityLevel::Medium => "Medium",
            PriorityLevel::High => "High",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Lower bounds (inclusive) of the Medium and High levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityThresholds {
    pub high: i64,
    pub medium: i64,
}

impl Default for PriorityThresholds {
    fn default() -> Self {
        Self {
            high: 40,
            medium: 20,
        }
    }
}

impl PriorityThresholds {
    pub fn level_for(&self, score: i64) -> PriorityLevel {
        if score >= self.high {
            PriorityLevel::High
        } else if score >= self.medium {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }
}

/// A feed record plus every value derived from it during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOpportunity {
    pub record: OpportunityRecord,
    pub status_open: bool,
    pub location_match: bool,
    pub good_fit: bool,
    pub networking_match: bool,
    /// Keywords found in title/description text followed by any found only in documents.
    pub matched_keywords: Vec<String>,
    pub document_keywords: Vec<String>,
    pub priority_score: i64,
    pub priority_level: PriorityLevel,
}

impl ScoredOpportunity {
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.record.due_date()
    }
}
