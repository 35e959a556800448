//! Delimited exports of a scored run plus a markdown brief and a checksum manifest.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rfpq_core::ScoredOpportunity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::RunReport;

pub const EXPORT_COLUMNS: [&str; 13] = [
    "id",
    "title",
    "type",
    "due_date",
    "opportunity_status",
    "jurisdiction_title",
    "status_open",
    "location_match",
    "good_fit",
    "networking_match",
    "matched_keywords",
    "priority_score",
    "priority_level",
];

pub const KEYWORD_SEPARATOR: &str = ";";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing manifest: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> ExportError + 'a {
    move |source| ExportError::Io {
        action,
        path: path.display().to_string(),
        source,
    }
}

/// One exported line. Field order matches [`EXPORT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub due_date: String,
    pub opportunity_status: String,
    pub jurisdiction_title: String,
    pub status_open: bool,
    pub location_match: bool,
    pub good_fit: bool,
    pub networking_match: bool,
    pub matched_keywords: String,
    pub priority_score: i64,
    pub priority_level: String,
}

impl ExportRow {
    pub fn from_scored(scored: &ScoredOpportunity) -> Self {
        let record = &scored.record;
        Self {
            id: record.id(),
            title: record.title(),
            kind: record.text("type"),
            due_date: record.text("due_date"),
            opportunity_status: record.opportunity_status(),
            jurisdiction_title: record.jurisdiction_title(),
            status_open: scored.status_open,
            location_match: scored.location_match,
            good_fit: scored.good_fit,
            networking_match: scored.networking_match,
            matched_keywords: scored.matched_keywords.join(KEYWORD_SEPARATOR),
            priority_score: scored.priority_score,
            priority_level: scored.priority_level.to_string(),
        }
    }

    pub fn keywords(&self) -> Vec<&str> {
        self.matched_keywords
            .split(KEYWORD_SEPARATOR)
            .filter(|k| !k.is_empty())
            .collect()
    }
}

pub fn write_csv<W: Write>(writer: W, rows: &[&ScoredOpportunity]) -> Result<(), ExportError> {
    // Header is written by hand so that an empty export still carries it.
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(EXPORT_COLUMNS)?;
    for scored in rows {
        wtr.serialize(ExportRow::from_scored(scored))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_export(path: impl AsRef<Path>) -> Result<Vec<ExportRow>, ExportError> {
    let mut rdr = csv::Reader::from_path(path.as_ref())?;
    let rows = rdr.deserialize().collect::<Result<Vec<ExportRow>, _>>()?;
    Ok(rows)
}

pub fn all_file_name(date: NaiveDate) -> String {
    format!("rfp_all_{}.csv", date.format("%Y-%m-%d"))
}

pub fn good_fit_file_name(date: NaiveDate) -> String {
    format!("rfp_good_fit_{}.csv", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportBundle {
    pub all_csv: PathBuf,
    pub good_fit_csv: PathBuf,
    pub brief: PathBuf,
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    pub run_id: String,
    pub files: Vec<ExportManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportManifestFile {
    pub name: String,
    pub sha256: String,
    pub bytes: u64,
}

/// Writes both CSV exports, the brief and the manifest into `dir`.
pub fn write_exports(dir: &Path, report: &RunReport) -> Result<ExportBundle, ExportError> {
    fs::create_dir_all(dir).map_err(io_err("creating", dir))?;
    let date = report.started_at.date_naive();
    let stamp = date.format("%Y-%m-%d");

    let all_csv = dir.join(all_file_name(date));
    let good_fit_csv = dir.join(good_fit_file_name(date));
    let brief = dir.join(format!("rfp_brief_{stamp}.md"));
    let manifest = dir.join(format!("rfp_manifest_{stamp}.json"));

    write_csv_file(&all_csv, &report.visible())?;
    write_csv_file(&good_fit_csv, &report.good_fit())?;
    fs::write(&brief, render_brief(report)).map_err(io_err("writing", &brief))?;

    let files = [&all_csv, &good_fit_csv, &brief]
        .into_iter()
        .map(|path| manifest_entry(path))
        .collect::<Result<Vec<_>, _>>()?;
    let bytes = serde_json::to_vec_pretty(&ExportManifest {
        run_id: report.run_id.to_string(),
        files,
    })?;
    fs::write(&manifest, bytes).map_err(io_err("writing", &manifest))?;

    Ok(ExportBundle {
        all_csv,
        good_fit_csv,
        brief,
        manifest,
    })
}

fn write_csv_file(path: &Path, rows: &[&ScoredOpportunity]) -> Result<(), ExportError> {
    let file = File::create(path).map_err(io_err("creating", path))?;
    write_csv(file, rows)
}

fn manifest_entry(path: &Path) -> Result<ExportManifestFile, ExportError> {
    let bytes = fs::read(path).map_err(io_err("reading", path))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(ExportManifestFile {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        sha256: hex::encode(hasher.finalize()),
        bytes: bytes.len() as u64,
    })
}

pub fn render_brief(report: &RunReport) -> String {
    let metrics = report.metrics();
    let top = report
        .good_fit()
        .iter()
        .take(10)
        .map(|s| {
            format!(
                "- [{}] {} ({}, score {})",
                s.priority_level,
                s.record.title(),
                s.record.jurisdiction_title(),
                s.priority_score
            )
        })
        .collect::<Vec<_>>();
    format!(
        "# RFP Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Opportunities: {}\n- Open: {}\n- Location matches: {}\n- Good fit: {}\n- Networking matches: {}\n- Priority: {} high / {} medium / {} low\n\n## Bids to Be Pursued\n{}\n",
        report.run_id,
        report.started_at,
        report.finished_at,
        metrics.total,
        metrics.status_open,
        metrics.location_match,
        metrics.good_fit,
        metrics.networking_match,
        metrics.high,
        metrics.medium,
        metrics.low,
        if top.is_empty() {
            "- none".to_string()
        } else {
            top.join("\n")
        }
    )
}
