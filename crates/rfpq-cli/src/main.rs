use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rfpq_core::{FilterConfig, ScoredOpportunity};
use rfpq_pipeline::{Pipeline, RunConfig, RunReport};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rfpq-cli")]
#[command(about = "Qualify public-sector RFP leads from the bid feed")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Target jurisdiction; repeat to add more. Replaces RFPQ_JURISDICTIONS.
    #[arg(long = "jurisdiction", global = true)]
    jurisdictions: Vec<String>,

    #[arg(long, global = true)]
    include_expired: bool,

    /// Also scan linked PDF and Word attachments for keywords.
    #[arg(long, global = true)]
    search_documents: bool,

    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the live feed and score it.
    Run,
    /// Score a saved feed response.
    Replay { file: PathBuf },
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::from_env();
        if !self.jurisdictions.is_empty() {
            config.filter = FilterConfig {
                target_jurisdictions: FilterConfig::new(&self.jurisdictions).target_jurisdictions,
                ..config.filter
            };
        }
        if self.include_expired {
            config.filter.include_expired = true;
        }
        if self.search_documents {
            config.filter.search_documents = true;
        }
        if let Some(dir) = &self.export_dir {
            config.export_dir = Some(dir.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("rfpq-cli starting v{}", env!("CARGO_PKG_VERSION"));
    let pipeline = Pipeline::new(cli.run_config())?;

    let report = match &cli.command {
        None | Some(Commands::Run) => pipeline.run_once().await?,
        Some(Commands::Replay { file }) => {
            let records = rfpq_feed::load_feed_file(file)
                .with_context(|| format!("loading {}", file.display()))?;
            pipeline.replay(records).await?
        }
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    let metrics = report.metrics();
    println!(
        "run complete: run_id={} opportunities={} open={} location_matches={} good_fit={} networking={} high={} medium={} low={}",
        report.run_id,
        metrics.total,
        metrics.status_open,
        metrics.location_match,
        metrics.good_fit,
        metrics.networking_match,
        metrics.high,
        metrics.medium,
        metrics.low
    );

    println!("\nAll RFPs");
    print_table(&report.visible());
    println!("\nBids to Be Pursued");
    print_table(&report.good_fit());

    if let Some(bundle) = &report.exports {
        println!(
            "\nexports: {} {} {} {}",
            bundle.all_csv.display(),
            bundle.good_fit_csv.display(),
            bundle.brief.display(),
            bundle.manifest.display()
        );
    }
}

fn print_table(rows: &[&ScoredOpportunity]) {
    if rows.is_empty() {
        println!("  (none)");
        return;
    }
    println!(
        "  {:<10} {:<6} {:<6} {:<12} {:<20} {}",
        "id", "score", "level", "due", "jurisdiction", "title"
    );
    for s in rows {
        let due = s
            .due_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<10} {:<6} {:<6} {:<12} {:<20} {}",
            s.record.id(),
            s.priority_score,
            s.priority_level,
            due,
            s.record.jurisdiction_title(),
            s.record.title()
        );
    }
}
