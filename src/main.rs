mod config;
mod db;
mod enrich;
mod error;
mod export;
mod fetcher;
mod model;
mod parser;
mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use config::Settings;
use enrich::Enricher;
use export::JsonlWriter;
use fetcher::edgar::EdgarClient;
use fetcher::filings::FilingQuery;
use fetcher::{CrawlRequest, Crawler};
use model::{Company, EnrichedDocument, Filing, Provenance, RawDocument};
use parser::Extractor;
use pipeline::context::RunContext;
use pipeline::{Pipeline, RunStatus};

#[derive(Parser)]
#[command(name = "edgar_pipeline", about = "SEC EDGAR filings crawler and extraction pipeline")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl filings, extract, enrich and store them
    Run(RunArgs),
    /// Extract and enrich local HTML filings without touching the network
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Filing type to assume for every file
        #[arg(long, default_value = "10-K")]
        filing_type: String,
        /// Company name used for titles
        #[arg(long, default_value = "Unknown Company")]
        company: String,
        /// Print one JSON document per line instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Show document, section, company and error counts
    Stats,
    /// List recent runs
    Runs {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("entities").required(true).args(["tickers", "ciks"])))]
struct RunArgs {
    /// Ticker symbols, e.g. AAPL MSFT
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    tickers: Vec<String>,

    /// Central Index Keys, with or without zero padding
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    ciks: Vec<String>,

    #[arg(long, num_args = 1.., value_delimiter = ',', default_values = ["10-K", "10-Q", "8-K"])]
    filing_types: Vec<String>,

    /// Most recent filings to take per company
    #[arg(long, default_value_t = 10)]
    max_filings: usize,

    /// Earliest filing date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    date_from: Option<NaiveDate>,

    /// Latest filing date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    date_to: Option<NaiveDate>,

    /// Also append newly stored documents to this JSONL file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cancel the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let settings = cli.settings;

    let result = match cli.command {
        Commands::Run(args) => run_pipeline(&settings, args).await,
        Commands::Extract {
            files,
            filing_type,
            company,
            json,
        } => extract_files(&settings, &files, &filing_type, &company, json),
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Documents: {}", s.documents);
            println!("Sections:  {}", s.sections);
            println!("Companies: {}", s.companies);
            println!("Runs:      {}", s.runs);
            println!("Errors:    {}", s.errors);
            println!("Skips:     {}", s.skips);
            if let Some(q) = s.avg_quality {
                println!("Quality:   {:.3} avg", q);
            }
            if !s.by_filing_type.is_empty() {
                println!("\n--- By filing type ---");
                for (filing_type, count) in &s.by_filing_type {
                    println!("  {:<8} {}", filing_type, count);
                }
            }
            Ok(())
        }
        Commands::Runs { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let runs = db::fetch_runs(&conn, limit)?;
            if runs.is_empty() {
                println!("No runs yet. Start one with 'run --tickers ..'.");
                return Ok(());
            }

            println!(
                "{:<36} | {:<19} | {:<9} | {:<20} | {:>5} | {:>5} | {:>5} | {:>5}",
                "Run", "Started", "Status", "Entities", "Crawl", "Saved", "Skip", "Err"
            );
            println!("{}", "-".repeat(126));
            for r in &runs {
                println!(
                    "{:<36} | {:<19} | {:<9} | {:<20} | {:>5} | {:>5} | {:>5} | {:>5}",
                    r.id,
                    r.started_at,
                    r.status,
                    truncate(&r.identifiers.join(","), 20),
                    r.crawled,
                    r.saved,
                    r.skipped,
                    r.errored
                );
                if let Some(summary) = &r.error_summary {
                    println!("    error: {}", truncate(summary, 100));
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_pipeline(settings: &Settings, args: RunArgs) -> anyhow::Result<()> {
    let filing_types = config::supported_filing_types(&args.filing_types);
    anyhow::ensure!(
        !filing_types.is_empty(),
        "none of the requested filing types are supported ({})",
        config::SUPPORTED_FILING_TYPES.join(", ")
    );
    if let (Some(from), Some(to)) = (args.date_from, args.date_to) {
        anyhow::ensure!(from <= to, "--date-from {from} is after --date-to {to}");
    }
    let identifiers = if args.tickers.is_empty() { args.ciks } else { args.tickers };

    let source = Arc::new(EdgarClient::new(settings)?);
    let pipeline = Pipeline::new(Extractor::sec()?, Enricher::with_min_words(settings.min_content_words));
    let mut export = args.output.as_deref().map(JsonlWriter::append).transpose()?;

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let run_id = Uuid::now_v7();
    db::create_run(
        &conn,
        &db::NewRun {
            id: run_id,
            identifiers: &identifiers,
            filing_types: &filing_types,
            max_filings: args.max_filings,
            config: serde_json::to_string(settings)?,
        },
    )?;
    let ctx = Arc::new(RunContext::with_seen(run_id, db::load_seen_urls(&conn)?));
    info!(
        run_id = %run_id,
        entities = identifiers.len(),
        filing_types = ?filing_types,
        previously_stored = ctx.seen_count(),
        "Starting run"
    );

    let crawler = Crawler::new(source, Arc::clone(&ctx), settings);
    let stream = crawler.crawl(CrawlRequest {
        identifiers,
        query: FilingQuery {
            filing_types,
            max_filings: args.max_filings,
            date_from: args.date_from,
            date_to: args.date_to,
        },
    });

    let mut sink = db::SqliteSink::new(&conn);
    let cancel = shutdown_signal(args.timeout_secs.map(Duration::from_secs));
    let outcome = pipeline
        .with_spinner()
        .run(&ctx, stream, &mut sink, export.as_mut(), cancel)
        .await?;

    let c = outcome.counters;
    println!(
        "Run {} {}: {} crawled, {} saved, {} skipped, {} errored.",
        run_id,
        outcome.status.as_str(),
        c.attempted,
        c.stored,
        c.skipped,
        c.errored
    );
    if let Some(out) = &export {
        if let Some(path) = &args.output {
            println!("Exported {} documents to {}", out.written(), path.display());
        }
    }
    match outcome.status {
        RunStatus::Failed => anyhow::bail!(
            "run failed: {}",
            outcome.error_summary.as_deref().unwrap_or("no documents stored")
        ),
        _ => Ok(()),
    }
}

/// Resolves on Ctrl-C or when the optional deadline passes.
async fn shutdown_signal(timeout: Option<Duration>) {
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let deadline = async {
        match timeout {
            Some(t) => tokio::time::sleep(t).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = interrupt => warn!("Interrupted"),
        _ = deadline => warn!("Run timed out"),
    }
}

fn extract_files(
    settings: &Settings,
    files: &[PathBuf],
    filing_type: &str,
    company: &str,
    json: bool,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let extractor = Extractor::sec()?;
    let enricher = Enricher::with_min_words(settings.min_content_words);
    let company = Arc::new(Company {
        cik: "0000000000".into(),
        name: company.to_string(),
        ..Company::default()
    });

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let results: Vec<anyhow::Result<EnrichedDocument>> = files
        .par_iter()
        .map(|path| {
            let result = extract_file(&extractor, &enricher, &company, filing_type, path);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_and_clear();

    let mut ok = 0usize;
    let mut writer = json.then(|| JsonlWriter::new(std::io::stdout().lock()));
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(doc) => {
                ok += 1;
                match writer.as_mut() {
                    Some(w) => w.write(&doc)?,
                    None => println!(
                        "{}: {} | {} | {} words | {} sections | quality {:.2} | {}",
                        path.display(),
                        truncate(&doc.title, 48),
                        doc.content_type,
                        doc.word_count,
                        doc.sections.len(),
                        doc.quality.score,
                        doc.tags.join(",")
                    ),
                }
            }
            Err(e) => warn!(path = %path.display(), "Skipped: {:#}", e),
        }
    }
    eprintln!("Extracted {} of {} files.", ok, files.len());
    Ok(())
}

fn extract_file(
    extractor: &Extractor,
    enricher: &Enricher,
    company: &Arc<Company>,
    filing_type: &str,
    path: &Path,
) -> anyhow::Result<EnrichedDocument> {
    let body = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let url = std::fs::canonicalize(path)
        .ok()
        .and_then(|p| url::Url::from_file_path(p).ok())
        .map(String::from)
        .unwrap_or_else(|| path.display().to_string());
    let now = Utc::now();
    let primary_document = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let raw = RawDocument {
        provenance: Provenance {
            company: Arc::clone(company),
            filing: Filing {
                accession_number: String::new(),
                filing_type: filing_type.to_string(),
                filing_date: now.date_naive(),
                period_of_report: None,
                primary_document,
                url: url.clone(),
            },
            url,
            http_status: 200,
            fetched_at: now,
            last_modified: None,
        },
        body,
    };
    let extracted = extractor.extract(raw)?;
    Ok(enricher.enrich(extracted)?)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
