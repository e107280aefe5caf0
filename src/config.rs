use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::Serialize;

use crate::fetcher::retry::RetryPolicy;

pub const SUBMISSIONS_URL: &str = "https://data.sec.gov/submissions";
pub const ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";
pub const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
pub const BACKOFF_MIN: Duration = Duration::from_secs(1);
pub const BACKOFF_MAX: Duration = Duration::from_secs(10);

pub const SUPPORTED_FILING_TYPES: &[&str] = &["10-K", "10-Q", "8-K", "DEF 14A", "20-F", "6-K"];
pub const FOREIGN_ISSUER_FORMS: &[&str] = &["20-F", "6-K", "40-F"];

/// Runtime settings shared by the `run` and `extract` commands.
#[derive(Debug, Clone, Args, Serialize)]
pub struct Settings {
    /// SEC requires a descriptive User-Agent with contact details
    #[arg(long, global = true, env = "SEC_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Seconds to hold a request slot after each successful fetch
    #[arg(long, global = true, env = "CRAWL_DELAY_SECONDS", default_value_t = 0.5)]
    pub crawl_delay_seconds: f64,

    #[arg(long, global = true, env = "REQUEST_TIMEOUT_SECONDS", default_value_t = 30)]
    pub request_timeout_seconds: u64,

    /// Attempts per request, including the first
    #[arg(long, global = true, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    #[arg(long, global = true, env = "MAX_CONCURRENT_REQUESTS", default_value_t = 5)]
    pub max_concurrent_requests: usize,

    /// Documents with fewer words are skipped before enrichment
    #[arg(long, global = true, env = "MIN_CONTENT_WORDS", default_value_t = 50)]
    pub min_content_words: usize,

    #[arg(long, global = true, env = "EDGAR_DB_PATH", default_value = "data/edgar.sqlite")]
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agent: None,
            crawl_delay_seconds: 0.5,
            request_timeout_seconds: 30,
            max_retries: 3,
            max_concurrent_requests: 5,
            min_content_words: 50,
            db_path: PathBuf::from("data/edgar.sqlite"),
        }
    }
}

impl Settings {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_secs_f64(self.crawl_delay_seconds.max(0.0))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base: BACKOFF_MIN,
            max_backoff: BACKOFF_MAX,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_requests.max(1)
    }

    pub fn require_user_agent(&self) -> anyhow::Result<&str> {
        self.user_agent
            .as_deref()
            .filter(|ua| !ua.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("SEC_USER_AGENT must be set (e.g. \"Acme Research ops@acme.example\")"))
    }
}

/// Keep the requested types the pipeline knows how to handle, warning about the rest.
pub fn supported_filing_types(requested: &[String]) -> Vec<String> {
    let mut kept = Vec::new();
    for t in requested {
        let normalized = t.trim().to_uppercase();
        if SUPPORTED_FILING_TYPES.contains(&normalized.as_str()) {
            if !kept.contains(&normalized) {
                kept.push(normalized);
            }
        } else {
            tracing::warn!(filing_type = %t, supported = ?SUPPORTED_FILING_TYPES, "Unsupported filing type dropped");
        }
    }
    kept
}
