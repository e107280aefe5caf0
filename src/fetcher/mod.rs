pub mod edgar;
pub mod filings;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::FetchError;
use crate::model::{Company, Filing, Provenance, RawDocument};
use crate::pipeline::context::RunContext;
use filings::{FilingQuery, Submissions};
use retry::{with_retry, RetryPolicy};

/// Where filings come from. `EdgarClient` talks HTTP; tests use an
/// in-process fake.
#[async_trait]
pub trait FilingSource: Send + Sync + 'static {
    /// Padded CIK for a ticker, `None` when the ticker is unknown.
    async fn lookup_ticker(&self, ticker: &str) -> Result<Option<String>, FetchError>;
    async fn submissions(&self, cik: &str) -> Result<Submissions, FetchError>;
    async fn fetch_document(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A document (or entity) that could not be fetched. For entity failures
/// `url` holds the identifier.
#[derive(Debug)]
pub struct FetchFailure {
    pub url: String,
    pub error: FetchError,
}

pub type CrawlItem = Result<RawDocument, FetchFailure>;

#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Tickers or CIKs.
    pub identifiers: Vec<String>,
    pub query: FilingQuery,
}

// ── Crawler ──

pub struct Crawler<S> {
    source: Arc<S>,
    ctx: Arc<RunContext>,
    limiter: Arc<Semaphore>,
    concurrency: usize,
    policy: RetryPolicy,
    delay: Duration,
}

impl<S> Clone for Crawler<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            ctx: Arc::clone(&self.ctx),
            limiter: Arc::clone(&self.limiter),
            concurrency: self.concurrency,
            policy: self.policy,
            delay: self.delay,
        }
    }
}

impl<S: FilingSource> Crawler<S> {
    pub fn new(source: Arc<S>, ctx: Arc<RunContext>, settings: &Settings) -> Self {
        Self::with_limits(
            source,
            ctx,
            settings.concurrency(),
            settings.retry_policy(),
            settings.crawl_delay(),
        )
    }

    pub fn with_limits(
        source: Arc<S>,
        ctx: Arc<RunContext>,
        concurrency: usize,
        policy: RetryPolicy,
        delay: Duration,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            source,
            ctx,
            limiter: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            policy,
            delay,
        }
    }

    /// Start crawling in the background. Documents arrive in completion
    /// order; dropping the stream abandons everything still in flight.
    pub fn crawl(&self, request: CrawlRequest) -> CrawlStream {
        let (tx, rx) = mpsc::channel(self.concurrency * 2);
        let crawler = self.clone();
        let producer = tokio::spawn(async move { crawler.produce(request, tx).await });
        CrawlStream { rx, producer }
    }

    async fn produce(self, request: CrawlRequest, tx: mpsc::Sender<CrawlItem>) {
        let mut tasks = JoinSet::new();

        // Entities resolve one at a time; their documents fetch concurrently.
        for identifier in &request.identifiers {
            let (company, filings) = match self.resolve_entity(identifier, &request.query).await {
                Ok(found) => found,
                Err(error) => {
                    error!(identifier = %identifier, "Entity failed: {}", error);
                    let failure = FetchFailure {
                        url: identifier.clone(),
                        error,
                    };
                    if tx.send(Err(failure)).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

            for filing in filings {
                if !filings::is_valid_document_url(&filing.url) {
                    debug!(url = %filing.url, "Invalid document URL, skipping");
                    continue;
                }
                if !self.ctx.claim_url(&filing.url) {
                    debug!(url = %filing.url, "Already seen, skipping");
                    self.ctx.record_attempt();
                    self.ctx.record_skipped();
                    continue;
                }
                let crawler = self.clone();
                let company = Arc::clone(&company);
                let tx = tx.clone();
                tasks.spawn(async move {
                    let item = crawler.fetch_filing(company, filing).await;
                    let _ = tx.send(item).await;
                });
            }
        }

        drop(tx);
        while tasks.join_next().await.is_some() {}
    }

    async fn resolve_entity(
        &self,
        identifier: &str,
        query: &FilingQuery,
    ) -> Result<(Arc<Company>, Vec<Filing>), FetchError> {
        let cik = self.resolve_cik(identifier).await?;
        let submissions = with_retry(&self.policy, &self.limiter, self.delay, &cik, || {
            self.source.submissions(&cik)
        })
        .await?;

        let company = Arc::new(submissions.company(&cik));
        let recent = &submissions.filings.recent;
        let selected = filings::select_filings(&cik, recent, query);
        info!(
            cik = %cik,
            company = %company.name,
            listed = recent.form.len(),
            selected = selected.len(),
            "Resolved entity"
        );

        if selected.is_empty() {
            let foreign = filings::foreign_issuer_forms(recent);
            if !foreign.is_empty() {
                warn!(
                    company = %company.name,
                    "No matching filings; this entity files {:?}, try --filing-types {}",
                    foreign,
                    foreign.join(" ")
                );
            }
        }
        Ok((company, selected))
    }

    async fn resolve_cik(&self, identifier: &str) -> Result<String, FetchError> {
        if let Some(cik) = filings::numeric_cik(identifier) {
            return Ok(cik);
        }
        let found = with_retry(&self.policy, &self.limiter, self.delay, identifier, || {
            self.source.lookup_ticker(identifier)
        })
        .await?;
        found.ok_or_else(|| FetchError::NotFound {
            identifier: identifier.to_string(),
        })
    }

    async fn fetch_filing(&self, company: Arc<Company>, filing: Filing) -> CrawlItem {
        let url = filing.url.clone();
        let result = with_retry(&self.policy, &self.limiter, self.delay, &url, || {
            self.source.fetch_document(&url)
        })
        .await;

        match result {
            Ok(page) => {
                info!(url = %url, status = page.status, bytes = page.body.len(), "Fetched document");
                Ok(RawDocument {
                    provenance: Provenance {
                        company,
                        filing,
                        url,
                        http_status: page.status,
                        fetched_at: Utc::now(),
                        last_modified: page.last_modified,
                    },
                    body: page.body,
                })
            }
            Err(error) => {
                error!(url = %url, "Fetch failed: {}", error);
                Err(FetchFailure { url, error })
            }
        }
    }
}

/// Receiving end of a crawl.
pub struct CrawlStream {
    rx: mpsc::Receiver<CrawlItem>,
    producer: JoinHandle<()>,
}

impl CrawlStream {
    pub async fn next(&mut self) -> Option<CrawlItem> {
        self.rx.recv().await
    }
}

impl Drop for CrawlStream {
    fn drop(&mut self) {
        // Aborting the producer drops its JoinSet, which aborts the fetches.
        self.producer.abort();
    }
}
