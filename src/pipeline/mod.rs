pub mod context;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context as _;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::enrich::Enricher;
use crate::error::{EnrichError, ErrorEvent, ErrorKind};
use crate::export::JsonlWriter;
use crate::fetcher::{CrawlItem, CrawlStream};
use crate::model::EnrichedDocument;
use crate::parser::Extractor;
use context::{CounterSnapshot, RunContext};

/// Result of handing a document to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    /// Same content hash or URL already stored; nothing written.
    Duplicate,
}

/// Persistence for documents, error events and run bookkeeping.
///
/// `write_document` failures are per-document. Failures of the other methods
/// are run-level and abort the run.
pub trait DocumentSink {
    fn write_document(&mut self, run_id: Uuid, doc: &EnrichedDocument) -> anyhow::Result<WriteOutcome>;
    fn record_error(&mut self, run_id: Uuid, event: &ErrorEvent) -> anyhow::Result<()>;
    fn record_progress(&mut self, run_id: Uuid, counters: &CounterSnapshot) -> anyhow::Result<()>;
    fn finish_run(
        &mut self,
        run_id: Uuid,
        status: RunStatus,
        counters: &CounterSnapshot,
        error_summary: Option<&str>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Partial,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal status for a run that finished its loop.
    pub fn determine(counters: &CounterSnapshot, cancelled: bool) -> Self {
        if cancelled {
            RunStatus::Cancelled
        } else if counters.errored == 0 {
            RunStatus::Completed
        } else if counters.stored > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub counters: CounterSnapshot,
    pub error_summary: Option<String>,
}

// ── Pipeline ──

/// Drives crawled documents through extract → enrich → store.
pub struct Pipeline {
    extractor: Arc<Extractor>,
    enricher: Arc<Enricher>,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(extractor: Extractor, enricher: Enricher) -> Self {
        Self {
            extractor: Arc::new(extractor),
            enricher: Arc::new(enricher),
            progress: ProgressBar::hidden(),
        }
    }

    /// Live spinner with saved/skipped/errored counts.
    pub fn with_spinner(mut self) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} documents ({per_sec}) {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        self.progress = pb;
        self
    }

    /// Consume the stream until it ends or `cancel` resolves, then record the
    /// terminal status. Only a failure to record that status is returned as
    /// an error; a fatal bookkeeping failure mid-run ends as `Failed`.
    pub async fn run<K, C>(
        &self,
        ctx: &RunContext,
        mut stream: CrawlStream,
        sink: &mut K,
        mut export: Option<&mut JsonlWriter>,
        cancel: C,
    ) -> anyhow::Result<RunOutcome>
    where
        K: DocumentSink,
        C: Future<Output = ()>,
    {
        let result = self.process(ctx, &mut stream, sink, export.as_deref_mut(), cancel).await;
        // Abandon whatever is still in flight before recording the outcome.
        drop(stream);
        self.progress.finish_and_clear();

        let counters = ctx.snapshot();
        let (status, error_summary) = match result {
            Ok(cancelled) => (RunStatus::determine(&counters, cancelled), None),
            Err(e) => {
                error!(run_id = %ctx.run_id, "Run aborted: {:#}", e);
                (RunStatus::Failed, Some(format!("{e:#}")))
            }
        };
        sink.finish_run(ctx.run_id, status, &counters, error_summary.as_deref())
            .context("failed to record run outcome")?;

        info!(
            run_id = %ctx.run_id,
            status = status.as_str(),
            attempted = counters.attempted,
            saved = counters.stored,
            skipped = counters.skipped,
            errored = counters.errored,
            "Run finished"
        );
        Ok(RunOutcome {
            status,
            counters,
            error_summary,
        })
    }

    /// Returns whether the run was cancelled.
    async fn process<K, C>(
        &self,
        ctx: &RunContext,
        stream: &mut CrawlStream,
        sink: &mut K,
        mut export: Option<&mut JsonlWriter>,
        cancel: C,
    ) -> anyhow::Result<bool>
    where
        K: DocumentSink,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        loop {
            let item = tokio::select! {
                biased;
                _ = &mut cancel => {
                    warn!(run_id = %ctx.run_id, "Run cancelled, abandoning in-flight fetches");
                    return Ok(true);
                }
                item = stream.next() => match item {
                    Some(item) => item,
                    None => return Ok(false),
                },
            };

            ctx.record_attempt();
            self.handle(ctx, item, sink, export.as_deref_mut()).await?;

            let counters = ctx.snapshot();
            sink.record_progress(ctx.run_id, &counters)
                .context("failed to update run counters")?;
            self.progress.set_message(format!(
                "saved {} | skipped {} | errored {}",
                counters.stored, counters.skipped, counters.errored
            ));
            self.progress.inc(1);
        }
    }

    /// One document, start to finish. Document-level failures are recorded
    /// and swallowed; only sink bookkeeping errors propagate.
    async fn handle<K: DocumentSink>(
        &self,
        ctx: &RunContext,
        item: CrawlItem,
        sink: &mut K,
        export: Option<&mut JsonlWriter>,
    ) -> anyhow::Result<()> {
        let raw = match item {
            Ok(raw) => raw,
            Err(failure) => {
                let event = ErrorEvent::new(&failure.url, failure.error.kind(), failure.error.to_string())
                    .with_status(failure.error.status());
                return report(ctx, sink, event);
            }
        };
        let url = raw.provenance.url.clone();
        let status = raw.provenance.http_status;

        let extractor = Arc::clone(&self.extractor);
        let extracted = match tokio::task::spawn_blocking(move || extractor.extract(raw)).await {
            Ok(Ok(doc)) => doc,
            Ok(Err(e)) => {
                let kind = if e.is_skip() {
                    ErrorKind::EmptyContent
                } else {
                    ErrorKind::ParseError
                };
                let event = ErrorEvent::new(&url, kind, e.to_string()).with_status(Some(status));
                return report(ctx, sink, event);
            }
            Err(join) => {
                error!(url = %url, "Extraction failed: {}", join);
                let event = ErrorEvent::new(&url, ErrorKind::ParseError, "extraction failed")
                    .with_status(Some(status))
                    .with_detail(panic_message(join));
                return report(ctx, sink, event);
            }
        };

        let enricher = Arc::clone(&self.enricher);
        let doc = match tokio::task::spawn_blocking(move || enricher.enrich(extracted)).await {
            Ok(Ok(doc)) => doc,
            Ok(Err(e @ EnrichError::BelowMinimumWords { .. })) => {
                let event = ErrorEvent::new(&url, ErrorKind::BelowMinLength, e.to_string());
                return report(ctx, sink, event);
            }
            Err(join) => {
                error!(url = %url, "Enrichment failed: {}", join);
                let event = ErrorEvent::new(&url, ErrorKind::TransformError, "enrichment failed")
                    .with_detail(panic_message(join));
                return report(ctx, sink, event);
            }
        };

        match sink.write_document(ctx.run_id, &doc) {
            Ok(WriteOutcome::Stored) => {
                ctx.record_stored();
                info!(
                    url = %url,
                    title = %doc.title,
                    words = doc.word_count,
                    sections = doc.sections.len(),
                    quality = doc.quality.score,
                    "Stored document"
                );
                if let Some(out) = export {
                    out.write(&doc).context("failed to export document")?;
                }
            }
            Ok(WriteOutcome::Duplicate) => {
                ctx.record_skipped();
                info!(url = %url, hash = %doc.content_hash, "Duplicate content, skipping");
            }
            Err(e) => {
                error!(url = %url, "Write failed: {:#}", e);
                let event = ErrorEvent::new(&url, ErrorKind::WriteError, format!("{e:#}"));
                ctx.record_errored();
                sink.record_error(ctx.run_id, &event)
                    .context("failed to record error event")?;
            }
        }
        Ok(())
    }
}

/// Count the event as a skip or an error and hand it to the sink.
fn report<K: DocumentSink>(ctx: &RunContext, sink: &mut K, event: ErrorEvent) -> anyhow::Result<()> {
    if event.kind.is_skip() {
        ctx.record_skipped();
    } else {
        ctx.record_errored();
    }
    sink.record_error(ctx.run_id, &event)
        .context("failed to record error event")
}

/// Panic payload text from a failed blocking task.
pub fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::enrich::language::{Detection, FixedLanguage};
    use crate::fetcher::tests::{fast_policy, request, FakeSource};
    use crate::fetcher::Crawler;

    const LATEST_10K: &str =
        "https://www.sec.gov/Archives/edgar/data/320193/000032019323000106/aapl-20230930.htm";
    const PRIOR_10K: &str =
        "https://www.sec.gov/Archives/edgar/data/320193/000032019322000108/aapl-20220924.htm";

    #[derive(Default)]
    struct MemorySink {
        hashes: HashSet<String>,
        stored: Vec<EnrichedDocument>,
        errors: Vec<ErrorEvent>,
        progress_updates: usize,
        finished: Option<(RunStatus, CounterSnapshot, Option<String>)>,
        fail_writes: bool,
        fail_progress: bool,
    }

    impl DocumentSink for MemorySink {
        fn write_document(&mut self, _: Uuid, doc: &EnrichedDocument) -> anyhow::Result<WriteOutcome> {
            if self.fail_writes {
                anyhow::bail!("disk full");
            }
            if !self.hashes.insert(doc.content_hash.clone()) {
                return Ok(WriteOutcome::Duplicate);
            }
            self.stored.push(doc.clone());
            Ok(WriteOutcome::Stored)
        }

        fn record_error(&mut self, _: Uuid, event: &ErrorEvent) -> anyhow::Result<()> {
            self.errors.push(event.clone());
            Ok(())
        }

        fn record_progress(&mut self, _: Uuid, _: &CounterSnapshot) -> anyhow::Result<()> {
            if self.fail_progress {
                anyhow::bail!("database is locked");
            }
            self.progress_updates += 1;
            Ok(())
        }

        fn finish_run(
            &mut self,
            _: Uuid,
            status: RunStatus,
            counters: &CounterSnapshot,
            error_summary: Option<&str>,
        ) -> anyhow::Result<()> {
            self.finished = Some((status, *counters, error_summary.map(str::to_string)));
            Ok(())
        }
    }

    fn pipeline(min_words: usize) -> Pipeline {
        let english = FixedLanguage(Detection {
            language: "en".into(),
            confidence: 0.99,
        });
        Pipeline::new(Extractor::sec().unwrap(), Enricher::new(Box::new(english), min_words))
    }

    fn apple_10k() -> Vec<u8> {
        std::fs::read("tests/fixtures/apple_10k.html").unwrap()
    }

    async fn run_with(
        source: FakeSource,
        types: &[&str],
        sink: &mut MemorySink,
        min_words: usize,
    ) -> RunOutcome {
        let ctx = Arc::new(RunContext::new(Uuid::now_v7()));
        let crawler = Crawler::with_limits(Arc::new(source), Arc::clone(&ctx), 5, fast_policy(), Duration::ZERO);
        let stream = crawler.crawl(request(&["AAPL"], types, 10));
        pipeline(min_words)
            .run(&ctx, stream, sink, None, std::future::pending())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stores_filings_and_skips_stubs() {
        let mut source = FakeSource::new();
        source.pages.insert(LATEST_10K.to_string(), apple_10k());
        let mut sink = MemorySink::default();
        let outcome = run_with(source, &["10-K", "10-Q", "8-K"], &mut sink, 50).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(
            outcome.counters,
            CounterSnapshot { attempted: 6, stored: 1, skipped: 5, errored: 0 }
        );
        assert_eq!(sink.stored.len(), 1);
        assert_eq!(sink.stored[0].provenance.url, LATEST_10K);
        assert_eq!(sink.stored[0].provenance.filing.accession_number, "0000320193-23-000106");
        assert!(sink.errors.iter().all(|e| e.kind == ErrorKind::EmptyContent));
        assert_eq!(sink.progress_updates, 6);
        assert_eq!(sink.finished.as_ref().map(|f| f.0), Some(RunStatus::Completed));
    }

    #[tokio::test]
    async fn identical_content_is_stored_once() {
        let mut source = FakeSource::new();
        source.pages.insert(LATEST_10K.to_string(), apple_10k());
        source.pages.insert(PRIOR_10K.to_string(), apple_10k());
        let mut sink = MemorySink::default();
        let outcome = run_with(source, &["10-K"], &mut sink, 50).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.counters.stored, 1);
        assert_eq!(outcome.counters.skipped, 1);
        assert!(sink.errors.is_empty());
    }

    #[tokio::test]
    async fn http_failure_makes_run_partial() {
        let mut source = FakeSource::new();
        source.pages.insert(LATEST_10K.to_string(), apple_10k());
        source.statuses.insert(PRIOR_10K.to_string(), 404);
        let mut sink = MemorySink::default();
        let outcome = run_with(source, &["10-K"], &mut sink, 50).await;

        assert_eq!(outcome.status, RunStatus::Partial);
        assert_eq!(outcome.counters.errored, 1);
        assert_eq!(sink.errors.len(), 1);
        assert_eq!(sink.errors[0].kind, ErrorKind::HttpError);
        assert_eq!(sink.errors[0].http_status, Some(404));
        assert_eq!(sink.errors[0].url, PRIOR_10K);
    }

    #[tokio::test]
    async fn nothing_stored_with_errors_is_failed() {
        let mut source = FakeSource::new();
        source.statuses.insert(LATEST_10K.to_string(), 404);
        source.statuses.insert(PRIOR_10K.to_string(), 410);
        let mut sink = MemorySink::default();
        let outcome = run_with(source, &["10-K"], &mut sink, 50).await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.error_summary, None);
    }

    #[tokio::test]
    async fn short_documents_are_skipped_not_errors() {
        let mut source = FakeSource::new();
        source.pages.insert(LATEST_10K.to_string(), apple_10k());
        let mut sink = MemorySink::default();
        let outcome = run_with(source, &["10-K"], &mut sink, 100_000).await;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.counters.stored, 0);
        assert_eq!(outcome.counters.skipped, 2);
        let kinds: Vec<_> = sink.errors.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ErrorKind::BelowMinLength));
        assert!(kinds.contains(&ErrorKind::EmptyContent));
    }

    #[tokio::test]
    async fn write_failures_are_counted_and_the_run_continues() {
        let mut source = FakeSource::new();
        source.pages.insert(LATEST_10K.to_string(), apple_10k());
        let mut sink = MemorySink {
            fail_writes: true,
            ..MemorySink::default()
        };
        let outcome = run_with(source, &["10-K"], &mut sink, 50).await;

        assert_eq!(outcome.counters.attempted, 2);
        assert_eq!(outcome.counters.errored, 1);
        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(sink.errors.iter().any(|e| e.kind == ErrorKind::WriteError && e.message.contains("disk full")));
    }

    #[tokio::test]
    async fn bookkeeping_failure_aborts_the_run() {
        let mut sink = MemorySink {
            fail_progress: true,
            ..MemorySink::default()
        };
        let outcome = run_with(FakeSource::new(), &["10-K"], &mut sink, 50).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.counters.attempted, 1);
        let summary = outcome.error_summary.unwrap();
        assert!(summary.contains("database is locked"), "{summary}");
        assert_eq!(sink.finished.map(|f| f.0), Some(RunStatus::Failed));
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_documents() {
        let ctx = Arc::new(RunContext::new(Uuid::now_v7()));
        let crawler = Crawler::with_limits(
            Arc::new(FakeSource::new()),
            Arc::clone(&ctx),
            5,
            fast_policy(),
            Duration::ZERO,
        );
        let stream = crawler.crawl(request(&["AAPL"], &["10-K"], 10));
        let mut sink = MemorySink::default();
        let outcome = pipeline(50)
            .run(&ctx, stream, &mut sink, None, std::future::ready(()))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(sink.stored.is_empty());
    }

    #[tokio::test]
    async fn exported_records_match_stored_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("docs.jsonl");
        let mut writer = JsonlWriter::append(&path).unwrap();

        let mut source = FakeSource::new();
        source.pages.insert(LATEST_10K.to_string(), apple_10k());
        let ctx = Arc::new(RunContext::new(Uuid::now_v7()));
        let crawler = Crawler::with_limits(Arc::new(source), Arc::clone(&ctx), 5, fast_policy(), Duration::ZERO);
        let stream = crawler.crawl(request(&["AAPL"], &["10-K"], 10));
        let mut sink = MemorySink::default();
        pipeline(50)
            .run(&ctx, stream, &mut sink, Some(&mut writer), std::future::pending())
            .await
            .unwrap();
        drop(writer);

        let lines: Vec<serde_json::Value> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["url"], LATEST_10K);
        assert_eq!(lines[0]["content_hash"], sink.stored[0].content_hash.as_str());
    }

    #[test]
    fn status_rules() {
        let c = |stored, errored| CounterSnapshot {
            attempted: 3,
            stored,
            skipped: 0,
            errored,
        };
        assert_eq!(RunStatus::determine(&c(2, 0), false), RunStatus::Completed);
        assert_eq!(RunStatus::determine(&c(0, 0), false), RunStatus::Completed);
        assert_eq!(RunStatus::determine(&c(1, 2), false), RunStatus::Partial);
        assert_eq!(RunStatus::determine(&c(0, 3), false), RunStatus::Failed);
        assert_eq!(RunStatus::determine(&c(2, 0), true), RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn panic_payload_becomes_detail() {
        let err = tokio::task::spawn_blocking(|| panic!("unbalanced tree"))
            .await
            .unwrap_err();
        assert_eq!(panic_message(err), "unbalanced tree");
    }
}
