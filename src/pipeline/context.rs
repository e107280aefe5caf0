use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

/// Shared state for one run, handed to every task by `Arc`.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    seen_urls: Mutex<HashSet<String>>,
    attempted: AtomicUsize,
    stored: AtomicUsize,
    skipped: AtomicUsize,
    errored: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub attempted: usize,
    pub stored: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl RunContext {
    pub fn new(run_id: Uuid) -> Self {
        Self::with_seen(run_id, std::iter::empty())
    }

    /// Start with URLs already stored by earlier runs marked as seen.
    pub fn with_seen(run_id: Uuid, seen: impl IntoIterator<Item = String>) -> Self {
        Self {
            run_id,
            seen_urls: Mutex::new(seen.into_iter().collect()),
            attempted: AtomicUsize::new(0),
            stored: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            errored: AtomicUsize::new(0),
        }
    }

    /// Check-and-insert under one lock. Returns false if the URL was already
    /// claimed, so exactly one caller wins per URL.
    pub fn claim_url(&self, url: &str) -> bool {
        let mut seen = self.seen_urls.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(url.to_string())
    }

    pub fn seen_count(&self) -> usize {
        self.seen_urls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_errored(&self) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            attempted: self.attempted.load(Ordering::SeqCst),
            stored: self.stored.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            errored: self.errored.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn url_is_claimed_once() {
        let ctx = RunContext::with_seen(Uuid::now_v7(), ["https://www.sec.gov/a.htm".to_string()]);
        assert!(!ctx.claim_url("https://www.sec.gov/a.htm"));
        assert!(ctx.claim_url("https://www.sec.gov/b.htm"));
        assert!(!ctx.claim_url("https://www.sec.gov/b.htm"));
        assert_eq!(ctx.seen_count(), 2);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let ctx = Arc::new(RunContext::new(Uuid::now_v7()));
        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ctx = Arc::clone(&ctx);
                    s.spawn(move || ctx.claim_url("https://www.sec.gov/same.htm") as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn counters() {
        let ctx = RunContext::new(Uuid::now_v7());
        ctx.record_attempt();
        ctx.record_attempt();
        ctx.record_stored();
        ctx.record_skipped();
        ctx.record_errored();
        assert_eq!(
            ctx.snapshot(),
            CounterSnapshot { attempted: 2, stored: 1, skipped: 1, errored: 1 }
        );
    }
}
