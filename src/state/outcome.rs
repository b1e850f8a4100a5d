//! Per-item outcomes and per-site counters
//!
//! Workers report what happened to each item as a value instead of raising;
//! the counters aggregate those outcomes without touching sibling tasks.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Longest skip reason kept, in characters
pub const MAX_REASON_CHARS: usize = 100;

/// Why an item was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipKind {
    /// The item page could not be retrieved (timeout, HTTP error, network)
    Fetch,
    /// The page was retrieved but extraction failed
    Extract,
    /// The worker task itself failed
    Task,
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Task => "task",
        })
    }
}

/// Result of processing one item URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A record was handed to the batch writer
    Recorded { url: String },
    /// No record was produced
    Skipped {
        url: String,
        kind: SkipKind,
        reason: String,
    },
}

impl ItemOutcome {
    /// Builds a skip outcome with a truncated reason
    pub fn skipped(url: impl Into<String>, kind: SkipKind, reason: impl fmt::Display) -> Self {
        Self::Skipped {
            url: url.into(),
            kind,
            reason: truncate_reason(&reason.to_string()),
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

/// Cuts a message to [`MAX_REASON_CHARS`] characters
pub fn truncate_reason(message: &str) -> String {
    match message.char_indices().nth(MAX_REASON_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Counters shared by the workers of one site run
#[derive(Debug, Default)]
pub struct SiteRunStats {
    pages_fetched: AtomicUsize,
    items_dispatched: AtomicUsize,
    items_recorded: AtomicUsize,
    skipped_fetch: AtomicUsize,
    skipped_extract: AtomicUsize,
    skipped_task: AtomicUsize,
}

impl SiteRunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn items_dispatched(&self, count: usize) {
        self.items_dispatched.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts one finished item
    pub fn record_outcome(&self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Recorded { .. } => {
                self.items_recorded.fetch_add(1, Ordering::Relaxed);
            }
            ItemOutcome::Skipped { kind, .. } => self.record_skip(*kind),
        }
    }

    pub fn record_skip(&self, kind: SkipKind) {
        let counter = match kind {
            SkipKind::Fetch => &self.skipped_fetch,
            SkipKind::Extract => &self.skipped_extract,
            SkipKind::Task => &self.skipped_task,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SiteRunCounts {
        SiteRunCounts {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            items_dispatched: self.items_dispatched.load(Ordering::Relaxed),
            items_recorded: self.items_recorded.load(Ordering::Relaxed),
            skipped_fetch: self.skipped_fetch.load(Ordering::Relaxed),
            skipped_extract: self.skipped_extract.load(Ordering::Relaxed),
            skipped_task: self.skipped_task.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SiteRunStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteRunCounts {
    pub pages_fetched: usize,
    pub items_dispatched: usize,
    pub items_recorded: usize,
    pub skipped_fetch: usize,
    pub skipped_extract: usize,
    pub skipped_task: usize,
}

impl SiteRunCounts {
    pub fn total_skipped(&self) -> usize {
        self.skipped_fetch + self.skipped_extract + self.skipped_task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_reason() {
        let long = "x".repeat(250);
        assert_eq!(truncate_reason(&long).chars().count(), MAX_REASON_CHARS);
        assert_eq!(truncate_reason("short"), "short");
    }

    #[test]
    fn test_truncate_reason_multibyte() {
        let long = "é".repeat(150);
        let cut = truncate_reason(&long);
        assert_eq!(cut.chars().count(), MAX_REASON_CHARS);
    }

    #[test]
    fn test_skipped_outcome() {
        let outcome = ItemOutcome::skipped("https://a.example/1", SkipKind::Fetch, "timeout");
        assert!(!outcome.is_recorded());
        match outcome {
            ItemOutcome::Skipped { url, kind, reason } => {
                assert_eq!(url, "https://a.example/1");
                assert_eq!(kind, SkipKind::Fetch);
                assert_eq!(reason, "timeout");
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_stats_aggregate_outcomes() {
        let stats = SiteRunStats::new();
        stats.page_fetched();
        stats.items_dispatched(3);
        stats.record_outcome(&ItemOutcome::Recorded {
            url: "a".to_string(),
        });
        stats.record_outcome(&ItemOutcome::skipped("b", SkipKind::Extract, "missing"));
        stats.record_skip(SkipKind::Task);

        let counts = stats.snapshot();
        assert_eq!(counts.pages_fetched, 1);
        assert_eq!(counts.items_dispatched, 3);
        assert_eq!(counts.items_recorded, 1);
        assert_eq!(counts.total_skipped(), 2);
    }
}
