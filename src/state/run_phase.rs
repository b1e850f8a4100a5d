/// Phase tracking for a single site run
///
/// A site run moves through
/// `Init → DiscoverCategories (optional) → Paginate ⇄ DispatchItems → Finalize`.
/// `Finalize` is reachable from every phase and is terminal.
use crate::ScrapeError;
use std::fmt;

/// Represents the current phase of a site run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Run created, nothing fetched yet
    Init,

    /// One-time sub-category discovery fetch
    DiscoverCategories,

    /// Fetching a listing page and reading its item links
    Paginate,

    /// Item pages are being processed by the worker pool
    DispatchItems,

    /// Batch writer flushed and run summarized
    Finalize,
}

impl RunPhase {
    /// Returns true if this is the terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalize)
    }

    /// Returns true if moving from `self` to `to` is allowed
    pub fn can_transition_to(&self, to: RunPhase) -> bool {
        use RunPhase::*;

        if to == Finalize {
            return !self.is_terminal();
        }

        matches!(
            (self, to),
            (Init, DiscoverCategories)
                | (Init, Paginate)
                | (Init, DispatchItems)
                | (DiscoverCategories, Paginate)
                | (Paginate, Paginate)
                | (Paginate, DispatchItems)
                | (DispatchItems, Paginate)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::DiscoverCategories => "discover_categories",
            Self::Paginate => "paginate",
            Self::DispatchItems => "dispatch_items",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase holder enforcing the allowed transitions
#[derive(Debug, Clone)]
pub struct SiteRunState {
    phase: RunPhase,
}

impl SiteRunState {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Init,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Moves to `to`, rejecting transitions the run order does not allow
    pub fn transition(&mut self, to: RunPhase) -> Result<(), ScrapeError> {
        if !self.phase.can_transition_to(to) {
            return Err(ScrapeError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::trace!("Run phase {} -> {}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Enters the terminal phase; repeated calls are no-ops
    pub fn finalize(&mut self) {
        self.phase = RunPhase::Finalize;
    }
}

impl Default for SiteRunState {
    fn default() -> Self {
        Self::new()
    }
}
