//! State module for tracking site run progress
//!
//! # Components
//!
//! - `RunPhase` / `SiteRunState`: the phase machine of one site run
//! - `ItemOutcome`: what happened to one item URL
//! - `SiteRunStats`: counters shared by the workers of a site

mod outcome;
mod run_phase;

// Re-export main types
pub use outcome::{
    truncate_reason, ItemOutcome, SiteRunCounts, SiteRunStats, SkipKind, MAX_REASON_CHARS,
};
pub use run_phase::{RunPhase, SiteRunState};
