//! Output module for consolidation and reports
//!
//! This module handles:
//! - Merging batch files into one deduplicated file per site
//! - The console tables printed after a crawl or consolidation
//! - The markdown run summary

mod consolidate;
mod markdown;
mod report;
mod summary;

pub use consolidate::{
    consolidate_site, consolidate_sites, list_batch_files, merge_batches, ConsolidateError,
    MergedBatches, CONSOLIDATED_MARKER,
};
pub use markdown::{format_markdown_summary, generate_markdown_summary, RunSummary};
pub use report::{format_crawl_reports, format_report, print_report};
pub use summary::{ConsolidationSummary, DuplicateCount};

use crate::config::Config;
use crate::ScrapeError;

/// Consolidates the requested sites, or every configured site when `codes`
/// is empty
///
/// # Returns
///
/// * `Ok(summaries)` - One row per site that had batch files, in request order
/// * `Err(ScrapeError)` - A site code is not configured; nothing was touched
pub fn consolidate(config: &Config, codes: &[String]) -> Result<Vec<ConsolidationSummary>, ScrapeError> {
    let names: Vec<String> = if codes.is_empty() {
        config.sites.iter().map(|s| s.name.clone()).collect()
    } else {
        config
            .resolve_sites(codes)?
            .into_iter()
            .map(|s| s.name.clone())
            .collect()
    };

    Ok(consolidate_sites(&config.run, &names))
}
