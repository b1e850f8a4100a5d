//! Crawler module for listing traversal and item extraction
//!
//! This module contains the core crawling logic, including:
//! - Page retrieval behind the `PageSource` seam
//! - Listing parsing and pagination
//! - Item field extraction
//! - The bounded per-site worker pool
//! - Per-site run coordination

mod coordinator;
mod dispatch;
mod extractor;
mod fetcher;
mod manifest;
mod pagination;
mod parser;

pub use coordinator::{crawl_site, run_sites, SiteCrawler, SiteRunReport};
pub use dispatch::{ItemDispatcher, RecordTags};
pub use extractor::{FieldExtractor, PageContext, SelectorExtractor};
pub use fetcher::{build_http_client, HttpPageSource, PageSource};
pub use manifest::load_manifest;
pub use pagination::{build_categories, ListingCategory, PAGE_PLACEHOLDER};
pub use parser::{extract_item_links, normalize_text, parse_selector};

use crate::config::Config;
use crate::ConfigResult;

/// Crawls the requested sites
///
/// This is the main entry point for a crawl. For every site it will:
/// 1. Load the manifest or discover and paginate the listing categories
/// 2. Dispatch item pages to the site's worker pool
/// 3. Persist records in batch files
/// 4. Finalize the batch writer, whatever happened before
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `codes` - Site codes as given on the command line
///
/// # Returns
///
/// * `Ok(reports)` - One report per requested site, in request order
/// * `Err(ConfigError)` - A site code is not configured; nothing was crawled
pub async fn crawl(config: &Config, codes: &[String]) -> ConfigResult<Vec<SiteRunReport>> {
    run_sites(config, codes).await
}
