//! Crawler coordinator - per-site crawl orchestration
//!
//! This module contains the crawl loop of one site and the orchestration of
//! several site runs, including:
//! - The optional one-time category discovery
//! - Paginating every category until an empty page, a 404 or the page ceiling
//! - Handing each page's item links to the bounded worker pool
//! - Finalizing the batch writer on every exit path
//! - Running sites concurrently without letting one failure reach another

use crate::config::{Config, DiscoveryConfig, ItemSource, Pagination, RunConfig, SiteConfig};
use crate::crawler::dispatch::{ItemDispatcher, RecordTags};
use crate::crawler::extractor::{FieldExtractor, SelectorExtractor};
use crate::crawler::fetcher::{HttpPageSource, PageSource};
use crate::crawler::manifest::load_manifest;
use crate::crawler::pagination::{build_categories, ListingCategory};
use crate::crawler::parser::extract_item_links;
use crate::state::{RunPhase, SiteRunCounts, SiteRunState, SiteRunStats};
use crate::storage::{open_batch_writer, BatchWriter};
use crate::{ConfigError, ConfigResult, ScrapeError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// What a site run did, returned whether or not it succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRunReport {
    pub code: String,
    pub name: String,
    pub phase: RunPhase,
    pub counts: SiteRunCounts,
    pub records_written: usize,
    pub batches_written: usize,
    /// Why the run stopped early, if it did
    pub error: Option<String>,
}

impl SiteRunReport {
    fn failed(site: &SiteConfig, phase: RunPhase, error: impl ToString) -> Self {
        Self {
            code: site.code.clone(),
            name: site.name.clone(),
            phase,
            counts: SiteRunCounts::default(),
            records_written: 0,
            batches_written: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Crawl driver for a single site
pub struct SiteCrawler {
    run: RunConfig,
    site: SiteConfig,
    source: Arc<dyn PageSource>,
    writer: Arc<BatchWriter>,
    stats: Arc<SiteRunStats>,
    dispatcher: ItemDispatcher,
    state: SiteRunState,
}

impl SiteCrawler {
    /// Creates a crawler using the HTTP page source and the config-driven
    /// field extractor
    ///
    /// # Returns
    ///
    /// * `Ok(SiteCrawler)` - Ready to run
    /// * `Err(ScrapeError)` - The HTTP client or a selector could not be built
    pub fn new(config: &Config, site: &SiteConfig) -> Result<Self, ScrapeError> {
        let source = Arc::new(HttpPageSource::new(&config.http)?);
        let extractor = Arc::new(SelectorExtractor::from_site(site)?);
        Ok(Self::with_collaborators(
            config.run.clone(),
            site.clone(),
            source,
            extractor,
        ))
    }

    /// Creates a crawler around explicit page source and extractor
    pub fn with_collaborators(
        run: RunConfig,
        site: SiteConfig,
        source: Arc<dyn PageSource>,
        extractor: Arc<dyn FieldExtractor>,
    ) -> Self {
        let writer = Arc::new(open_batch_writer(&run, &site));
        let stats = Arc::new(SiteRunStats::new());
        let tags = RecordTags {
            identity_field: run.identity_field.clone(),
            page_url_field: run.page_url_field.clone(),
            category_field: site.category_field.clone(),
        };
        let dispatcher = ItemDispatcher::new(
            Arc::clone(&source),
            extractor,
            Arc::clone(&writer),
            Arc::clone(&stats),
            tags,
            site.workers,
        );

        Self {
            run,
            site,
            source,
            writer,
            stats,
            dispatcher,
            state: SiteRunState::new(),
        }
    }

    /// Runs the site to completion
    ///
    /// The batch writer is finalized after the crawl whatever its outcome,
    /// except when the manifest of a manifest-driven site is unusable: that
    /// is a configuration failure and nothing is crawled.
    pub async fn run(mut self) -> SiteRunReport {
        tracing::info!(
            "Starting {} ({}) for period {}",
            self.site.name,
            self.site.code,
            self.run.period
        );

        let manifest_urls = match self.site.item_source() {
            ItemSource::Manifest(manifest) => match load_manifest(manifest) {
                Ok(urls) => Some(urls),
                Err(e) => {
                    tracing::error!("Configuration failure, not crawling: {}", e);
                    return SiteRunReport::failed(&self.site, self.state.phase(), e);
                }
            },
            ItemSource::Listing => None,
        };

        let outcome = self.crawl(manifest_urls).await;
        if let Err(e) = &outcome {
            tracing::error!("Run aborted in phase {}: {}", self.state.phase(), e);
        }

        self.state.finalize();
        let mut error = outcome.err().map(|e| e.to_string());
        let (records_written, batches_written) = match self.writer.finalize() {
            Ok(summary) => (summary.total_records, summary.batch_files.len()),
            Err(e) => {
                tracing::error!("Final flush failed: {}", e);
                error.get_or_insert_with(|| e.to_string());
                (self.writer.total_processed(), self.writer.batch_files().len())
            }
        };

        let counts = self.stats.snapshot();
        tracing::info!(
            "{}: {} pages, {} items dispatched, {} recorded, {} skipped",
            self.site.name,
            counts.pages_fetched,
            counts.items_dispatched,
            counts.items_recorded,
            counts.total_skipped()
        );

        SiteRunReport {
            code: self.site.code.clone(),
            name: self.site.name.clone(),
            phase: self.state.phase(),
            counts,
            records_written,
            batches_written,
            error,
        }
    }

    async fn crawl(&mut self, manifest_urls: Option<Vec<String>>) -> Result<(), ScrapeError> {
        if let Some(urls) = manifest_urls {
            let origin = self
                .site
                .manifest
                .as_ref()
                .map(|m| m.path.display().to_string())
                .unwrap_or_default();
            tracing::info!("Dispatching {} manifest URLs", urls.len());
            self.state.transition(RunPhase::DispatchItems)?;
            self.dispatcher.dispatch(urls, &origin, None).await?;
            return Ok(());
        }

        let discovered = match self.site.discovery.clone() {
            Some(discovery) => {
                self.state.transition(RunPhase::DiscoverCategories)?;
                self.discover_categories(&discovery).await?
            }
            None => Vec::new(),
        };

        let categories = build_categories(&self.site, discovered);
        tracing::info!("Crawling {} categories", categories.len());

        for category in &categories {
            self.paginate(category).await?;
        }
        Ok(())
    }

    /// One-time fetch of the sub-category URLs
    async fn discover_categories(
        &self,
        discovery: &DiscoveryConfig,
    ) -> Result<Vec<String>, ScrapeError> {
        let html = self
            .source
            .fetch(&discovery.url)
            .await
            .map_err(|e| ScrapeError::Discovery {
                url: discovery.url.clone(),
                message: e.to_string(),
            })?;

        let urls = extract_item_links(
            &html,
            &discovery.url,
            &discovery.selector,
            &discovery.exclude_patterns,
        )
        .map_err(|e| ScrapeError::Discovery {
            url: discovery.url.clone(),
            message: e.to_string(),
        })?;

        if urls.is_empty() {
            tracing::warn!("Discovery page {} listed no categories", discovery.url);
        } else {
            tracing::info!("Discovered {} categories", urls.len());
        }
        Ok(urls)
    }

    /// Walks the listing pages of one category
    async fn paginate(&mut self, category: &ListingCategory) -> Result<(), ScrapeError> {
        let selector = self.site.item_link_selector.clone().ok_or_else(|| {
            ConfigError::Validation(format!(
                "Site '{}' has no item-link-selector",
                self.site.code
            ))
        })?;
        let label = category.name.as_deref().unwrap_or(&category.base_url);
        let delay = Duration::from_millis(self.site.listing_delay_ms);

        for page in 1..=self.site.max_pages {
            self.state.transition(RunPhase::Paginate)?;
            let url = category.page_url(&self.site.pagination, page);

            if !delay.is_zero() && self.stats.snapshot().pages_fetched > 0 {
                tokio::time::sleep(delay).await;
            }

            let html = match self.source.fetch(&url).await {
                Ok(html) => html,
                Err(e) if e.is_not_found() => {
                    tracing::info!("{}: page {} not found, end of listing", label, page);
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            self.stats.page_fetched();

            let links =
                extract_item_links(&html, &url, &selector, &self.site.exclude_link_patterns)?;
            if links.is_empty() {
                tracing::info!("{}: no items on page {}, end of listing", label, page);
                break;
            }

            tracing::info!("{}: page {} -> {} items", label, page, links.len());
            self.state.transition(RunPhase::DispatchItems)?;
            self.dispatcher
                .dispatch(links, &url, category.name.as_deref())
                .await?;

            if self.site.pagination == Pagination::Single {
                break;
            }
            if page == self.site.max_pages {
                tracing::warn!(
                    "{}: stopped at page ceiling {}",
                    label,
                    self.site.max_pages
                );
            }
        }
        Ok(())
    }
}

/// Runs one site, turning setup failures into a report
pub async fn crawl_site(config: &Config, site: &SiteConfig) -> SiteRunReport {
    match SiteCrawler::new(config, site) {
        Ok(crawler) => crawler.run().await,
        Err(e) => {
            tracing::error!("Failed to set up {}: {}", site.name, e);
            SiteRunReport::failed(site, RunPhase::Init, e)
        }
    }
}

/// Runs the requested sites, at most `max-parallel-sites` at a time
///
/// Unknown codes reject the whole request before any site starts. Each site
/// runs inside a `site` span so its events reach its own log file. Reports
/// come back in request order.
pub async fn run_sites(config: &Config, codes: &[String]) -> ConfigResult<Vec<SiteRunReport>> {
    let sites: Vec<SiteConfig> = config.resolve_sites(codes)?.into_iter().cloned().collect();
    let shared = Arc::new(config.clone());
    let limit = Arc::new(Semaphore::new(config.run.max_parallel_sites.max(1)));

    let mut tasks = JoinSet::new();
    for (index, site) in sites.iter().cloned().enumerate() {
        let config = Arc::clone(&shared);
        let limit = Arc::clone(&limit);
        let span = tracing::info_span!("site", site = %site.name);

        tasks.spawn(
            async move {
                let _permit = limit.acquire_owned().await.ok();
                (index, crawl_site(&config, &site).await)
            }
            .instrument(span),
        );
    }

    let mut reports: Vec<Option<SiteRunReport>> = vec![None; sites.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => reports[index] = Some(report),
            Err(e) => tracing::error!("Site task failed: {}", e),
        }
    }

    Ok(reports
        .into_iter()
        .zip(&sites)
        .map(|(report, site)| {
            report.unwrap_or_else(|| SiteRunReport::failed(site, RunPhase::Init, "site task failed"))
        })
        .collect())
}
