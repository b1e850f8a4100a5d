//! Bounded item worker pool
//!
//! The item URLs of one listing page are processed concurrently by at most
//! `workers` tasks. Each task fetches its page, extracts a record and hands it
//! to the site's shared `BatchWriter`. A failing item never affects its
//! siblings; it is reported as a skipped outcome.

use crate::crawler::extractor::{FieldExtractor, PageContext};
use crate::crawler::fetcher::PageSource;
use crate::state::{ItemOutcome, SiteRunStats, SkipKind};
use crate::storage::{BatchError, BatchWriter, ItemRecord};
use crate::ScrapeError;
use scraper::Html;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Columns the driver fills in on every record
#[derive(Debug, Clone)]
pub struct RecordTags {
    pub identity_field: String,
    pub page_url_field: String,
    pub category_field: Option<String>,
}

impl RecordTags {
    /// Puts the driver columns first, followed by the extracted ones
    ///
    /// Extracted columns sharing a name with a driver column are dropped.
    pub fn apply(&self, extracted: ItemRecord, page: &PageContext) -> ItemRecord {
        let mut record = ItemRecord::new()
            .with_field(self.page_url_field.clone(), page.page_url.clone())
            .with_field(self.identity_field.clone(), page.item_url.clone());

        if let Some(field) = &self.category_field {
            record.insert(field.clone(), page.category.clone().unwrap_or_default());
        }

        for (column, value) in extracted.iter() {
            if !record.contains(column) {
                record.insert(column, value);
            }
        }
        record
    }
}

/// Shared pieces every item task needs
struct ItemContext {
    source: Arc<dyn PageSource>,
    extractor: Arc<dyn FieldExtractor>,
    writer: Arc<BatchWriter>,
    tags: RecordTags,
}

/// Runs item tasks for one site with a fixed concurrency bound
pub struct ItemDispatcher {
    context: Arc<ItemContext>,
    stats: Arc<SiteRunStats>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl ItemDispatcher {
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: Arc<dyn FieldExtractor>,
        writer: Arc<BatchWriter>,
        stats: Arc<SiteRunStats>,
        tags: RecordTags,
        workers: usize,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            context: Arc::new(ItemContext {
                source,
                extractor,
                writer,
                tags,
            }),
            stats,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Processes `urls` and waits for every task to finish
    ///
    /// Returns the outcome of every task that ran to completion. If a batch
    /// could not be persisted, the remaining tasks still finish and the first
    /// persistence error is returned.
    pub async fn dispatch(
        &self,
        urls: Vec<String>,
        page_url: &str,
        category: Option<&str>,
    ) -> Result<Vec<ItemOutcome>, ScrapeError> {
        self.stats.items_dispatched(urls.len());
        tracing::debug!(
            "Dispatching {} items from {} to {} workers",
            urls.len(),
            page_url,
            self.workers
        );

        let mut tasks: JoinSet<Result<ItemOutcome, BatchError>> = JoinSet::new();
        let mut first_error: Option<ScrapeError> = None;

        for url in urls {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    first_error = Some(ScrapeError::PoolClosed);
                    break;
                }
            };

            let context = Arc::clone(&self.context);
            let page = PageContext {
                item_url: url,
                page_url: page_url.to_string(),
                category: category.map(str::to_string),
            };

            tasks.spawn(
                async move {
                    let result = process_item(&context, page).await;
                    drop(permit);
                    result
                }
                .instrument(tracing::Span::current()),
            );
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    if let ItemOutcome::Skipped { url, kind, reason } = &outcome {
                        tracing::warn!("Skipped {} ({}): {}", url, kind, reason);
                    }
                    self.stats.record_outcome(&outcome);
                    outcomes.push(outcome);
                }
                Ok(Err(e)) => {
                    tracing::error!("Failed to persist batch: {}", e);
                    if first_error.is_none() {
                        first_error = Some(e.into());
                    }
                }
                Err(e) => {
                    tracing::error!("Item task failed: {}", e);
                    self.stats.record_skip(SkipKind::Task);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }
}

/// Fetches, extracts, tags and appends one item
async fn process_item(context: &ItemContext, page: PageContext) -> Result<ItemOutcome, BatchError> {
    let html = match context.source.fetch(&page.item_url).await {
        Ok(html) => html,
        Err(e) => return Ok(ItemOutcome::skipped(page.item_url, SkipKind::Fetch, e)),
    };

    // The parsed document is not Send; it must be gone before the next await.
    let extracted = {
        let document = Html::parse_document(&html);
        context.extractor.extract(&document, &page)
    };

    let record = match extracted {
        Ok(record) => context.tags.apply(record, &page),
        Err(e) => return Ok(ItemOutcome::skipped(page.item_url, SkipKind::Extract, e)),
    };

    context.writer.append(record)?;
    tracing::trace!("Recorded {}", page.item_url);
    Ok(ItemOutcome::Recorded { url: page.item_url })
}
