//! Batch writer
//!
//! Accumulates records for one site run and persists them as immutable batch
//! files of at most `batch_size` rows. A batch file is named after the
//! cumulative number of rows written once it lands (`batch_<total>.csv`), so
//! file numbers strictly increase within a run. A writer opened on a
//! directory that already holds batches of the same period continues the
//! numbering after the highest existing batch instead of overwriting it.
//!
//! Every worker of a site appends through the same writer. The accumulator
//! sits behind a mutex and a threshold flush happens while the lock is held,
//! so exactly one flush occurs per threshold crossing.

use crate::storage::csv_file::write_records;
use crate::storage::record::{union_columns, ItemRecord};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors raised while persisting a batch
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to create batch directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write batch file {path}: {source}")]
    Write { path: PathBuf, source: csv::Error },
}

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

/// What a finished site run left on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeSummary {
    pub site_name: String,
    pub total_records: usize,
    pub batch_files: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct Accumulator {
    rows: Vec<ItemRecord>,
    base: usize,
    total_processed: usize,
    batch_files: Vec<PathBuf>,
    finalized: bool,
}

/// Thread-safe, size-bounded record accumulator for one site run
#[derive(Debug)]
pub struct BatchWriter {
    site_name: String,
    out_dir: PathBuf,
    batch_size: usize,
    inner: Mutex<Accumulator>,
}

impl BatchWriter {
    /// Creates a writer that places batch files in `out_dir`
    ///
    /// The directory is created on the first flush. A batch size of zero is
    /// treated as one.
    pub fn new(site_name: impl Into<String>, out_dir: impl Into<PathBuf>, batch_size: usize) -> Self {
        let site_name = site_name.into();
        let out_dir = out_dir.into();

        let base = highest_batch_number(&out_dir);
        if base > 0 {
            tracing::warn!(
                "{} already has batches up to {} in {}, numbering continues after it",
                site_name,
                batch_file_name(base),
                out_dir.display()
            );
        }

        Self {
            site_name,
            out_dir,
            batch_size: batch_size.max(1),
            inner: Mutex::new(Accumulator {
                base,
                ..Accumulator::default()
            }),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Adds one record, flushing when the batch size is reached
    pub fn append(&self, record: ItemRecord) -> BatchResult<()> {
        let mut acc = self.lock();
        acc.rows.push(record);
        if acc.rows.len() >= self.batch_size {
            self.flush_locked(&mut acc)?;
        }
        Ok(())
    }

    /// Persists accumulated records; no-op when nothing is pending
    pub fn flush(&self) -> BatchResult<()> {
        let mut acc = self.lock();
        self.flush_locked(&mut acc)
    }

    /// Flushes the remainder and reports the run total
    ///
    /// Calling it again writes nothing new and returns the same summary.
    pub fn finalize(&self) -> BatchResult<FinalizeSummary> {
        let mut acc = self.lock();
        let already_finalized = acc.finalized;
        self.flush_locked(&mut acc)?;
        acc.finalized = true;

        if already_finalized {
            tracing::debug!("{} already finalized", self.site_name);
        } else {
            tracing::info!(
                "SCRAPING COMPLETE: {} | TOTAL RECORDS: {}",
                self.site_name,
                acc.total_processed
            );
        }

        Ok(FinalizeSummary {
            site_name: self.site_name.clone(),
            total_records: acc.total_processed,
            batch_files: acc.batch_files.clone(),
        })
    }

    /// Records currently held in memory
    pub fn pending(&self) -> usize {
        self.lock().rows.len()
    }

    /// Records already persisted
    pub fn total_processed(&self) -> usize {
        self.lock().total_processed
    }

    /// Batch files written so far, in write order
    pub fn batch_files(&self) -> Vec<PathBuf> {
        self.lock().batch_files.clone()
    }

    pub fn is_finalized(&self) -> bool {
        self.lock().finalized
    }

    // The accumulator is only mutated after a successful write, so a
    // poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Accumulator> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes pending rows in chunks of at most `batch_size`
    ///
    /// Rows left over by an earlier failed write are split rather than
    /// producing an oversized file.
    fn flush_locked(&self, acc: &mut Accumulator) -> BatchResult<()> {
        if acc.rows.is_empty() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.out_dir).map_err(|source| BatchError::CreateDir {
            path: self.out_dir.clone(),
            source,
        })?;

        while !acc.rows.is_empty() {
            let take = acc.rows.len().min(self.batch_size);
            let total = acc.total_processed + take;
            let path = self.out_dir.join(batch_file_name(acc.base + total));

            let chunk = &acc.rows[..take];
            let header = union_columns(chunk);
            write_records(&path, &header, chunk).map_err(|source| BatchError::Write {
                path: path.clone(),
                source,
            })?;

            acc.rows.drain(..take);
            acc.total_processed = total;
            tracing::info!(
                "SAVED BATCH: {} | Total rows: {}",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                total
            );
            acc.batch_files.push(path);
        }

        Ok(())
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        let acc = self.inner.get_mut().unwrap_or_else(|p| p.into_inner());
        if acc.finalized || acc.rows.is_empty() {
            return;
        }

        tracing::warn!(
            "{} dropped with {} unflushed records, flushing",
            self.site_name,
            acc.rows.len()
        );
        let mut acc = std::mem::take(acc);
        if let Err(e) = self.flush_locked(&mut acc) {
            tracing::error!("Failed to flush {} on drop: {}", self.site_name, e);
        }
    }
}

/// File name of the batch that brings the cumulative total to `total`
pub fn batch_file_name(total: usize) -> String {
    format!("batch_{}.csv", total)
}

/// Highest batch number found in `dir`, 0 when there is none
fn highest_batch_number(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| parse_batch_number(&entry.file_name().to_string_lossy()))
        .max()
        .unwrap_or(0)
}

/// Parses the cumulative total out of a batch file name
pub fn parse_batch_number(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("batch_")?
        .strip_suffix(".csv")?
        .parse()
        .ok()
}
