//! Storage module for persisting extracted records
//!
//! This module handles:
//! - The open, ordered item record type
//! - Reading and writing tabular batch files
//! - The per-site batch writer with threshold flushing

mod batch_writer;
mod csv_file;
mod record;

pub use batch_writer::{
    batch_file_name, parse_batch_number, BatchError, BatchResult, BatchWriter, FinalizeSummary,
};
pub use csv_file::{read_records, write_records};
pub use record::{union_columns, ItemRecord};

use crate::config::{RunConfig, SiteConfig};

/// Opens the batch writer for one site run
///
/// # Arguments
///
/// * `run` - Run-wide settings (data directory, period)
/// * `site` - The site being crawled
pub fn open_batch_writer(run: &RunConfig, site: &SiteConfig) -> BatchWriter {
    BatchWriter::new(site.name.clone(), run.batch_dir(&site.name), site.batch_size)
}
