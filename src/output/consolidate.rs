//! Batch consolidation
//!
//! Merges every batch file of a site into one deduplicated file per run
//! period. The result is a pure function of the batch files and their
//! numeric order, so running it again yields the same file and summary.

use crate::config::RunConfig;
use crate::output::summary::{ConsolidationSummary, DuplicateCount};
use crate::storage::{parse_batch_number, read_records, union_columns, write_records, ItemRecord};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker in the name of consolidated files, which are never inputs
pub const CONSOLIDATED_MARKER: &str = "final_concat";

/// Errors that stop the consolidation of one site
#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error("Failed to list batch directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write consolidated file {path}: {source}")]
    Write { path: PathBuf, source: csv::Error },
}

/// Merged rows of one site, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedBatches {
    pub header: Vec<String>,
    pub records: Vec<ItemRecord>,
    pub raw_total: usize,
    pub duplicates: DuplicateCount,
    pub with_price: usize,
}

impl MergedBatches {
    pub fn unique_total(&self) -> usize {
        self.records.len()
    }
}

/// Lists the batch files of a directory in consolidation order
///
/// Only `.csv` files are considered and consolidated outputs are skipped.
/// Files are ordered by their cumulative batch number; names without one
/// come last, by name.
pub fn list_batch_files(dir: &Path) -> Result<Vec<PathBuf>, ConsolidateError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConsolidateError::ListDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<(Option<usize>, String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConsolidateError::ListDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".csv") || name.contains(CONSOLIDATED_MARKER) {
            continue;
        }
        files.push((parse_batch_number(&name), name, path));
    }

    files.sort_by(|a, b| {
        (a.0.is_none(), a.0, &a.1).cmp(&(b.0.is_none(), b.0, &b.1))
    });
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

/// Concatenates batches in order, drops repeated identities, counts prices
///
/// When `identity_field` is not among the columns nothing is dropped and the
/// duplicate count is [`DuplicateCount::NotApplicable`]. A record lacking a
/// column present elsewhere counts as an empty value for it.
pub fn merge_batches(
    batches: Vec<(Vec<String>, Vec<ItemRecord>)>,
    identity_field: &str,
    price_field: &str,
) -> MergedBatches {
    let mut header: Vec<String> = Vec::new();
    for (columns, _) in &batches {
        for column in columns {
            if !header.contains(column) {
                header.push(column.clone());
            }
        }
    }

    let combined: Vec<ItemRecord> = batches
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect();
    let raw_total = combined.len();

    // Batches written by this crate always carry a header, but tolerate
    // records whose columns were not declared.
    for column in union_columns(&combined) {
        if !header.contains(&column) {
            header.push(column);
        }
    }

    let (records, duplicates) = if header.iter().any(|c| c == identity_field) {
        let mut seen = HashSet::new();
        let unique: Vec<ItemRecord> = combined
            .into_iter()
            .filter(|record| seen.insert(record.get(identity_field).unwrap_or("").to_string()))
            .collect();
        let removed = raw_total - unique.len();
        (unique, DuplicateCount::Count(removed))
    } else {
        (combined, DuplicateCount::NotApplicable)
    };

    let with_price = records
        .iter()
        .filter(|record| record.has_value(price_field))
        .count();

    MergedBatches {
        header,
        records,
        raw_total,
        duplicates,
        with_price,
    }
}

/// Consolidates the batch files of one site
///
/// # Returns
///
/// * `Ok(Some(summary))` - The consolidated file was written
/// * `Ok(None)` - The site has no batch directory or no readable batch file
/// * `Err(ConsolidateError)` - The directory could not be listed or the
///   output could not be written
pub fn consolidate_site(
    run: &RunConfig,
    site_name: &str,
) -> Result<Option<ConsolidationSummary>, ConsolidateError> {
    let dir = run.batch_dir(site_name);
    if !dir.is_dir() {
        tracing::debug!("No batch directory for {} at {}", site_name, dir.display());
        return Ok(None);
    }

    let files = list_batch_files(&dir)?;
    if files.is_empty() {
        tracing::debug!("No batch files in {}", dir.display());
        return Ok(None);
    }

    tracing::info!("Processing: {} ({} batch files)", site_name, files.len());

    let mut batches = Vec::with_capacity(files.len());
    for file in &files {
        match read_records(file) {
            Ok(batch) => batches.push(batch),
            Err(e) => tracing::error!("Error reading {}: {}", file.display(), e),
        }
    }

    if batches.is_empty() {
        tracing::warn!("No readable batch files for {}", site_name);
        return Ok(None);
    }

    let merged = merge_batches(batches, &run.identity_field, &run.price_field);

    std::fs::create_dir_all(&run.final_dir).map_err(|source| ConsolidateError::CreateDir {
        path: run.final_dir.clone(),
        source,
    })?;
    let output_path = run.consolidated_path(site_name);
    write_records(&output_path, &merged.header, &merged.records).map_err(|source| {
        ConsolidateError::Write {
            path: output_path.clone(),
            source,
        }
    })?;

    tracing::info!(
        "{}: {} raw, {} duplicates, {} unique, {} with price -> {}",
        site_name,
        merged.raw_total,
        merged.duplicates,
        merged.unique_total(),
        merged.with_price,
        output_path.display()
    );

    Ok(Some(ConsolidationSummary {
        site: site_name.to_string(),
        raw_total: merged.raw_total,
        duplicates: merged.duplicates,
        unique_total: merged.unique_total(),
        with_price: merged.with_price,
        output_path,
    }))
}

/// Consolidates several sites, in the given order
///
/// A site that fails is logged and left out of the result; the others are
/// still consolidated.
pub fn consolidate_sites(run: &RunConfig, site_names: &[String]) -> Vec<ConsolidationSummary> {
    let mut summaries = Vec::new();
    for name in site_names {
        let span = tracing::info_span!("site", site = %name);
        let _entered = span.enter();

        match consolidate_site(run, name) {
            Ok(Some(summary)) => summaries.push(summary),
            Ok(None) => {}
            Err(e) => tracing::error!("Consolidation of {} failed: {}", name, e),
        }
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run_config(dir: &TempDir) -> RunConfig {
        let text = format!(
            r#"
            period = "Jan_2026"
            data-dir = "{}"
            final-dir = "{}"
            "#,
            dir.path().join("data").display(),
            dir.path().join("final").display()
        );
        toml::from_str(&text).unwrap()
    }

    fn write_batch(run: &RunConfig, site: &str, name: &str, contents: &str) {
        let dir = run.batch_dir(site);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
    }

    fn batch(header: &[&str], rows: &[&[&str]]) -> (Vec<String>, Vec<ItemRecord>) {
        let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
        let records = rows
            .iter()
            .map(|row| {
                header
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|v| v.to_string()))
                    .collect::<ItemRecord>()
            })
            .collect();
        (header, records)
    }

    #[test]
    fn test_first_occurrence_wins() {
        let a = batch(&["Item URL", "v"], &[&["x", "1"]]);
        let b = batch(&["Item URL", "v"], &[&["x", "2"]]);

        let merged = merge_batches(vec![a, b], "Item URL", "Price");

        assert_eq!(merged.raw_total, 2);
        assert_eq!(merged.unique_total(), 1);
        assert_eq!(merged.duplicates, DuplicateCount::Count(1));
        assert_eq!(merged.records[0].get("v"), Some("1"));
    }

    #[test]
    fn test_with_price_counts_trimmed_values() {
        let rows = batch(
            &["Item URL", "Price"],
            &[&["a", " "], &["b", "10"], &["c", ""]],
        );
        let merged = merge_batches(vec![rows], "Item URL", "Price");
        assert_eq!(merged.with_price, 1);
    }

    #[test]
    fn test_with_price_counted_after_dedup() {
        let rows = batch(
            &["Item URL", "Price"],
            &[&["a", "10"], &["a", "10"], &["b", ""]],
        );
        let merged = merge_batches(vec![rows], "Item URL", "Price");
        assert_eq!(merged.with_price, 1);
        assert_eq!(merged.unique_total(), 2);
    }

    #[test]
    fn test_missing_identity_is_not_applicable() {
        let rows = batch(&["Title", "Price"], &[&["a", "1"], &["a", "1"]]);
        let merged = merge_batches(vec![rows], "Item URL", "Price");

        assert_eq!(merged.duplicates, DuplicateCount::NotApplicable);
        assert_eq!(merged.unique_total(), merged.raw_total);
        assert_eq!(merged.raw_total, 2);
    }

    #[test]
    fn test_missing_price_column() {
        let rows = batch(&["Item URL"], &[&["a"], &["b"]]);
        let merged = merge_batches(vec![rows], "Item URL", "Price");
        assert_eq!(merged.with_price, 0);
    }

    #[test]
    fn test_header_union_in_first_seen_order() {
        let a = batch(&["Item URL", "Price"], &[&["a", "1"]]);
        let b = batch(&["Item URL", "SKU", "Price"], &[&["b", "S-1", "2"]]);
        let merged = merge_batches(vec![a, b], "Item URL", "Price");
        assert_eq!(merged.header, vec!["Item URL", "Price", "SKU"]);
    }

    #[test]
    fn test_list_batch_files_numeric_order() {
        let dir = TempDir::new().unwrap();
        let run = run_config(&dir);
        for name in [
            "batch_100.csv",
            "batch_12.csv",
            "batch_24.csv",
            "notes.txt",
            "Shop_final_concat_Jan_2026.csv",
            "manual.csv",
        ] {
            write_batch(&run, "Shop", name, "Item URL\nx\n");
        }

        let files = list_batch_files(&run.batch_dir("Shop")).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["batch_12.csv", "batch_24.csv", "batch_100.csv", "manual.csv"]
        );
    }

    #[test]
    fn test_consolidate_site_end_to_end() {
        let dir = TempDir::new().unwrap();
        let run = run_config(&dir);
        write_batch(
            &run,
            "Shop",
            "batch_2.csv",
            "Page URL,Item URL,Price\np1,https://a/1,10\np1,https://a/2,\n",
        );
        write_batch(
            &run,
            "Shop",
            "batch_4.csv",
            "Page URL,Item URL,Price\np2,https://a/1,11\np2,https://a/3,30\n",
        );

        let summary = consolidate_site(&run, "Shop").unwrap().unwrap();

        assert_eq!(summary.raw_total, 4);
        assert_eq!(summary.duplicates, DuplicateCount::Count(1));
        assert_eq!(summary.unique_total, 3);
        assert_eq!(summary.with_price, 2);
        assert_eq!(summary.output_path, run.consolidated_path("Shop"));

        let (header, records) = read_records(&summary.output_path).unwrap();
        assert_eq!(header, vec!["Page URL", "Item URL", "Price"]);
        assert_eq!(records[0].get("Price"), Some("10"));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_consolidate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let run = run_config(&dir);
        write_batch(&run, "Shop", "batch_2.csv", "Item URL,Price\na,1\na,2\n");

        let first = consolidate_site(&run, "Shop").unwrap().unwrap();
        let first_bytes = fs::read(&first.output_path).unwrap();
        let second = consolidate_site(&run, "Shop").unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first_bytes, fs::read(&second.output_path).unwrap());
    }

    #[test]
    fn test_corrupt_batch_is_skipped() {
        let dir = TempDir::new().unwrap();
        let run = run_config(&dir);
        write_batch(&run, "Shop", "batch_2.csv", "Item URL,Price\na,1\nb,2\n");
        write_batch(&run, "Shop", "batch_4.csv", "Item URL,Price\nc,3,extra,cells\n");

        let summary = consolidate_site(&run, "Shop").unwrap().unwrap();
        assert_eq!(summary.raw_total, 2);
    }

    #[test]
    fn test_site_without_batches() {
        let dir = TempDir::new().unwrap();
        let run = run_config(&dir);
        assert!(consolidate_site(&run, "Missing").unwrap().is_none());

        fs::create_dir_all(run.batch_dir("Empty")).unwrap();
        assert!(consolidate_site(&run, "Empty").unwrap().is_none());

        let summaries = consolidate_sites(&run, &["Missing".to_string(), "Empty".to_string()]);
        assert!(summaries.is_empty());
    }
}
