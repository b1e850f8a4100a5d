//! Tabular file reading and writing
//!
//! Batch and consolidated files are UTF-8 CSV with a header row. Writes go to
//! a temporary sibling first and are renamed into place, so a file with the
//! final name is always complete.

use crate::storage::record::ItemRecord;
use std::path::{Path, PathBuf};

/// Writes records under the given header to `path`
///
/// Cells for columns a record does not carry are left empty.
pub fn write_records(path: &Path, header: &[String], records: &[ItemRecord]) -> csv::Result<()> {
    let staging = staging_path(path);

    let result = write_to(&staging, header, records);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }

    std::fs::rename(&staging, path)?;
    Ok(())
}

fn write_to(path: &Path, header: &[String], records: &[ItemRecord]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;

    for record in records {
        writer.write_record(header.iter().map(|column| record.get(column).unwrap_or("")))?;
    }

    writer.flush()?;
    Ok(())
}

/// Reads a whole file into its header and records
///
/// Rows whose length differs from the header are reported as errors.
pub fn read_records(path: &Path) -> csv::Result<(Vec<String>, Vec<ItemRecord>)> {
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(
            header
                .iter()
                .zip(row.iter())
                .map(|(column, value)| (column.as_str(), value))
                .collect(),
        );
    }

    Ok((header, records))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
