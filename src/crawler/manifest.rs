//! Item URL manifests
//!
//! Some sites expose no crawlable listing; their item URLs are supplied as a
//! CSV file instead.

use crate::config::ManifestConfig;
use crate::ScrapeError;

/// Reads the item URLs of a manifest, in file order, dropping blank cells
pub fn load_manifest(manifest: &ManifestConfig) -> Result<Vec<String>, ScrapeError> {
    let path = &manifest.path;
    let shown = path.display().to_string();

    if !path.is_file() {
        return Err(ScrapeError::MissingInput { path: shown });
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| ScrapeError::Manifest {
            path: shown.clone(),
            source,
        })?;

    let headers = reader
        .headers()
        .map_err(|source| ScrapeError::Manifest {
            path: shown.clone(),
            source,
        })?
        .clone();

    let column = headers
        .iter()
        .position(|h| h.trim() == manifest.column)
        .ok_or_else(|| ScrapeError::ManifestColumn {
            path: shown.clone(),
            column: manifest.column.clone(),
        })?;

    let mut urls = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|source| ScrapeError::Manifest {
            path: shown.clone(),
            source,
        })?;
        if let Some(value) = row.get(column) {
            let value = value.trim();
            if !value.is_empty() {
                urls.push(value.to_string());
            }
        }
    }

    tracing::debug!("Loaded {} URLs from manifest {}", urls.len(), shown);
    Ok(urls)
}
