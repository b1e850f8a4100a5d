//! Part-Sweep: a batched product-listing harvester
//!
//! This crate crawls e-commerce listing pages per site, extracts one record per
//! item page with a bounded pool of workers, persists records in fixed-size
//! batch files and later consolidates those batches into one deduplicated file
//! per site.

pub mod config;
pub mod crawler;
pub mod logging;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Part-Sweep operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Batch error: {0}")]
    Batch(#[from] storage::BatchError),

    #[error("Category discovery failed for {url}: {message}")]
    Discovery { url: String, message: String },

    #[error("Missing input file: {path}")]
    MissingInput { path: String },

    #[error("Failed to read manifest {path}: {source}")]
    Manifest { path: String, source: csv::Error },

    #[error("Manifest {path} has no column named '{column}'")]
    ManifestColumn { path: String, column: String },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunPhase,
        to: state::RunPhase,
    },

    #[error("Worker pool closed")]
    PoolClosed,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),

    #[error("Unrecognized site code(s): {}", .0.join(", "))]
    UnknownSites(Vec<String>),
}

/// Page retrieval errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Request failed for {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Returns true if the page answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Field extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Required element not found: {selector}")]
    MissingElement { selector: String },

    #[error("Failed to parse selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{ItemOutcome, RunPhase};
pub use storage::{BatchWriter, ItemRecord};
