//! Configuration module for Part-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use part_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sites.toml")).unwrap();
//! for site in &config.sites {
//!     println!("{} writes batches of {}", site.code, site.batch_size);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryEntry, Config, ConstantField, DiscoveryConfig, FieldMode, FieldRule, HttpConfig,
    ItemSource, ManifestConfig, Pagination, RunConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
