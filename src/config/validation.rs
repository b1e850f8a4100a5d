use crate::config::types::{Config, HttpConfig, Pagination, RunConfig, SiteConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_config(&config.run)?;
    validate_http_config(&config.http)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates run-wide settings
fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.period.trim().is_empty() {
        return Err(ConfigError::Validation(
            "run period cannot be empty".to_string(),
        ));
    }

    if !is_file_stem(&config.period) {
        return Err(ConfigError::Validation(format!(
            "run period must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.period
        )));
    }

    if config.max_parallel_sites < 1 {
        return Err(ConfigError::Validation(format!(
            "max_parallel_sites must be >= 1, got {}",
            config.max_parallel_sites
        )));
    }

    for (name, value) in [
        ("identity_field", &config.identity_field),
        ("price_field", &config.price_field),
        ("page_url_field", &config.page_url_field),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates HTTP client settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agents.iter().all(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "at least one non-empty user agent is required".to_string(),
        ));
    }

    Ok(())
}

/// Validates every site entry and their uniqueness
fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    let mut codes = HashSet::new();
    let mut names = HashSet::new();

    for site in sites {
        validate_site(site)?;

        if !codes.insert(site.code.to_ascii_uppercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site code '{}'",
                site.code
            )));
        }

        if !names.insert(site.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site name '{}'",
                site.name
            )));
        }
    }

    Ok(())
}

/// Validates a single site entry
fn validate_site(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.code.trim().is_empty() {
        return Err(ConfigError::Validation(
            "site code cannot be empty".to_string(),
        ));
    }

    if !is_file_stem(&site.name) {
        return Err(ConfigError::Validation(format!(
            "site name must be non-empty and contain only alphanumeric characters, '-' and '_', got '{}'",
            site.name
        )));
    }

    if site.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "[{}] batch_size must be >= 1, got {}",
            site.code, site.batch_size
        )));
    }

    if site.workers < 1 || site.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "[{}] workers must be between 1 and 64, got {}",
            site.code, site.workers
        )));
    }

    if site.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "[{}] max_pages must be >= 1, got {}",
            site.code, site.max_pages
        )));
    }

    if site.manifest.is_some() {
        if !site.categories.is_empty() || site.discovery.is_some() {
            return Err(ConfigError::Validation(format!(
                "[{}] a manifest site cannot also declare categories or discovery",
                site.code
            )));
        }
    } else {
        validate_listing_site(site)?;
    }

    if let Some(selector) = &site.ready_selector {
        validate_selector(selector)?;
    }

    for field in &site.fields {
        if field.column.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "[{}] field column cannot be empty",
                site.code
            )));
        }
        validate_selector(&field.selector)?;
    }

    for constant in &site.constants {
        if constant.column.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "[{}] constant column cannot be empty",
                site.code
            )));
        }
    }

    Ok(())
}

/// Validates the listing side of a site: selector, categories, pagination
fn validate_listing_site(site: &SiteConfig) -> Result<(), ConfigError> {
    let selector = site.item_link_selector.as_deref().ok_or_else(|| {
        ConfigError::Validation(format!(
            "[{}] item_link_selector is required for listing sites",
            site.code
        ))
    })?;
    validate_selector(selector)?;

    if site.categories.is_empty() && site.discovery.is_none() {
        return Err(ConfigError::Validation(format!(
            "[{}] needs at least one category, a discovery step, or a manifest",
            site.code
        )));
    }

    for category in &site.categories {
        validate_http_url(&category.url)?;

        if site.pagination == Pagination::Template && !category.url.contains("{page}") {
            return Err(ConfigError::Validation(format!(
                "[{}] template pagination requires a {{page}} placeholder in '{}'",
                site.code, category.url
            )));
        }
    }

    match &site.pagination {
        Pagination::PathSuffix { suffix } if !suffix.contains("{page}") => {
            return Err(ConfigError::Validation(format!(
                "[{}] path-suffix pagination requires a {{page}} placeholder in '{}'",
                site.code, suffix
            )));
        }
        _ => {}
    }

    if let Some(discovery) = &site.discovery {
        if site.pagination == Pagination::Template {
            return Err(ConfigError::Validation(format!(
                "[{}] discovered categories cannot use template pagination",
                site.code
            )));
        }
        validate_http_url(&discovery.url)?;
        validate_selector(&discovery.selector)?;
    }

    Ok(())
}

/// Validates that a URL parses and uses http or https
///
/// A `{page}` placeholder is substituted before parsing.
fn validate_http_url(raw: &str) -> Result<(), ConfigError> {
    let candidate = raw.replace("{page}", "1");
    let url = Url::parse(&candidate)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' must use http or https",
            raw
        )));
    }

    Ok(())
}

/// Validates a CSS selector
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", selector, e)))
}

/// Returns true if the value is usable as part of a file name
fn is_file_stem(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
