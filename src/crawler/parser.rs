//! Listing page parsing
//!
//! This module handles parsing listing and discovery pages to extract:
//! - Item links matched by a site's link selector
//! - Sub-category links for the discovery step
//!
//! It also holds the text normalization shared with field extraction.

use crate::ExtractError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Parses a CSS selector, mapping failures to `ExtractError`
pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Extracts item links from a listing page
///
/// # Link Extraction Rules
///
/// - Only elements matched by `selector` are considered; an element
///   without `href` is searched for a descendant `a[href]`
/// - Links are resolved against `page_url`
/// - `javascript:`, `mailto:`, `tel:`, data URIs and fragment-only links
///   are dropped
/// - Links containing any of `exclude_patterns` are dropped
/// - Duplicates are removed, keeping first-seen order
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The listing page URL for resolving relative links
/// * `selector` - CSS selector matching the item anchors
/// * `exclude_patterns` - Substrings marking non-item links
///
/// # Example
///
/// ```
/// use part_sweep::crawler::extract_item_links;
///
/// let html = r#"<ul class="products"><li><a class="link" href="/p/1">One</a></li></ul>"#;
/// let links = extract_item_links(html, "https://shop.example.com/c/", "ul.products a.link", &[]).unwrap();
/// assert_eq!(links, vec!["https://shop.example.com/p/1".to_string()]);
/// ```
pub fn extract_item_links(
    html: &str,
    page_url: &str,
    selector: &str,
    exclude_patterns: &[String],
) -> Result<Vec<String>, ExtractError> {
    let selector = parse_selector(selector)?;
    let anchor = parse_selector("a[href]")?;
    let base_url = Url::parse(page_url).ok();
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(href) => Some(href),
            None => element
                .select(&anchor)
                .next()
                .and_then(|a| a.value().attr("href")),
        };

        let Some(href) = href else {
            continue;
        };

        let Some(absolute_url) = resolve_link(href, base_url.as_ref()) else {
            continue;
        };

        if exclude_patterns
            .iter()
            .any(|pattern| absolute_url.contains(pattern.as_str()))
        {
            continue;
        }

        if seen.insert(absolute_url.clone()) {
            links.push(absolute_url);
        }
    }

    Ok(links)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: Option<&Url>) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Same-page anchors
    if href.starts_with('#') {
        return None;
    }

    let resolved = match base_url {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };

    match resolved {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Collapses runs of whitespace into single spaces and trims
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
