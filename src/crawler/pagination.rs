//! Listing categories and page addressing

use crate::config::{Pagination, SiteConfig};
use std::collections::HashSet;

/// Placeholder substituted with the page number
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// One paginated listing (a category, manufacturer or shop root)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCategory {
    pub name: Option<String>,
    pub base_url: String,
}

impl ListingCategory {
    pub fn new(name: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            name,
            base_url: base_url.into(),
        }
    }

    /// URL of listing page `page` (1-based)
    pub fn page_url(&self, pagination: &Pagination, page: u32) -> String {
        match pagination {
            Pagination::Template => self
                .base_url
                .replace(PAGE_PLACEHOLDER, &page.to_string()),
            Pagination::PathSuffix { suffix } => {
                if page <= 1 {
                    self.base_url.clone()
                } else {
                    format!(
                        "{}/{}",
                        self.base_url.trim_end_matches('/'),
                        suffix.replace(PAGE_PLACEHOLDER, &page.to_string())
                    )
                }
            }
            Pagination::Single => self.base_url.clone(),
        }
    }
}

/// Builds the categories of a listing site
///
/// Configured categories come first, in declaration order, followed by
/// `discovered` URLs that are not already present.
pub fn build_categories(site: &SiteConfig, discovered: Vec<String>) -> Vec<ListingCategory> {
    let mut seen = HashSet::new();
    let mut categories = Vec::new();

    for entry in &site.categories {
        if seen.insert(entry.url.clone()) {
            categories.push(ListingCategory::new(entry.name.clone(), entry.url.clone()));
        }
    }

    for url in discovered {
        if seen.insert(url.clone()) {
            categories.push(ListingCategory::new(None, url));
        }
    }

    categories
}
