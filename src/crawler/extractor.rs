//! Item page field extraction
//!
//! `FieldExtractor` is the seam between the crawl driver and the per-site
//! knowledge of where each value lives on an item page. The bundled
//! `SelectorExtractor` is driven entirely by a site's `[[site.field]]` and
//! `[[site.constant]]` configuration.

use crate::config::{FieldMode, SiteConfig};
use crate::crawler::parser::{normalize_text, parse_selector};
use crate::storage::ItemRecord;
use crate::ExtractError;
use scraper::{ElementRef, Html, Selector};

/// Where an item page was reached from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// The item page URL (identity value)
    pub item_url: String,
    /// The listing page (or manifest path) the item came from
    pub page_url: String,
    /// Category name, for sites that tag records with one
    pub category: Option<String>,
}

/// Turns a parsed item page into a record
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, document: &Html, page: &PageContext) -> Result<ItemRecord, ExtractError>;
}

struct CompiledField {
    column: String,
    selector: Selector,
    attr: Option<String>,
    mode: FieldMode,
    default: String,
}

impl CompiledField {
    fn read(&self, document: &Html) -> String {
        match self.mode {
            FieldMode::First => document
                .select(&self.selector)
                .next()
                .map(|element| self.value_of(element))
                .unwrap_or_else(|| self.default.clone()),
            FieldMode::Combined => {
                let parts: Vec<String> = document
                    .select(&self.selector)
                    .map(|element| self.value_of(element))
                    .filter(|value| !value.is_empty())
                    .collect();
                if parts.is_empty() {
                    self.default.clone()
                } else {
                    parts.join(" ")
                }
            }
        }
    }

    fn value_of(&self, element: ElementRef<'_>) -> String {
        match &self.attr {
            Some(attr) => element
                .value()
                .attr(attr)
                .map(normalize_text)
                .unwrap_or_default(),
            None => normalize_text(&element.text().collect::<String>()),
        }
    }
}

/// Config-driven `FieldExtractor`
pub struct SelectorExtractor {
    ready: Option<(String, Selector)>,
    fields: Vec<CompiledField>,
    constants: Vec<(String, String)>,
}

impl SelectorExtractor {
    /// Compiles the selectors of a site once, up front
    pub fn from_site(site: &SiteConfig) -> Result<Self, ExtractError> {
        let ready = match &site.ready_selector {
            Some(raw) => Some((raw.clone(), parse_selector(raw)?)),
            None => None,
        };

        let fields = site
            .fields
            .iter()
            .map(|rule| {
                Ok(CompiledField {
                    column: rule.column.clone(),
                    selector: parse_selector(&rule.selector)?,
                    attr: rule.attr.clone(),
                    mode: rule.mode,
                    default: rule.default.clone().unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, ExtractError>>()?;

        let constants = site
            .constants
            .iter()
            .map(|c| (c.column.clone(), c.value.clone()))
            .collect();

        Ok(Self {
            ready,
            fields,
            constants,
        })
    }
}

impl FieldExtractor for SelectorExtractor {
    fn extract(&self, document: &Html, _page: &PageContext) -> Result<ItemRecord, ExtractError> {
        if let Some((raw, selector)) = &self.ready {
            if document.select(selector).next().is_none() {
                return Err(ExtractError::MissingElement {
                    selector: raw.clone(),
                });
            }
        }

        let mut record = ItemRecord::new();
        for field in &self.fields {
            record.insert(field.column.clone(), field.read(document));
        }
        for (column, value) in &self.constants {
            record.insert(column.clone(), value.clone());
        }
        Ok(record)
    }
}
