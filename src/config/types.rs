use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Part-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Looks up a site by its CLI code (case-insensitive)
    pub fn find_site(&self, code: &str) -> Option<&SiteConfig> {
        self.sites
            .iter()
            .find(|site| site.code.eq_ignore_ascii_case(code.trim()))
    }

    /// Resolves requested site codes, rejecting the whole request if any code
    /// is unknown. Repeated codes are collapsed to their first occurrence.
    pub fn resolve_sites(&self, codes: &[String]) -> crate::ConfigResult<Vec<&SiteConfig>> {
        let unknown: Vec<String> = codes
            .iter()
            .filter(|code| self.find_site(code).is_none())
            .map(|code| code.to_uppercase())
            .collect();

        if !unknown.is_empty() {
            return Err(crate::ConfigError::UnknownSites(unknown));
        }

        let mut resolved: Vec<&SiteConfig> = Vec::new();
        for code in codes {
            if let Some(site) = self.find_site(code) {
                if !resolved.iter().any(|s| s.code == site.code) {
                    resolved.push(site);
                }
            }
        }
        Ok(resolved)
    }
}

/// Run-wide settings shared by every site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// Run-period label partitioning batch directories and final files
    pub period: String,

    /// Root directory for per-site batch directories
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory receiving consolidated per-site files
    #[serde(default = "default_final_dir")]
    pub final_dir: PathBuf,

    /// Directory receiving per-site log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Maximum number of sites crawled at the same time
    #[serde(default = "default_max_parallel_sites")]
    pub max_parallel_sites: usize,

    /// Column holding the item URL, used as the dedup key
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Column holding the price
    #[serde(default = "default_price_field")]
    pub price_field: String,

    /// Column tagging each record with its listing page
    #[serde(default = "default_page_url_field")]
    pub page_url_field: String,

    /// Optional markdown summary written after consolidation
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
}

impl RunConfig {
    /// Directory holding the batch files of one site for this run period
    pub fn batch_dir(&self, site_name: &str) -> PathBuf {
        self.data_dir.join(format!("{}_{}", site_name, self.period))
    }

    /// Path of the consolidated file of one site for this run period
    pub fn consolidated_path(&self, site_name: &str) -> PathBuf {
        self.final_dir
            .join(format!("{}_final_concat_{}.csv", site_name, self.period))
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// User agents rotated across requests
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agents: default_user_agents(),
        }
    }
}

/// One target website
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Identifier accepted on the command line
    pub code: String,

    /// Stem used for directories, files and the log sink
    pub name: String,

    /// Number of records per batch file
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Size of the item worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Page-count ceiling per category
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Pause between listing pages, in milliseconds
    #[serde(default)]
    pub listing_delay_ms: u64,

    /// Selector matching item links on a listing page
    #[serde(default)]
    pub item_link_selector: Option<String>,

    /// Links containing any of these substrings are not items
    #[serde(default)]
    pub exclude_link_patterns: Vec<String>,

    /// Element that must be present on an item page
    #[serde(default)]
    pub ready_selector: Option<String>,

    /// Column receiving the category name, if any
    #[serde(default)]
    pub category_field: Option<String>,

    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryEntry>,

    #[serde(default)]
    pub pagination: Pagination,

    #[serde(default)]
    pub discovery: Option<DiscoveryConfig>,

    #[serde(default)]
    pub manifest: Option<ManifestConfig>,

    #[serde(default, rename = "field")]
    pub fields: Vec<FieldRule>,

    #[serde(default, rename = "constant")]
    pub constants: Vec<ConstantField>,
}

/// Where a site's item URLs come from
#[derive(Debug, Clone, Copy)]
pub enum ItemSource<'a> {
    /// Listing pages, optionally preceded by category discovery
    Listing,
    /// Externally supplied list of item URLs
    Manifest(&'a ManifestConfig),
}

impl SiteConfig {
    pub fn item_source(&self) -> ItemSource<'_> {
        match &self.manifest {
            Some(manifest) => ItemSource::Manifest(manifest),
            None => ItemSource::Listing,
        }
    }
}

/// A listing base URL, optionally named (e.g. a manufacturer)
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
}

/// How page N of a category is addressed
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "style", rename_all = "kebab-case")]
pub enum Pagination {
    /// The category URL carries a `{page}` placeholder
    #[default]
    Template,
    /// Page 1 is the base URL, later pages append the suffix
    PathSuffix { suffix: String },
    /// A single listing page per category
    Single,
}

/// One-time sub-category discovery step
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    pub url: String,
    pub selector: String,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Item URLs supplied by a CSV file
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestConfig {
    pub path: PathBuf,
    #[serde(default = "default_manifest_column")]
    pub column: String,
}

/// How one output column is read from an item page
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRule {
    pub column: String,
    pub selector: String,
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub mode: FieldMode,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldMode {
    /// Text of the first match
    #[default]
    First,
    /// Text of every match joined by a space
    Combined,
}

/// Column with a fixed value (currency, source name, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct ConstantField {
    pub column: String,
    pub value: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_final_dir() -> PathBuf {
    PathBuf::from("final_data")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_max_parallel_sites() -> usize {
    3
}

fn default_identity_field() -> String {
    "Item URL".to_string()
}

fn default_price_field() -> String {
    "Price".to_string()
}

fn default_page_url_field() -> String {
    "Page URL".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
    ]
}

fn default_batch_size() -> usize {
    12
}

fn default_workers() -> usize {
    4
}

fn default_max_pages() -> u32 {
    50
}

fn default_manifest_column() -> String {
    "item_url".to_string()
}
