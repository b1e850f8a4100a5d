//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a run,
//! including the consolidation table and, after a crawl, per-site crawl
//! statistics.

use crate::crawler::SiteRunReport;
use crate::output::summary::ConsolidationSummary;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Everything the markdown summary reports
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub period: String,
    pub generated_at: String,
    pub config_hash: String,
    pub sites: Vec<ConsolidationSummary>,
    pub crawls: Vec<SiteRunReport>,
}

impl RunSummary {
    pub fn new(period: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            config_hash: config_hash.into(),
            sites: Vec::new(),
            crawls: Vec::new(),
        }
    }

    pub fn total_unique(&self) -> usize {
        self.sites.iter().map(|s| s.unique_total).sum()
    }

    pub fn total_with_price(&self) -> usize {
        self.sites.iter().map(|s| s.with_price).sum()
    }
}

/// Writes the markdown summary to `output_path`
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(io::Error)` - Failed to write summary
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    // Title
    md.push_str("# Part-Sweep Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Period**: {}\n", summary.period));
    md.push_str(&format!("- **Generated**: {}\n", summary.generated_at));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Consolidation table
    md.push_str("## Consolidated Sites\n\n");
    if summary.sites.is_empty() {
        md.push_str("No batch files were consolidated.\n\n");
    } else {
        md.push_str("| Website | Raw | Duplicates | Unique | With Price | Output |\n");
        md.push_str("|---------|-----|------------|--------|------------|--------|\n");
        for site in &summary.sites {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                site.site,
                site.raw_total,
                site.duplicates,
                site.unique_total,
                site.with_price,
                site.output_path.display()
            ));
        }
        md.push_str(&format!(
            "\n- **Total Unique Items**: {}\n",
            summary.total_unique()
        ));
        md.push_str(&format!(
            "- **Total With Price**: {}\n\n",
            summary.total_with_price()
        ));
    }

    // Crawl statistics
    if !summary.crawls.is_empty() {
        md.push_str("## Crawl Statistics\n\n");
        md.push_str("| Website | Pages | Items | Records | Skipped | Batches | Status |\n");
        md.push_str("|---------|-------|-------|---------|---------|---------|--------|\n");
        for crawl in &summary.crawls {
            let status = match &crawl.error {
                None => "ok".to_string(),
                Some(e) => format!("failed: {}", e.replace('|', "/")),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                crawl.name,
                crawl.counts.pages_fetched,
                crawl.counts.items_dispatched,
                crawl.records_written,
                crawl.counts.total_skipped(),
                crawl.batches_written,
                status
            ));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::summary::DuplicateCount;
    use crate::state::{RunPhase, SiteRunCounts};

    fn create_test_summary() -> RunSummary {
        let mut summary = RunSummary::new("Jan_2026", "abc123");
        summary.sites = vec![
            ConsolidationSummary {
                site: "big_bear_engine".to_string(),
                raw_total: 1000,
                duplicates: DuplicateCount::Count(50),
                unique_total: 950,
                with_price: 900,
                output_path: "final_data/big_bear_engine_final_concat_Jan_2026.csv".into(),
            },
            ConsolidationSummary {
                site: "find_it_parts".to_string(),
                raw_total: 40,
                duplicates: DuplicateCount::NotApplicable,
                unique_total: 40,
                with_price: 0,
                output_path: "final_data/find_it_parts_final_concat_Jan_2026.csv".into(),
            },
        ];
        summary
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_summary());

        assert!(markdown.contains("# Part-Sweep Run Summary"));
        assert!(markdown.contains("- **Period**: Jan_2026"));
        assert!(markdown.contains("- **Config Hash**: abc123"));
        assert!(markdown.contains("| big_bear_engine | 1000 | 50 | 950 | 900 |"));
        assert!(markdown.contains("| find_it_parts | 40 | N/A | 40 | 0 |"));
        assert!(markdown.contains("- **Total Unique Items**: 990"));
        assert!(!markdown.contains("Crawl Statistics"));
    }

    #[test]
    fn test_markdown_with_crawls() {
        let mut summary = create_test_summary();
        summary.crawls.push(SiteRunReport {
            code: "BIGBEAR".to_string(),
            name: "big_bear_engine".to_string(),
            phase: RunPhase::Finalize,
            counts: SiteRunCounts {
                pages_fetched: 12,
                items_dispatched: 300,
                items_recorded: 298,
                skipped_extract: 2,
                ..SiteRunCounts::default()
            },
            records_written: 298,
            batches_written: 25,
            error: None,
        });

        let markdown = format_markdown_summary(&summary);
        assert!(markdown.contains("## Crawl Statistics"));
        assert!(markdown.contains("| big_bear_engine | 12 | 300 | 298 | 2 | 25 | ok |"));
    }

    #[test]
    fn test_empty_summary() {
        let markdown = format_markdown_summary(&RunSummary::new("Jan_2026", "h"));
        assert!(markdown.contains("No batch files were consolidated."));
    }

    #[test]
    fn test_generate_markdown_summary_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports").join("summary.md");
        generate_markdown_summary(&create_test_summary(), &path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("Jan_2026"));
    }
}
