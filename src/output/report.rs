//! Console reports
//!
//! Fixed-width tables printed at the end of a crawl or consolidation.

use crate::crawler::SiteRunReport;
use crate::output::summary::ConsolidationSummary;
use std::path::Path;

const RULE_WIDTH: usize = 85;

/// Formats the cross-site consolidation table
pub fn format_report(summaries: &[ConsolidationSummary]) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        "{:<22} | {:<7} | {:<7} | {:<8} | {:<8}\n",
        "WEBSITE", "RAW", "DUPS", "UNIQUE", "W/ PRICE"
    ));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');

    for summary in summaries {
        out.push_str(&format!(
            "{:<22} | {:<7} | {:<7} | {:<8} | {:<8}\n",
            summary.site,
            summary.raw_total,
            summary.duplicates,
            summary.unique_total,
            summary.with_price
        ));
    }

    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

/// Prints the consolidation table, if anything was consolidated
pub fn print_report(summaries: &[ConsolidationSummary], final_dir: &Path) {
    if summaries.is_empty() {
        println!("Nothing to consolidate.");
        return;
    }

    println!();
    print!("{}", format_report(summaries));
    println!(
        "Success! All deduplicated files are in: {}",
        final_dir.display()
    );
}

/// Formats one line per crawled site
pub fn format_crawl_reports(reports: &[SiteRunReport]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<22} | {:<6} | {:<6} | {:<8} | {:<7} | {:<7} | {}\n",
        "WEBSITE", "PAGES", "ITEMS", "RECORDS", "SKIPPED", "BATCHES", "STATUS"
    ));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');

    for report in reports {
        let status = match &report.error {
            None => "ok".to_string(),
            Some(e) => format!("failed in {}: {}", report.phase, e),
        };
        out.push_str(&format!(
            "{:<22} | {:<6} | {:<6} | {:<8} | {:<7} | {:<7} | {}\n",
            report.name,
            report.counts.pages_fetched,
            report.counts.items_dispatched,
            report.records_written,
            report.counts.total_skipped(),
            report.batches_written,
            status
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::summary::DuplicateCount;
    use crate::state::{RunPhase, SiteRunCounts};

    fn summary(site: &str, duplicates: DuplicateCount) -> ConsolidationSummary {
        ConsolidationSummary {
            site: site.to_string(),
            raw_total: 120,
            duplicates,
            unique_total: 117,
            with_price: 101,
            output_path: "final_data/x.csv".into(),
        }
    }

    #[test]
    fn test_report_rows() {
        let report = format_report(&[
            summary("big_bear_engine", DuplicateCount::Count(3)),
            summary("find_it_parts", DuplicateCount::NotApplicable),
        ]);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "=".repeat(85));
        assert_eq!(
            lines[1],
            "WEBSITE                | RAW     | DUPS    | UNIQUE   | W/ PRICE"
        );
        assert_eq!(
            lines[3],
            "big_bear_engine        | 120     | 3       | 117      | 101     "
        );
        assert!(lines[4].starts_with("find_it_parts          | 120     | N/A     |"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_crawl_report_status() {
        let report = SiteRunReport {
            code: "SHOP".to_string(),
            name: "Shop".to_string(),
            phase: RunPhase::Finalize,
            counts: SiteRunCounts {
                pages_fetched: 2,
                items_dispatched: 5,
                items_recorded: 4,
                skipped_fetch: 1,
                ..SiteRunCounts::default()
            },
            records_written: 4,
            batches_written: 2,
            error: Some("HTTP 503".to_string()),
        };

        let text = format_crawl_reports(&[report]);
        assert!(text.contains("Shop"));
        assert!(text.contains("failed in finalize: HTTP 503"));
    }
}
