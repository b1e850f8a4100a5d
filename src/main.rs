//! Part-Sweep main entry point
//!
//! This is the command-line interface for the Part-Sweep listing harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use part_sweep::config::{load_config_with_hash, Config, ItemSource, Pagination, SiteConfig};
use part_sweep::crawler::{crawl, SiteRunReport};
use part_sweep::logging::setup_logging;
use part_sweep::output::{
    consolidate, format_crawl_reports, generate_markdown_summary, print_report, RunSummary,
};
use std::path::PathBuf;

/// Part-Sweep: a batched product-listing harvester
///
/// Part-Sweep crawls the listing pages of configured e-commerce sites,
/// extracts one record per item page, stores records in fixed-size batch
/// files and consolidates them into one deduplicated file per site.
#[derive(Parser, Debug)]
#[command(name = "part-sweep")]
#[command(version)]
#[command(about = "A batched product-listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the given sites
    Crawl {
        /// Site codes, as configured (case-insensitive)
        #[arg(value_name = "SITE", required = true)]
        sites: Vec<String>,

        /// Consolidate the crawled sites afterwards
        #[arg(long)]
        consolidate: bool,

        /// Validate config and show what would be crawled without crawling
        #[arg(long, conflicts_with = "consolidate")]
        dry_run: bool,
    },

    /// Merge batch files into one deduplicated file per site
    Consolidate {
        /// Site codes; every configured site when omitted
        #[arg(value_name = "SITE")]
        sites: Vec<String>,
    },

    /// List configured sites
    Sites,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let site_names: Vec<String> = config.sites.iter().map(|s| s.name.clone()).collect();
    let _log_guards = setup_logging(cli.verbose, cli.quiet, &config.run.log_dir, &site_names)
        .context("Failed to set up logging")?;

    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    match cli.command {
        Command::Crawl {
            sites,
            consolidate: then_consolidate,
            dry_run,
        } => {
            if dry_run {
                handle_dry_run(&config, &sites)?;
            } else {
                handle_crawl(&config, &config_hash, &sites, then_consolidate).await?;
            }
        }
        Command::Consolidate { sites } => {
            handle_consolidate(&config, &config_hash, &sites, Vec::new())?;
        }
        Command::Sites => handle_sites(&config),
    }

    Ok(())
}

/// Handles `crawl --dry-run`: validates the request and shows the plan
fn handle_dry_run(config: &Config, codes: &[String]) -> anyhow::Result<()> {
    let sites = config.resolve_sites(codes)?;

    println!("=== Part-Sweep Dry Run ===\n");
    println!("Run period: {}", config.run.period);
    println!("Max parallel sites: {}", config.run.max_parallel_sites);
    println!();

    for site in &sites {
        print_site_plan(config, site);
    }

    println!("✓ Configuration is valid");
    println!("✓ Would crawl {} site(s)", sites.len());
    Ok(())
}

fn print_site_plan(config: &Config, site: &SiteConfig) {
    println!("{} ({}):", site.name, site.code);
    println!("  Batch size: {}", site.batch_size);
    println!("  Workers: {}", site.workers);
    println!("  Batch directory: {}", config.run.batch_dir(&site.name).display());

    match site.item_source() {
        ItemSource::Manifest(manifest) => {
            println!(
                "  Source: manifest {} (column '{}')",
                manifest.path.display(),
                manifest.column
            );
        }
        ItemSource::Listing => {
            let style = match &site.pagination {
                Pagination::Template => "template".to_string(),
                Pagination::PathSuffix { suffix } => format!("path-suffix '{}'", suffix),
                Pagination::Single => "single page".to_string(),
            };
            println!("  Pagination: {} (max {} pages)", style, site.max_pages);
            if let Some(discovery) = &site.discovery {
                println!("  Discovery: {}", discovery.url);
            }
            println!("  Categories ({}):", site.categories.len());
            for category in &site.categories {
                match &category.name {
                    Some(name) => println!("    * {} - {}", name, category.url),
                    None => println!("    * {}", category.url),
                }
            }
        }
    }
    println!();
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    codes: &[String],
    then_consolidate: bool,
) -> anyhow::Result<()> {
    let reports = crawl(config, codes).await?;

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    if failed == 0 {
        tracing::info!("All {} site(s) completed", reports.len());
    } else {
        tracing::warn!("{} of {} site(s) stopped early", failed, reports.len());
    }

    println!();
    print!("{}", format_crawl_reports(&reports));

    if then_consolidate {
        let codes: Vec<String> = reports.iter().map(|r| r.code.clone()).collect();
        handle_consolidate(config, config_hash, &codes, reports)?;
    }
    Ok(())
}

/// Handles consolidation, printing the report and writing the summary
fn handle_consolidate(
    config: &Config,
    config_hash: &str,
    codes: &[String],
    crawls: Vec<SiteRunReport>,
) -> anyhow::Result<()> {
    let summaries = consolidate(config, codes)?;
    print_report(&summaries, &config.run.final_dir);

    if let Some(path) = &config.run.summary_path {
        let mut summary = RunSummary::new(config.run.period.clone(), config_hash);
        summary.sites = summaries;
        summary.crawls = crawls;

        match generate_markdown_summary(&summary, path) {
            Ok(()) => println!("✓ Summary written to: {}", path.display()),
            Err(e) => tracing::error!("Failed to write summary {}: {}", path.display(), e),
        }
    }
    Ok(())
}

/// Handles `sites`: lists the configured sites
fn handle_sites(config: &Config) {
    println!("{:<16} {:<28} {:<10} {}", "CODE", "NAME", "SOURCE", "BATCH/WORKERS");
    for site in &config.sites {
        let source = match site.item_source() {
            ItemSource::Manifest(_) => "manifest",
            ItemSource::Listing => "listing",
        };
        println!(
            "{:<16} {:<28} {:<10} {}/{}",
            site.code, site.name, source, site.batch_size, site.workers
        );
    }
}
