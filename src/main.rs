mod api;
mod config;
mod discover;
mod endpoints;
mod extract;
mod fetch;
mod report;
mod survey;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use url::Url;

use config::RunConfig;
use extract::dataset::DatasetRecord;
use fetch::Fetcher;

#[derive(Parser)]
#[command(name = "hko_scraper", about = "Hong Kong Observatory open-data scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover dataset pages, scrape them and write reports
    Run {
        /// Max datasets to scrape (default: all discovered)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Directory for report files (default: from config)
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// Scrape the full dataset inventory through the portal's CKAN API
    Api {
        /// Max datasets to fetch details for (default: all listed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Directory for report files (default: from config)
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// Analyze a saved portal HTML page offline
    Inspect {
        /// Path to the HTML file
        file: PathBuf,
    },
    /// Check the portal's known API endpoints
    Endpoints,
    /// Survey the agency website for data pages
    Survey,
    /// Filter a JSON report down to keyword-matching datasets
    Filter {
        /// JSON report produced by a previous run
        report: PathBuf,
        /// Keyword to match (repeatable; defaults to the built-in weather list)
        #[arg(short, long = "keyword")]
        keyword: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { limit, output_dir } => {
            let mut cfg = RunConfig::load()?;
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            let fetcher = Fetcher::new(&cfg)?;
            let base = Url::parse(&cfg.base_url)?;

            let mut candidates = discover::discover(&fetcher, &cfg, &base).await;
            if candidates.is_empty() {
                println!("No dataset pages found. The portal may have changed.");
                return Ok(());
            }
            if let Some(limit) = limit {
                candidates.truncate(limit);
            }

            println!("Scraping {} dataset pages...", candidates.len());
            let records = scrape_candidates(&fetcher, &cfg, &base, &candidates).await;
            info!("Scraping completed. Found {} datasets.", records.len());

            let dir = report::ensure_output_dir(&cfg.output_dir)?;
            let stamp = report::timestamp();
            let files = report::write_run_reports(&dir, &stamp, &records, &cfg)?;

            println!(
                "Scraped {} of {} dataset pages.",
                records.len(),
                candidates.len()
            );
            for file in files {
                println!("  {}", file.display());
            }
            Ok(())
        }
        Commands::Api { limit, output_dir } => {
            let mut cfg = RunConfig::load()?;
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            let fetcher = Fetcher::new(&cfg)?;

            let datasets = api::scrape(&fetcher, &cfg, limit).await?;
            if datasets.is_empty() {
                println!("No datasets found. Please check the API endpoints.");
                return Ok(());
            }
            info!("Scraping completed. Found {} datasets.", datasets.len());

            let dir = report::ensure_output_dir(&cfg.output_dir)?;
            let stamp = report::timestamp();
            let files = report::write_api_reports(&dir, &stamp, &datasets, &cfg)?;

            println!("Scraped {} datasets via the CKAN API.", datasets.len());
            for file in files {
                println!("  {}", file.display());
            }
            Ok(())
        }
        Commands::Inspect { file } => {
            let cfg = RunConfig::load()?;
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let base = Url::parse(&cfg.base_url)?;
            let page = extract::page::inspect(&html, &base);

            let dir = report::ensure_output_dir(&cfg.output_dir)?;
            let stamp = report::timestamp();
            let source = file.display().to_string();
            let files = report::write_inspection_reports(&dir, &stamp, &page, &source)?;

            let nav_links = page.navigation.main_menu.len()
                + page.navigation.category_links.len()
                + page.navigation.provider_links.len();
            println!("Analyzed {}:", file.display());
            println!("  Title: {}", page.metadata.title);
            println!("  Navigation links: {nav_links}");
            println!("  Search filters: {}", page.search.filters.len());
            for file in files {
                println!("  {}", file.display());
            }
            Ok(())
        }
        Commands::Endpoints => {
            let cfg = RunConfig::load()?;
            let fetcher = Fetcher::new(&cfg)?;
            let checks = endpoints::check_all(&fetcher, &cfg).await;

            let dir = report::ensure_output_dir(&cfg.output_dir)?;
            let stamp = report::timestamp();
            let files = report::write_endpoint_reports(&dir, &stamp, &checks)?;

            let ok = checks
                .iter()
                .filter(|c| c.status == endpoints::CheckStatus::Success)
                .count();
            println!(
                "Checked {} endpoints: {} reachable, {} failed.",
                checks.len(),
                ok,
                checks.len() - ok
            );
            for file in files {
                println!("  {}", file.display());
            }
            Ok(())
        }
        Commands::Survey => {
            let cfg = RunConfig::load()?;
            let fetcher = Fetcher::new(&cfg)?;
            let findings = survey::survey(&fetcher, &cfg).await;

            let dir = report::ensure_output_dir(&cfg.output_dir)?;
            let stamp = report::timestamp();
            let file = report::write_survey_report(&dir, &stamp, &findings, &cfg)?;

            println!(
                "Found {} data-related pages and {} data links.",
                findings.pages.len(),
                findings.links.len()
            );
            println!("  {}", file.display());
            Ok(())
        }
        Commands::Filter { report: source, keyword } => {
            let cfg = RunConfig::load()?;
            let records = report::load_records(&source)?;

            let keywords: Vec<&str> = if keyword.is_empty() {
                report::FILTER_KEYWORDS.to_vec()
            } else {
                keyword.iter().map(String::as_str).collect()
            };
            let kept = report::filter_records(&records, &keywords);

            let dir = report::ensure_output_dir(&cfg.output_dir)?;
            let stamp = report::timestamp();
            let files = report::write_filtered_reports(&dir, &stamp, &kept)?;

            println!("Matched {} of {} datasets.", kept.len(), records.len());
            for file in files {
                println!("  {}", file.display());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape_candidates(
    fetcher: &Fetcher,
    cfg: &RunConfig,
    base: &Url,
    candidates: &[String],
) -> Vec<DatasetRecord> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(candidates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut records = Vec::new();
    for url in candidates {
        match fetcher.fetch_ok(url).await {
            Some(page) => records.push(extract::dataset::extract_dataset(
                url,
                &page.raw_body,
                base,
                &cfg.organization,
            )),
            None => warn!("Failed to scrape dataset: {}", url),
        }
        pb.inc(1);
        tokio::time::sleep(Duration::from_millis(cfg.request_delay_ms)).await;
    }
    pb.finish_and_clear();
    records
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
