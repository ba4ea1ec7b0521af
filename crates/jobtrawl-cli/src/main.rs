use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jobtrawl_adapters::DEFAULT_LISTING_URL;
use jobtrawl_collect::{run_collect_once, CollectConfig, DEFAULT_CSV_NAME};
use jobtrawl_report::{run_report_once, ReportConfig, DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME};

#[derive(Debug, Parser)]
#[command(name = "jobtrawl")]
#[command(about = "Scrape remote job listings to CSV and build an Excel report from them")]
struct Cli {
    /// Base directory for relative paths (defaults to $JOBTRAWL_BASE_DIR, then the working directory)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape listing pages in a browser and write a CSV
    Collect(CollectArgs),
    /// Clean a collected CSV and write a three-sheet workbook
    Report(ReportArgs),
}

#[derive(Debug, Parser)]
struct CollectArgs {
    /// Listing URL to scrape
    #[arg(long, default_value = DEFAULT_LISTING_URL)]
    base_url: String,

    /// Number of listing pages to scrape
    #[arg(long, default_value_t = 1)]
    pages: u32,

    /// Seconds to wait between pages
    #[arg(long, default_value_t = 2.0)]
    sleep: f64,

    /// Output CSV path
    #[arg(long, default_value = DEFAULT_CSV_NAME)]
    output: PathBuf,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// WebDriver endpoint (chromedriver)
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Seconds to wait for listing rows to render
    #[arg(long)]
    wait_timeout: Option<u64>,
}

#[derive(Debug, Parser)]
struct ReportArgs {
    /// Input CSV path
    #[arg(long, default_value = DEFAULT_INPUT_NAME)]
    input: PathBuf,

    /// Output Excel path
    #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
    output: PathBuf,
}

fn collect_config(args: CollectArgs, base_dir: Option<PathBuf>) -> Result<CollectConfig> {
    let mut config = CollectConfig::from_env();
    config.base_url = args.base_url;
    config.pages = args.pages;
    config.page_delay = CollectConfig::delay_from_secs(args.sleep)?;
    config.output = args.output;
    config.browser.headless = !args.headed;
    if let Some(url) = args.webdriver_url {
        config.browser.webdriver_url = url;
    }
    if let Some(secs) = args.wait_timeout {
        config.fetch.wait_timeout = Duration::from_secs(secs);
    }
    if let Some(dir) = base_dir {
        config.base_dir = dir;
    }
    config.validate()?;
    Ok(config)
}

fn report_config(args: ReportArgs, base_dir: Option<PathBuf>) -> ReportConfig {
    let mut config = ReportConfig::from_env();
    config.input = args.input;
    config.output = args.output;
    if let Some(dir) = base_dir {
        config.base_dir = dir;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Collect(CollectArgs::parse_from(["collect"])));

    match command {
        Commands::Collect(args) => {
            let config = collect_config(args, cli.base_dir)?;
            let summary = run_collect_once(config).await?;
            println!(
                "collect complete: run_id={} pages={} rows_found={} unique_jobs={} output={} sha256={}",
                summary.run_id,
                summary.pages_scraped,
                summary.rows_found,
                summary.unique_jobs,
                summary.output_path,
                summary.output_sha256
            );
        }
        Commands::Report(args) => {
            let config = report_config(args, cli.base_dir);
            let summary = run_report_once(&config)?;
            println!(
                "report complete: rows={} companies={} locations={} output={}",
                summary.cleaned_rows, summary.companies, summary.locations, summary.output_path
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "jobtrawl",
            "--base-dir",
            "/data",
            "collect",
            "--pages",
            "3",
            "--sleep",
            "0.5",
            "--headed",
        ])
        .unwrap();
        let Some(Commands::Collect(args)) = cli.command else {
            panic!("expected collect");
        };
        let config = collect_config(args, cli.base_dir).unwrap();

        assert_eq!(config.pages, 3);
        assert_eq!(config.page_delay, Duration::from_millis(500));
        assert!(!config.browser.headless);
        assert_eq!(config.output_path(), PathBuf::from("/data/remote_jobs_selenium.csv"));
    }

    #[test]
    fn zero_pages_is_a_configuration_error() {
        let cli = Cli::try_parse_from(["jobtrawl", "collect", "--pages", "0"]).unwrap();
        let Some(Commands::Collect(args)) = cli.command else {
            panic!("expected collect");
        };
        let err = collect_config(args, None).unwrap_err();
        assert!(err.to_string().contains("--pages must be at least 1"));
    }

    #[test]
    fn report_defaults_use_fixed_file_names() {
        let cli = Cli::try_parse_from(["jobtrawl", "report", "--base-dir", "/data"]).unwrap();
        let Some(Commands::Report(args)) = cli.command else {
            panic!("expected report");
        };
        let config = report_config(args, cli.base_dir);

        assert_eq!(config.input_path(), PathBuf::from("/data/remote_jobs_selenium.csv"));
        assert_eq!(config.output_path(), PathBuf::from("/data/remote_jobs_report.xlsx"));
    }

    #[test]
    fn collect_defaults_parse_without_arguments() {
        let args = CollectArgs::parse_from(["collect"]);
        assert_eq!(args.base_url, DEFAULT_LISTING_URL);
        assert_eq!(args.pages, 1);
        assert_eq!(args.sleep, 2.0);
        assert!(!args.headed);
    }
}
