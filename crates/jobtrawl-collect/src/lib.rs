//! Collector pipeline: paginate a listing, dedupe rows, write one CSV.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jobtrawl_adapters::{remoteok_adapter, FetchOptions, ListingAdapter, DEFAULT_LISTING_URL};
use jobtrawl_core::{resolve_path, DedupeKey, JobRecord};
use jobtrawl_storage::{write_jobs_csv, BrowserConfig, BrowserSession, PageDriver, DEFAULT_USER_AGENT};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "jobtrawl-collect";

pub const DEFAULT_CSV_NAME: &str = "remote_jobs_selenium.csv";

#[derive(Debug, Error, PartialEq)]
pub enum CollectError {
    #[error("--pages must be at least 1 (got {0})")]
    InvalidPages(u32),
    #[error("--sleep must be a non-negative number of seconds (got {0})")]
    InvalidDelay(f64),
}

#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub base_url: String,
    pub pages: u32,
    pub page_delay: Duration,
    pub output: PathBuf,
    pub base_dir: PathBuf,
    pub browser: BrowserConfig,
    pub fetch: FetchOptions,
}

impl CollectConfig {
    pub fn from_env() -> Self {
        let fetch_defaults = FetchOptions::default();
        Self {
            base_url: DEFAULT_LISTING_URL.to_string(),
            pages: 1,
            page_delay: Duration::from_secs(2),
            output: PathBuf::from(DEFAULT_CSV_NAME),
            base_dir: std::env::var("JOBTRAWL_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            browser: BrowserConfig {
                webdriver_url: std::env::var("JOBTRAWL_WEBDRIVER_URL")
                    .unwrap_or_else(|_| "http://localhost:9515".to_string()),
                headless: true,
                user_agent: std::env::var("JOBTRAWL_USER_AGENT")
                    .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
                ..Default::default()
            },
            fetch: FetchOptions {
                wait_timeout: std::env::var("JOBTRAWL_WAIT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(fetch_defaults.wait_timeout),
                settle_delay: std::env::var("JOBTRAWL_SETTLE_MILLIS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(fetch_defaults.settle_delay),
            },
        }
    }

    /// Convert a CLI `--sleep` value in seconds.
    pub fn delay_from_secs(secs: f64) -> Result<Duration, CollectError> {
        Duration::try_from_secs_f64(secs).map_err(|_| CollectError::InvalidDelay(secs))
    }

    pub fn validate(&self) -> Result<(), CollectError> {
        if self.pages < 1 {
            return Err(CollectError::InvalidPages(self.pages));
        }
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.output)
    }
}

/// Running set of dedupe keys; the first job seen under a key wins.
#[derive(Debug, Default)]
pub struct JobDeduper {
    seen: HashSet<DedupeKey>,
}

impl JobDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, job: &JobRecord) -> bool {
        self.seen.insert(job.dedupe_key())
    }

    /// Move unseen jobs from `page_jobs` into `out`, returning how many were added.
    pub fn extend_unique(&mut self, out: &mut Vec<JobRecord>, page_jobs: Vec<JobRecord>) -> usize {
        let before = out.len();
        out.extend(page_jobs.into_iter().filter(|job| self.admit(job)));
        out.len() - before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedJobs {
    pub pages_scraped: u32,
    pub rows_found: usize,
    pub jobs: Vec<JobRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_scraped: u32,
    pub rows_found: usize,
    pub unique_jobs: usize,
    pub output_path: String,
    pub output_sha256: String,
}

pub struct CollectPipeline {
    config: CollectConfig,
    adapter: Box<dyn ListingAdapter>,
}

impl CollectPipeline {
    pub fn new(config: CollectConfig) -> Result<Self> {
        config.validate()?;
        let adapter = remoteok_adapter(&config.base_url)?;
        Ok(Self {
            config,
            adapter: Box::new(adapter),
        })
    }

    /// Walk pages `1..=pages`, sleeping between pages but not after the last one.
    pub async fn collect(&self, driver: &dyn PageDriver) -> Result<CollectedJobs> {
        let pages = self.config.pages;
        let mut deduper = JobDeduper::new();
        let mut collected = CollectedJobs::default();

        for page in 1..=pages {
            let url = self.adapter.listing_url(page);
            let span = info_span!("collect_page", page, pages, source = self.adapter.source_id());
            async {
                info!(%url, "scraping page {page}/{pages}");
                let fetched = self
                    .adapter
                    .fetch_listing(driver, &self.config.fetch, &url)
                    .await?;
                let listing = self.adapter.parse_listing(&fetched)?;
                info!(jobs = listing.jobs.len(), "page {page} returned jobs");

                collected.rows_found += listing.rows_found;
                deduper.extend_unique(&mut collected.jobs, listing.jobs);
                collected.pages_scraped += 1;
                anyhow::Ok(())
            }
            .instrument(span)
            .await?;

            if page < pages && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }

        info!(unique = collected.jobs.len(), "total unique jobs collected");
        Ok(collected)
    }

    /// Collect, then close the driver whether or not collection succeeded.
    pub async fn collect_and_close(&self, driver: &dyn PageDriver) -> Result<CollectedJobs> {
        let result = self.collect(driver).await;
        if let Err(err) = driver.close().await {
            warn!(error = %err, "failed to close browser session");
        }
        result
    }

    /// Collect through `driver`, close it, then write the CSV. A failed collection writes nothing.
    pub async fn run_with_driver(&self, driver: &dyn PageDriver) -> Result<CollectRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let collected = self.collect_and_close(driver).await?;

        let output_path = self.config.output_path();
        let written = write_jobs_csv(&output_path, &collected.jobs)
            .with_context(|| format!("saving jobs to {}", output_path.display()))?;

        Ok(CollectRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            pages_scraped: collected.pages_scraped,
            rows_found: collected.rows_found,
            unique_jobs: collected.jobs.len(),
            output_path: written.path.display().to_string(),
            output_sha256: written.sha256,
        })
    }

    pub async fn run_once(&self) -> Result<CollectRunSummary> {
        let session = BrowserSession::connect(&self.config.browser).await?;
        self.run_with_driver(&session).await
    }
}

pub async fn run_collect_once(config: CollectConfig) -> Result<CollectRunSummary> {
    CollectPipeline::new(config)?.run_once().await
}
