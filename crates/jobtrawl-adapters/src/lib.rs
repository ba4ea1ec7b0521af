//! Listing layout adapters: page URLs, render waits, and best-effort row extraction.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobtrawl_core::{collapse_whitespace, JobRecord};
use jobtrawl_storage::{BrowserError, PageDriver};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const CRATE_NAME: &str = "jobtrawl-adapters";

pub const DEFAULT_LISTING_URL: &str = "https://remoteok.com/remote-dev-jobs";

/// Present once the listing has rendered at least one row.
const READY_SELECTOR: &str = "tr.job, tr[data-id]";
const ROW_SELECTOR: &str = "tr.job, tr[data-id][data-href]";
const TITLE_SELECTOR: &str =
    "td.company.position.company_and_position h2[itemprop='title'], h2[itemprop='title']";
const COMPANY_SELECTOR: &str =
    "td.company.position.company_and_position h3[itemprop='name'], h3[itemprop='name']";
const LOCATION_SELECTOR: &str = "div.location";
const SALARY_SELECTOR: &str = "div.salary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

/// Rows matched on one page and the jobs that survived extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    pub rows_found: usize,
    pub jobs: Vec<JobRecord>,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub wait_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("invalid listing url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("loading {url}: {source}")]
    Browser {
        url: String,
        #[source]
        source: BrowserError,
    },
}

#[async_trait]
pub trait ListingAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// URL of the 1-based listing page `page`.
    fn listing_url(&self, page: u32) -> String;

    async fn fetch_listing(
        &self,
        driver: &dyn PageDriver,
        options: &FetchOptions,
        url: &str,
    ) -> Result<FetchedPage, AdapterError>;

    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingPage, AdapterError>;
}

/// RemoteOK-style table layout: one `tr.job` per posting.
#[derive(Debug, Clone)]
pub struct RemoteOkAdapter {
    base_url: String,
    parsed_base: Url,
    origin: String,
    selectors: RowSelectors,
}

impl RemoteOkAdapter {
    pub fn new(base_url: &str) -> Result<Self, AdapterError> {
        let parsed_base = Url::parse(base_url).map_err(|source| AdapterError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let origin = parsed_base.origin().ascii_serialization();
        Ok(Self {
            base_url: base_url.to_string(),
            parsed_base,
            origin,
            selectors: RowSelectors::compile()?,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn qualify_href(&self, href: &str) -> String {
        if href.starts_with('/') {
            format!("{}{}", self.origin, href)
        } else {
            String::new()
        }
    }

    fn extract_row(&self, row: ElementRef<'_>) -> JobRecord {
        let selectors = &self.selectors;
        let href = non_empty_attr(row, "data-href")
            .or_else(|| non_empty_attr(row, "data-url"))
            .unwrap_or_default();
        JobRecord {
            title: first_text(row, &selectors.title),
            company: first_text(row, &selectors.company),
            location: first_text(row, &selectors.location),
            salary: first_text(row, &selectors.salary),
            url: self.qualify_href(href),
        }
    }
}

pub fn remoteok_adapter(base_url: &str) -> Result<RemoteOkAdapter, AdapterError> {
    RemoteOkAdapter::new(base_url)
}

#[derive(Debug, Clone)]
struct RowSelectors {
    row: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    salary: Selector,
}

impl RowSelectors {
    fn compile() -> Result<Self, AdapterError> {
        Ok(Self {
            row: parse_selector(ROW_SELECTOR)?,
            title: parse_selector(TITLE_SELECTOR)?,
            company: parse_selector(COMPANY_SELECTOR)?,
            location: parse_selector(LOCATION_SELECTOR)?,
            salary: parse_selector(SALARY_SELECTOR)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Text of the first descendant matching `selector`; empty when nothing matches.
fn first_text(row: ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|node| collapse_whitespace(&node.text().collect::<String>()))
        .unwrap_or_default()
}

fn non_empty_attr<'a>(row: ElementRef<'a>, attr: &str) -> Option<&'a str> {
    row.value().attr(attr).filter(|v| !v.is_empty())
}

fn is_skipped_row(row: ElementRef<'_>) -> bool {
    let classes = row.value().attr("class").unwrap_or_default();
    classes.contains("closed") || classes.contains("expand")
}

#[async_trait]
impl ListingAdapter for RemoteOkAdapter {
    fn source_id(&self) -> &'static str {
        "remoteok"
    }

    fn listing_url(&self, page: u32) -> String {
        if page <= 1 {
            return self.base_url.clone();
        }
        let mut url = self.parsed_base.clone();
        url.query_pairs_mut().append_pair("pg", &page.to_string());
        url.to_string()
    }

    async fn fetch_listing(
        &self,
        driver: &dyn PageDriver,
        options: &FetchOptions,
        url: &str,
    ) -> Result<FetchedPage, AdapterError> {
        let browser_err = |source| AdapterError::Browser {
            url: url.to_string(),
            source,
        };
        driver.goto(url).await.map_err(browser_err)?;
        driver
            .wait_for_any(READY_SELECTOR, options.wait_timeout)
            .await
            .map_err(browser_err)?;
        if !options.settle_delay.is_zero() {
            tokio::time::sleep(options.settle_delay).await;
        }
        let html = driver.page_source().await.map_err(browser_err)?;
        Ok(FetchedPage {
            url: url.to_string(),
            html,
            fetched_at: Utc::now(),
        })
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingPage, AdapterError> {
        let document = Html::parse_document(&page.html);

        let mut listing = ListingPage::default();
        for row in document.select(&self.selectors.row) {
            listing.rows_found += 1;
            if is_skipped_row(row) {
                debug!(url = %page.url, "skipping closed or expansion row");
                continue;
            }
            let job = self.extract_row(row);
            if job.is_anonymous() {
                debug!(url = %page.url, "skipping row without title or company");
                continue;
            }
            listing.jobs.push(job);
        }

        info!(url = %page.url, rows = listing.rows_found, "found job rows");
        info!(valid = listing.jobs.len(), "extracted valid jobs from page");
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> FetchedPage {
        FetchedPage {
            url: DEFAULT_LISTING_URL.to_string(),
            html: html.to_string(),
            fetched_at: Utc::now(),
        }
    }

    fn table(rows: &str) -> String {
        format!("<html><body><table id=\"jobsboard\"><tbody>{rows}</tbody></table></body></html>")
    }

    #[test]
    fn first_page_is_verbatim_and_later_pages_add_pg() {
        let adapter = remoteok_adapter(DEFAULT_LISTING_URL).unwrap();
        assert_eq!(adapter.listing_url(1), DEFAULT_LISTING_URL);
        assert_eq!(
            adapter.listing_url(3),
            "https://remoteok.com/remote-dev-jobs?pg=3"
        );

        let filtered = remoteok_adapter("https://remoteok.com/remote-jobs?location=EU").unwrap();
        assert_eq!(
            filtered.listing_url(2),
            "https://remoteok.com/remote-jobs?location=EU&pg=2"
        );
    }

    #[test]
    fn origin_comes_from_base_url() {
        let adapter = remoteok_adapter("http://localhost:8080/jobs").unwrap();
        assert_eq!(adapter.origin(), "http://localhost:8080");
        assert!(matches!(
            remoteok_adapter("not a url"),
            Err(AdapterError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn row_selectors_compile_and_bad_selectors_are_reported() {
        assert!(RowSelectors::compile().is_ok());
        match parse_selector("tr[") {
            Err(AdapterError::InvalidSelector { selector, .. }) => assert_eq!(selector, "tr["),
            other => panic!("expected invalid selector, got {other:?}"),
        }
    }

    #[test]
    fn missing_fields_degrade_to_empty_strings() {
        let adapter = remoteok_adapter(DEFAULT_LISTING_URL).unwrap();
        let html = table(
            r#"<tr class="job" data-href="/j/7"><td><h3 itemprop="name">Acme</h3></td></tr>"#,
        );
        let listing = adapter.parse_listing(&page(&html)).unwrap();
        assert_eq!(listing.rows_found, 1);
        assert_eq!(
            listing.jobs,
            vec![JobRecord {
                title: String::new(),
                company: "Acme".into(),
                location: String::new(),
                salary: String::new(),
                url: "https://remoteok.com/j/7".into(),
            }]
        );
    }

    #[test]
    fn data_url_is_used_when_data_href_is_blank() {
        let adapter = remoteok_adapter(DEFAULT_LISTING_URL).unwrap();
        let html = table(
            r#"<tr class="job" data-href="" data-url="/j/9"><td><h2 itemprop="title">Dev</h2></td></tr>"#,
        );
        let listing = adapter.parse_listing(&page(&html)).unwrap();
        assert_eq!(listing.jobs[0].url, "https://remoteok.com/j/9");
    }

    #[test]
    fn closed_and_anonymous_rows_are_dropped() {
        let adapter = remoteok_adapter(DEFAULT_LISTING_URL).unwrap();
        let html = table(concat!(
            r#"<tr class="job closed" data-href="/j/1"><td><h2 itemprop="title">Old</h2></td></tr>"#,
            r#"<tr class="job" data-href="/j/2"><td><div class="location">Remote</div></td></tr>"#,
            r#"<tr class="job" data-href="/j/3"><td><h2 itemprop="title">New</h2></td></tr>"#,
        ));
        let listing = adapter.parse_listing(&page(&html)).unwrap();
        assert_eq!(listing.rows_found, 3);
        assert_eq!(listing.jobs.len(), 1);
        assert_eq!(listing.jobs[0].title, "New");
    }
}
