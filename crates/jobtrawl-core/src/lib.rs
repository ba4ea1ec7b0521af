//! Core domain model for jobtrawl: the scraped job row and its derived summaries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "jobtrawl-core";

/// Column order of the collector CSV; also the reporter's required column set.
pub const OUTPUT_FIELDS: [&str; 5] = ["title", "company", "location", "salary", "url"];

/// Substituted for a blank location during cleaning.
pub const UNSPECIFIED_LOCATION: &str = "Unspecified";

/// One scraped listing row. Field order is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: String,
    pub url: String,
}

/// Identity used to drop re-listed jobs during collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupeKey {
    Url(String),
    TitleCompany(String, String),
}

impl JobRecord {
    pub fn dedupe_key(&self) -> DedupeKey {
        if self.url.is_empty() {
            DedupeKey::TitleCompany(self.title.clone(), self.company.clone())
        } else {
            DedupeKey::Url(self.url.clone())
        }
    }

    /// True when neither title nor company could be extracted.
    pub fn is_anonymous(&self) -> bool {
        self.title.is_empty() && self.company.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub company: String,
    pub jobs_count: usize,
    pub locations: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub location: String,
    pub jobs_count: usize,
    pub companies: String,
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Absolute paths pass through; relative ones are anchored at `base_dir`.
pub fn resolve_path(base_dir: impl AsRef<Path>, value: impl AsRef<Path>) -> PathBuf {
    let value = value.as_ref();
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base_dir.as_ref().join(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, company: &str, url: &str) -> JobRecord {
        JobRecord {
            title: title.into(),
            company: company.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn dedupe_key_prefers_url() {
        assert_eq!(
            job("Dev", "Acme", "https://remoteok.com/j/1").dedupe_key(),
            DedupeKey::Url("https://remoteok.com/j/1".into())
        );
        assert_eq!(
            job("Dev", "Acme", "").dedupe_key(),
            DedupeKey::TitleCompany("Dev".into(), "Acme".into())
        );
    }

    #[test]
    fn anonymous_requires_both_title_and_company_empty() {
        assert!(job("", "", "u").is_anonymous());
        assert!(!job("Dev", "", "").is_anonymous());
        assert!(!job("", "Acme", "").is_anonymous());
    }

    #[test]
    fn whitespace_is_collapsed_and_trimmed() {
        assert_eq!(collapse_whitespace("  Senior \n\t Rust   Dev "), "Senior Rust Dev");
        assert_eq!(collapse_whitespace(" \n "), "");
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/jobs");
        assert_eq!(
            resolve_path(base, "out/jobs.csv"),
            PathBuf::from("/srv/jobs/out/jobs.csv")
        );
        assert_eq!(resolve_path(base, "/tmp/jobs.csv"), PathBuf::from("/tmp/jobs.csv"));
    }
}
