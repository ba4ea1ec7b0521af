//! Flat-file storage and browser session plumbing for jobtrawl.

mod browser;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use jobtrawl_core::{JobRecord, OUTPUT_FIELDS};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

pub use browser::{BrowserConfig, BrowserError, BrowserSession, PageDriver, DEFAULT_USER_AGENT};

pub const CRATE_NAME: &str = "jobtrawl-storage";

#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
    pub sha256: String,
}

/// Header plus string cells, as read from a delimited file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("CSV not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("reading CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Overwrite `path` with the header row and one row per job.
pub fn write_jobs_csv(path: impl AsRef<Path>, jobs: &[JobRecord]) -> anyhow::Result<WrittenFile> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    info!(path = %path.display(), "writing CSV");

    // Headers are written by hand so an empty run still yields the header row.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    writer
        .write_record(OUTPUT_FIELDS)
        .with_context(|| format!("writing header to {}", path.display()))?;
    for job in jobs {
        writer
            .serialize(job)
            .with_context(|| format!("writing row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    drop(writer);

    let bytes = fs::read(path).with_context(|| format!("reading back {}", path.display()))?;
    info!(rows = jobs.len(), "saved rows");
    Ok(WrittenFile {
        path: path.to_path_buf(),
        rows: jobs.len(),
        bytes: bytes.len() as u64,
        sha256: sha256_hex(&bytes),
    })
}

/// Read every cell as text. Short rows are padded with empty cells, long rows truncated.
pub fn read_csv_table(path: impl AsRef<Path>) -> Result<CsvTable, StorageError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StorageError::NotFound(path.to_path_buf()));
    }
    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok(CsvTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn job(title: &str, company: &str, location: &str) -> JobRecord {
        JobRecord {
            title: title.into(),
            company: company.into(),
            location: location.into(),
            salary: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn sha256_is_stable() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn writes_header_and_quotes_embedded_commas() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/out/jobs.csv");
        let jobs = vec![job("Dev", "Acme, Inc.", "Remote"), job("PM", "Beta", "")];

        let written = write_jobs_csv(&path, &jobs).expect("write csv");
        assert_eq!(written.rows, 2);

        let text = fs::read_to_string(&path).expect("read csv");
        assert_eq!(
            text,
            "title,company,location,salary,url\nDev,\"Acme, Inc.\",Remote,,\nPM,Beta,,,\n"
        );
        assert_eq!(written.sha256, sha256_hex(text.as_bytes()));
        assert_eq!(written.bytes, text.len() as u64);
    }

    #[test]
    fn empty_run_still_writes_header_and_overwrites() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("jobs.csv");
        fs::write(&path, "stale contents\n").expect("seed");

        write_jobs_csv(&path, &[]).expect("write csv");
        assert_eq!(
            fs::read_to_string(&path).expect("read csv"),
            "title,company,location,salary,url\n"
        );
    }

    #[test]
    fn reader_pads_short_rows() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("jobs.csv");
        fs::write(&path, "title,company,location\nDev,Acme\n\"Multi\nline\",Beta,Remote\n")
            .expect("seed");

        let table = read_csv_table(&path).expect("read");
        assert_eq!(table.headers, vec!["title", "company", "location"]);
        assert_eq!(table.rows[0], vec!["Dev", "Acme", ""]);
        assert_eq!(table.rows[1], vec!["Multi\nline", "Beta", "Remote"]);
    }

    #[test]
    fn reader_reports_missing_file() {
        let dir = tempdir().expect("tempdir");
        let err = read_csv_table(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
