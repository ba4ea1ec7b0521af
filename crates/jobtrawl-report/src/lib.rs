//! Reporter pipeline: load the collector CSV, clean it, summarize it, write a workbook.

mod workbook;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use jobtrawl_core::{
    collapse_whitespace, resolve_path, CompanySummary, LocationSummary, OUTPUT_FIELDS,
    UNSPECIFIED_LOCATION,
};
use jobtrawl_storage::{read_csv_table, StorageError};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub use workbook::{write_report, BY_COMPANY_SHEET, BY_LOCATION_SHEET, RAW_DATA_SHEET};

pub const CRATE_NAME: &str = "jobtrawl-report";

pub const DEFAULT_INPUT_NAME: &str = "remote_jobs_selenium.csv";
pub const DEFAULT_OUTPUT_NAME: &str = "remote_jobs_report.xlsx";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV not found: {}", .path.display())]
    InputNotFound { path: PathBuf },
    #[error("CSV is missing required columns: {missing:?}")]
    MissingColumns { missing: Vec<String> },
    #[error(transparent)]
    Read(StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredColumns {
    title: usize,
    company: usize,
    location: usize,
    salary: usize,
    url: usize,
}

impl RequiredColumns {
    fn all(&self) -> [usize; 5] {
        [self.title, self.company, self.location, self.salary, self.url]
    }
}

/// Job rows as loaded from CSV: all original columns, the five required ones located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    required: RequiredColumns,
}

impl JobTable {
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, ReportError> {
        let position = |name: &str| columns.iter().position(|c| c == name);
        let mut missing = OUTPUT_FIELDS
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            missing.sort();
            return Err(ReportError::MissingColumns { missing });
        }

        let required = RequiredColumns {
            title: position("title").unwrap_or_default(),
            company: position("company").unwrap_or_default(),
            location: position("location").unwrap_or_default(),
            salary: position("salary").unwrap_or_default(),
            url: position("url").unwrap_or_default(),
        };
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Ok(Self {
            columns,
            rows,
            required,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn title(&self, row: usize) -> &str {
        &self.rows[row][self.required.title]
    }

    pub fn company(&self, row: usize) -> &str {
        &self.rows[row][self.required.company]
    }

    pub fn location(&self, row: usize) -> &str {
        &self.rows[row][self.required.location]
    }

    pub fn url(&self, row: usize) -> &str {
        &self.rows[row][self.required.url]
    }
}

/// Read `path` and check that every required column is present.
pub fn load_jobs(path: impl AsRef<Path>) -> Result<JobTable, ReportError> {
    let path = path.as_ref();
    let table = read_csv_table(path).map_err(|err| match err {
        StorageError::NotFound(path) => ReportError::InputNotFound { path },
        other => ReportError::Read(other),
    })?;
    JobTable::from_parts(table.headers, table.rows)
}

/// Normalize required text columns, drop unusable and duplicate rows.
pub fn clean_jobs(table: JobTable) -> JobTable {
    let JobTable {
        columns,
        rows,
        required,
    } = table;

    let mut seen = HashSet::new();
    let rows = rows
        .into_iter()
        .filter_map(|mut row| {
            for idx in required.all() {
                row[idx] = collapse_whitespace(&row[idx]);
            }
            if row[required.title].is_empty() || row[required.company].is_empty() {
                return None;
            }
            if row[required.location].is_empty() {
                row[required.location] = UNSPECIFIED_LOCATION.to_string();
            }
            let key = (
                row[required.title].clone(),
                row[required.company].clone(),
                row[required.location].clone(),
                row[required.url].clone(),
            );
            seen.insert(key).then_some(row)
        })
        .collect();

    JobTable {
        columns,
        rows,
        required,
    }
}

/// Distinct non-empty values, sorted, joined with `", "`.
pub fn join_unique<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ")
}

fn group_by<'a>(
    table: &'a JobTable,
    key: impl Fn(usize) -> &'a str,
    member: impl Fn(usize) -> &'a str,
) -> Vec<(String, usize, String)> {
    let mut groups: BTreeMap<&str, (usize, Vec<&str>)> = BTreeMap::new();
    for row in 0..table.len() {
        let entry = groups.entry(key(row)).or_default();
        entry.0 += 1;
        entry.1.push(member(row));
    }

    let mut out = groups
        .into_iter()
        .map(|(label, (count, members))| (label.to_string(), count, join_unique(members)))
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

pub fn summarize_by_company(table: &JobTable) -> Vec<CompanySummary> {
    group_by(table, |row| table.company(row), |row| table.location(row))
        .into_iter()
        .map(|(company, jobs_count, locations)| CompanySummary {
            company,
            jobs_count,
            locations,
        })
        .collect()
}

pub fn summarize_by_location(table: &JobTable) -> Vec<LocationSummary> {
    group_by(table, |row| table.location(row), |row| table.company(row))
        .into_iter()
        .map(|(location, jobs_count, companies)| LocationSummary {
            location,
            jobs_count,
            companies,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub base_dir: PathBuf,
}

impl ReportConfig {
    pub fn from_env() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT_NAME),
            output: PathBuf::from(DEFAULT_OUTPUT_NAME),
            base_dir: std::env::var("JOBTRAWL_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn input_path(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.input)
    }

    pub fn output_path(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.output)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRunSummary {
    pub input_path: String,
    pub output_path: String,
    pub cleaned_rows: usize,
    pub companies: usize,
    pub locations: usize,
}

pub fn run_report_once(config: &ReportConfig) -> Result<ReportRunSummary> {
    let input_path = config.input_path();
    let output_path = config.output_path();

    info!(path = %input_path.display(), "loading data");
    let cleaned = clean_jobs(load_jobs(&input_path)?);
    info!(rows = cleaned.len(), "jobs after cleaning");
    if cleaned.is_empty() {
        warn!(path = %input_path.display(), "no jobs left after cleaning; sheets will hold headers only");
    }

    let by_company = summarize_by_company(&cleaned);
    let by_location = summarize_by_location(&cleaned);

    info!(path = %output_path.display(), "writing report");
    write_report(&cleaned, &by_company, &by_location, &output_path)?;
    info!("excel report generated");

    Ok(ReportRunSummary {
        input_path: input_path.display().to_string(),
        output_path: output_path.display().to_string(),
        cleaned_rows: cleaned.len(),
        companies: by_company.len(),
        locations: by_location.len(),
    })
}
