use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use jobtrawl_core::{CompanySummary, LocationSummary};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::warn;

use crate::JobTable;

pub const RAW_DATA_SHEET: &str = "Raw_Data";
pub const BY_COMPANY_SHEET: &str = "By_Company";
pub const BY_LOCATION_SHEET: &str = "By_Location";

/// Excel rejects longer strings in a single cell.
pub const MAX_CELL_CHARS: usize = 32_767;

enum Cell<'a> {
    Text(&'a str),
    Count(usize),
}

fn row_num(index: usize) -> Result<u32> {
    u32::try_from(index).context("row index exceeds worksheet limits")
}

fn col_num(index: usize) -> Result<u16> {
    u16::try_from(index).context("column index exceeds worksheet limits")
}

/// Cut `text` to at most [`MAX_CELL_CHARS`] characters on a char boundary.
fn fit_cell(text: &str) -> Option<&str> {
    text.char_indices()
        .nth(MAX_CELL_CHARS)
        .map(|(end, _)| &text[..end])
}

fn write_text(sheet: &mut Worksheet, name: &str, row: u32, col: u16, text: &str) -> Result<()> {
    let text = match fit_cell(text) {
        Some(cut) => {
            warn!(
                sheet = name,
                row,
                col,
                chars = text.chars().count(),
                "truncating cell to {MAX_CELL_CHARS} characters"
            );
            cut
        }
        None => text,
    };
    sheet
        .write_string(row, col, text)
        .with_context(|| format!("writing {name} row {row}"))?;
    Ok(())
}

fn write_sheet<'a, H, R>(
    sheet: &mut Worksheet,
    name: &str,
    headers: &[H],
    rows: R,
    header_format: &Format,
) -> Result<()>
where
    H: AsRef<str>,
    R: IntoIterator<Item = Vec<Cell<'a>>>,
{
    sheet
        .set_name(name)
        .with_context(|| format!("naming sheet {name}"))?;
    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col_num(col)?, header.as_ref(), header_format)
            .with_context(|| format!("writing {name} header"))?;
    }
    for (idx, cells) in rows.into_iter().enumerate() {
        let row = row_num(idx + 1)?;
        for (col, cell) in cells.into_iter().enumerate() {
            let col = col_num(col)?;
            match cell {
                Cell::Text(text) => write_text(sheet, name, row, col, text)?,
                Cell::Count(count) => {
                    sheet
                        .write_number(row, col, count as f64)
                        .with_context(|| format!("writing {name} row {row}"))?;
                }
            }
        }
    }
    Ok(())
}

/// Write the cleaned rows and both summaries as three sheets, replacing any file at `path`.
pub fn write_report(
    table: &JobTable,
    by_company: &[CompanySummary],
    by_location: &[LocationSummary],
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }

    let header_format = Format::new().set_bold();
    let mut workbook = Workbook::new();

    write_sheet(
        workbook.add_worksheet(),
        RAW_DATA_SHEET,
        table.columns(),
        table
            .rows()
            .iter()
            .map(|row| row.iter().map(|v| Cell::Text(v.as_str())).collect::<Vec<_>>()),
        &header_format,
    )?;
    write_sheet(
        workbook.add_worksheet(),
        BY_COMPANY_SHEET,
        &["company", "jobs_count", "locations"],
        by_company.iter().map(|s| {
            vec![
                Cell::Text(s.company.as_str()),
                Cell::Count(s.jobs_count),
                Cell::Text(s.locations.as_str()),
            ]
        }),
        &header_format,
    )?;
    write_sheet(
        workbook.add_worksheet(),
        BY_LOCATION_SHEET,
        &["location", "jobs_count", "companies"],
        by_location.iter().map(|s| {
            vec![
                Cell::Text(s.location.as_str()),
                Cell::Count(s.jobs_count),
                Cell::Text(s.companies.as_str()),
            ]
        }),
        &header_format,
    )?;

    workbook
        .save(path)
        .with_context(|| format!("saving workbook {}", path.display()))?;
    Ok(())
}
