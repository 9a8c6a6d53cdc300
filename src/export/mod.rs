//! Spreadsheet export of extracted transactions.
//!
//! Rows are sorted oldest first and written with Brazilian decimal commas to
//! a timestamped `dados_extraidos_*` file: CSV (UTF-8 with BOM), XLSX with a
//! flat `Dados` sheet plus an `Árvore` year/month/day sheet, or JSON.

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::ExtractionError;
use crate::importers::Transaction;

pub const COLUMNS: [&str; 5] = ["Data", "Ticker", "Operação", "Quantidade", "Preço"];
pub const TREE_COLUMNS: [&str; 8] = [
    "Ano", "Mes", "Dia", "Data", "Ticker", "Operação", "Quantidade", "Preço",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Xlsx,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" => Ok(OutputFormat::Xlsx),
            "json" => Ok(OutputFormat::Json),
            other => Err(anyhow!(ExtractionError::Config(format!(
                "unsupported output format '{}' (expected csv, xlsx or json)",
                other
            )))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One output line, already formatted for spreadsheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Data")]
    pub date: Option<String>,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Operação")]
    pub side: String,
    #[serde(rename = "Quantidade")]
    pub quantity: String,
    #[serde(rename = "Preço")]
    pub price: String,
}

impl From<&Transaction> for ExportRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            date: tx.date.clone(),
            ticker: tx.ticker.clone(),
            side: tx.side.to_string(),
            quantity: format_quantity(&tx.quantity),
            price: decimal_comma(&tx.price),
        }
    }
}

/// Row of the `Árvore` sheet; period columns are blank when unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub year: String,
    pub month: String,
    pub day: String,
    pub row: ExportRow,
}

/// `24.20` → `24,20`.
pub fn decimal_comma(value: &str) -> String {
    value.replace('.', ",")
}

/// Whole quantities are kept as is; fractional ones get a decimal comma.
pub fn format_quantity(value: &str) -> String {
    match Decimal::from_str(value) {
        Ok(d) if !d.fract().is_zero() => decimal_comma(value),
        _ => value.to_string(),
    }
}

fn parse_date(date: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date?, "%d/%m/%Y").ok()
}

/// Oldest first, undated last, then by ticker. Stable.
pub fn sort_transactions(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        let da = parse_date(a.date.as_deref());
        let db = parse_date(b.date.as_deref());
        let by_date = match (da, db) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_date.then_with(|| a.ticker.cmp(&b.ticker))
    });
}

pub fn tree_rows(rows: &[ExportRow]) -> Vec<TreeRow> {
    let mut previous: Option<NaiveDate> = None;
    rows.iter()
        .map(|row| {
            let date = parse_date(row.date.as_deref());
            let (mut year, mut month, mut day) = (String::new(), String::new(), String::new());
            if let Some(d) = date {
                let prev = previous;
                if prev.map(|p| p.year()) != Some(d.year()) {
                    year = d.year().to_string();
                }
                if prev.map(|p| (p.year(), p.month())) != Some((d.year(), d.month())) {
                    month = format!("{:02}", d.month());
                }
                if prev != Some(d) {
                    day = format!("{:02}", d.day());
                }
            }
            previous = date;
            TreeRow {
                year,
                month,
                day,
                row: row.clone(),
            }
        })
        .collect()
}

/// `dados_extraidos_YYYYMMDD_HHMMSS.<ext>` inside `output_dir`.
pub fn output_path(output_dir: &Path, format: OutputFormat) -> PathBuf {
    output_dir.join(format!(
        "dados_extraidos_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

/// Sort and write `transactions`; nothing is written for an empty set.
pub fn export<P: AsRef<Path>>(
    transactions: &[Transaction],
    format: OutputFormat,
    output_dir: P,
) -> Result<Option<PathBuf>> {
    if transactions.is_empty() {
        warn!("No data to export");
        return Ok(None);
    }

    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output folder {:?}", output_dir))?;

    let mut sorted = transactions.to_vec();
    sort_transactions(&mut sorted);
    let rows: Vec<ExportRow> = sorted.iter().map(ExportRow::from).collect();

    let path = output_path(output_dir, format);
    match format {
        OutputFormat::Csv => write_csv(&path, &rows)?,
        OutputFormat::Xlsx => write_xlsx(&path, &rows)?,
        OutputFormat::Json => write_json(&path, &rows)?,
    }

    info!("Exported {} row(s) to {:?}", rows.len(), path);
    Ok(Some(path))
}

pub fn write_csv(path: &Path, rows: &[ExportRow]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut out = BufWriter::new(file);
    out.write_all("\u{feff}".as_bytes())?;

    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json(path: &Path, rows: &[ExportRow]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

pub fn write_xlsx(path: &Path, rows: &[ExportRow]) -> Result<()> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| ExtractionError::Export(e.to_string());
    let mut workbook = Workbook::new();

    let data = workbook.add_worksheet();
    data.set_name("Dados").map_err(xlsx_err)?;
    for (col, header) in COLUMNS.iter().enumerate() {
        data.write_string(0, col as u16, *header).map_err(xlsx_err)?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let r = idx as u32 + 1;
        for (col, value) in row_values(row).iter().enumerate() {
            data.write_string(r, col as u16, *value).map_err(xlsx_err)?;
        }
    }

    let tree = workbook.add_worksheet();
    tree.set_name("Árvore").map_err(xlsx_err)?;
    for (col, header) in TREE_COLUMNS.iter().enumerate() {
        tree.write_string(0, col as u16, *header).map_err(xlsx_err)?;
    }
    for (idx, tree_row) in tree_rows(rows).iter().enumerate() {
        let r = idx as u32 + 1;
        let mut values = vec![tree_row.year.as_str(), tree_row.month.as_str(), tree_row.day.as_str()];
        values.extend(row_values(&tree_row.row));
        for (col, value) in values.iter().enumerate() {
            tree.write_string(r, col as u16, *value).map_err(xlsx_err)?;
        }
    }

    workbook
        .save(path)
        .map_err(|e| ExtractionError::Export(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

fn row_values(row: &ExportRow) -> [&str; 5] {
    [
        row.date.as_deref().unwrap_or(""),
        row.ticker.as_str(),
        row.side.as_str(),
        row.quantity.as_str(),
        row.price.as_str(),
    ]
}
