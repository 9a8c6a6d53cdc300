//! Page/table orchestrator for brokerage notes.
//!
//! Each page is read in three passes: negotiation tables (11 columns or with
//! trade headers), every other table through a stricter filter, then the
//! page text through [`super::text_fallback`]. Text-recovered trades are only
//! kept when no trade with the same (date, ticker, quantity, price) was
//! emitted for the document yet.

use anyhow::Result;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

use super::pdf_pages::{self, column_count, PdfPage, Table};
use super::row_classifier::is_valid_data_row;
use super::text_fallback::{self, MARKER};
use crate::normalize::normalize_number;
use crate::tickers::TickerResolver;

static TRADE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}/\d{2}/\d{4})").expect("valid trade date pattern"));

static PRICE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+[.,]\d+").expect("valid price pattern"));

/// Column count of the standard negotiation table.
pub const NEGOTIATION_COLUMNS: usize = 11;

const NEGOTIATION_KEYWORDS: [&str; 4] = ["Data pregão", "Nr. nota", "Negociação", "Especificação"];

/// C (compra), V (venda) or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Side {
    Buy,
    Sell,
    #[default]
    Unknown,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "C",
            Side::Sell => "V",
            Side::Unknown => "",
        }
    }

    /// `C` when the text holds a C, else `V` when it holds a V.
    pub fn from_marker(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains('C') {
            Side::Buy
        } else if upper.contains('V') {
            Side::Sell
        } else {
            Side::Unknown
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted trade. Quantity and price are canonical decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transaction {
    /// DD/MM/YYYY
    pub date: Option<String>,
    pub ticker: String,
    pub side: Side,
    pub quantity: String,
    pub price: String,
}

impl Transaction {
    fn signature(&self) -> (Option<String>, String, String, String) {
        (
            self.date.clone(),
            self.ticker.clone(),
            self.quantity.clone(),
            self.price.clone(),
        )
    }
}

/// First DD/MM/YYYY in the page text.
pub fn trade_date(text: &str) -> Option<String> {
    TRADE_DATE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn is_negotiation_table(table: &Table) -> bool {
    // Rows are padded to the widest one, so this is the first row's width too.
    if column_count(table) == NEGOTIATION_COLUMNS {
        return true;
    }
    let text = table.iter().flatten().filter(|c| !c.is_empty()).join(" ");
    NEGOTIATION_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// Extracts trades from the pages of one document.
pub struct NoteExtractor<'a> {
    resolver: &'a TickerResolver,
}

impl<'a> NoteExtractor<'a> {
    pub fn new(resolver: &'a TickerResolver) -> Self {
        Self { resolver }
    }

    /// Parse `bytes` as a PDF and extract all its trades.
    pub fn process_document(&self, name: &str, bytes: &[u8], password: Option<&str>) -> Result<Vec<Transaction>> {
        info!("Processing {}", name);
        let pages = pdf_pages::read_pages(name, bytes, password)?;
        let transactions = self.extract_pages(&pages);
        if transactions.is_empty() {
            warn!("{}: no transactions extracted", name);
        } else {
            info!("{}: {} transaction(s) extracted", name, transactions.len());
        }
        Ok(transactions)
    }

    pub fn extract_pages(&self, pages: &[PdfPage]) -> Vec<Transaction> {
        let mut emitted = Vec::new();
        for page in pages {
            let added = self.extract_page(page, &mut emitted);
            if added > 0 {
                debug!("Page {}/{}: {} record(s)", page.number, pages.len(), added);
            }
        }
        emitted
    }

    /// Append the trades of `page` to `emitted`; returns how many were added.
    pub fn extract_page(&self, page: &PdfPage, emitted: &mut Vec<Transaction>) -> usize {
        let before = emitted.len();
        let date = trade_date(&page.text);

        for table in page.tables.iter().filter(|t| !t.is_empty()) {
            if is_negotiation_table(table) {
                emitted.extend(self.negotiation_rows(table, date.as_deref()));
            } else {
                emitted.extend(self.fallback_rows(table, date.as_deref()));
            }
        }

        if let Some(date) = date.as_deref() {
            if page.text.contains(MARKER) {
                // Repeated fills inside the text stay; only records already
                // emitted before this pass are duplicates.
                let seen: HashSet<_> = emitted.iter().map(Transaction::signature).collect();
                let mut recovered = 0;
                for op in text_fallback::operations_from_text(&page.text, date, self.resolver) {
                    if !seen.contains(&op.signature()) {
                        emitted.push(op);
                        recovered += 1;
                    }
                }
                if recovered > 0 {
                    debug!("Page {}: {} operation(s) recovered from text", page.number, recovered);
                }
            }
        }

        emitted.len() - before
    }

    // Every row is a candidate: the layout repeats its own sub-headers and
    // the row classifier rejects them.
    fn negotiation_rows(&self, table: &Table, date: Option<&str>) -> Vec<Transaction> {
        let mut rows = Vec::new();
        for row in table.iter().filter(|row| !is_blank(row)) {
            let cells = trimmed(row);
            if !is_valid_data_row(&cells, true) {
                continue;
            }
            let Some(ticker) = self.resolver.resolve(&cells) else {
                continue;
            };

            let side = cells.get(2).map_or(Side::Unknown, |c| Side::from_marker(c));
            let quantity = normalize_number(cells.get(7).map(String::as_str));
            let price = normalize_number(cells.get(8).map(String::as_str));
            if quantity.is_empty() && price.is_empty() {
                continue;
            }

            rows.push(Transaction {
                date: date.map(str::to_string),
                ticker,
                side,
                quantity,
                price,
            });
        }
        rows
    }

    // Unknown layout: skip the header row and sniff quantity and price by
    // shape instead of by column.
    fn fallback_rows(&self, table: &Table, date: Option<&str>) -> Vec<Transaction> {
        let mut rows = Vec::new();
        for row in table.iter().skip(1).filter(|row| !is_blank(row)) {
            let cells = trimmed(row);
            if !is_valid_data_row(&cells, false) {
                continue;
            }
            let Some(ticker) = self.resolver.resolve(&cells) else {
                continue;
            };

            let mut price = None;
            let mut quantity = None;
            for cell in &cells {
                if PRICE_SHAPE.is_match(cell) {
                    if price.is_none() {
                        price = Some(normalize_number(cell.as_str()));
                    }
                } else if is_integer_like(cell) && quantity.is_none() {
                    quantity = Some(normalize_number(cell.as_str()));
                }
            }
            let quantity = quantity.unwrap_or_default();
            let price = price.unwrap_or_default();
            if quantity.is_empty() && price.is_empty() {
                continue;
            }

            rows.push(Transaction {
                date: date.map(str::to_string),
                ticker,
                side: sniff_side(&cells),
                quantity,
                price,
            });
        }
        rows
    }
}

fn sniff_side(cells: &[String]) -> Side {
    for cell in cells {
        let upper = cell.trim().to_uppercase();
        let marked = format!(" {} ", upper).contains(" C ") || upper == "C" || upper == "V";
        if marked {
            let side = Side::from_marker(&upper);
            if side != Side::Unknown {
                return side;
            }
        }
    }
    Side::Unknown
}

fn is_integer_like(cell: &str) -> bool {
    let digits = cell.replace(['.', ','], "");
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

fn trimmed(row: &[String]) -> Vec<String> {
    row.iter().map(|c| c.trim().to_string()).collect()
}
