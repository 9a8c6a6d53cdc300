//! PDF pages as text plus tables rebuilt from column gaps.
//!
//! `pdf-extract` yields the plain text of each page. Brokerage notes are laid
//! out in fixed columns, so a line whose fields are separated by runs of two
//! or more spaces is read as a table row, and consecutive rows form a table.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

use super::text_fallback::{self, MARKER};
use crate::error::ExtractionError;

/// Rows of trimmed cells; every row padded to the table width.
pub type Table = Vec<Vec<String>>;

static CELL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+| {2,}").expect("valid cell gap pattern"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfPage {
    /// 1-based page number
    pub number: usize,
    pub text: String,
    pub tables: Vec<Table>,
}

impl PdfPage {
    pub fn from_text(number: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let tables = tables_from_text(&text);
        Self {
            number,
            text,
            tables,
        }
    }

    /// Page with explicit tables, e.g. built by tests.
    pub fn with_tables(number: usize, text: impl Into<String>, tables: Vec<Table>) -> Self {
        Self {
            number,
            text: text.into(),
            tables,
        }
    }
}

/// Number of columns of a table (its widest row).
pub fn column_count(table: &Table) -> usize {
    table.iter().map(Vec::len).max().unwrap_or(0)
}

/// Split page text into tables of gap-separated cells.
///
/// A `1-BOVESPA` trade line loses its empty columns in plain text, so it is
/// laid back out in the eleven negotiation columns instead.
pub fn tables_from_text(text: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Table = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        let cells: Vec<String> = if line.is_empty() {
            Vec::new()
        } else if let Some(row) = negotiation_row(line) {
            row
        } else {
            CELL_GAP.split(line).map(|c| c.trim().to_string()).collect()
        };

        if cells.len() >= 2 {
            current.push(cells);
        } else if !current.is_empty() {
            tables.push(pad_rows(std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        tables.push(pad_rows(current));
    }

    tables
}

// Q, Negociação, C/V, Tipo mercado, Prazo, Especificação do título,
// Obs., Quantidade, Preço, Valor, D/C
fn negotiation_row(line: &str) -> Option<Vec<String>> {
    if !line.starts_with(MARKER) {
        return None;
    }
    let mut trades = text_fallback::scan_trade_lines(line);
    if trades.len() != 1 {
        return None;
    }
    let trade = trades.remove(0);
    Some(vec![
        String::new(),
        MARKER.to_string(),
        trade.side.as_str().to_string(),
        trade.market,
        String::new(),
        trade.asset_name,
        String::new(),
        trade.quantity,
        trade.price,
        trade.value,
        trade.debit_credit,
    ])
}

fn pad_rows(mut table: Table) -> Table {
    let width = column_count(&table);
    for row in &mut table {
        row.resize(width, String::new());
    }
    table
}

/// Extract every page of an in-memory PDF.
///
/// Encrypted documents are retried with `password` when one is configured;
/// without it they fail with [`ExtractionError::PasswordRequired`].
pub fn read_pages(name: &str, bytes: &[u8], password: Option<&str>) -> Result<Vec<PdfPage>> {
    let texts = match guarded(name, || pdf_extract::extract_text_from_mem_by_pages(bytes))? {
        Ok(texts) => texts,
        Err(err) if looks_encrypted(&err.to_string()) => {
            let password = password.ok_or_else(|| ExtractionError::PasswordRequired(name.to_string()))?;
            debug!("{} is encrypted, retrying with configured password", name);
            guarded(name, || {
                pdf_extract::extract_text_from_mem_by_pages_encrypted(bytes, password)
            })?
            .map_err(|err| {
                if looks_encrypted(&err.to_string()) {
                    anyhow!(ExtractionError::PasswordRequired(name.to_string()))
                } else {
                    anyhow!(ExtractionError::Pdf {
                        name: name.to_string(),
                        reason: err.to_string(),
                    })
                }
            })?
        }
        Err(err) => {
            return Err(ExtractionError::Pdf {
                name: name.to_string(),
                reason: err.to_string(),
            }
            .into())
        }
    };

    debug!("{}: {} page(s)", name, texts.len());
    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(idx, text)| PdfPage::from_text(idx + 1, text))
        .collect())
}

fn looks_encrypted(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["encrypt", "decrypt", "password"]
        .iter()
        .any(|needle| lower.contains(needle))
}

// The parser panics on some malformed streams; that must not end the batch.
fn guarded<T>(name: &str, f: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "parser panicked".to_string());
        anyhow!(ExtractionError::Pdf {
            name: name.to_string(),
            reason,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "NOTA DE NEGOCIAÇÃO\n\
        Nr. nota   Folha   Data pregão\n\
        123456   1   04/05/2024\n\
        \n\
        Negócios realizados\n\
        Q  Negociação  C/V  Tipo mercado  Especificação do título  Quantidade  Preço\n\
        1-BOVESPA  C  VISTA  EMBRAER ON NM  100  24,20\n\
        1-BOVESPA  V  FRACIONARIO  WEG ON NM  5\n";

    #[test]
    fn gap_separated_lines_form_tables() {
        let tables = tables_from_text(PAGE);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0][0], vec!["Nr. nota", "Folha", "Data pregão"]);
        assert_eq!(tables[1].len(), 3);
        assert_eq!(tables[1][1][3], "EMBRAER ON NM");
    }

    #[test]
    fn rows_are_padded_to_table_width() {
        let tables = tables_from_text(PAGE);
        let trades = &tables[1];
        assert_eq!(column_count(trades), 7);
        assert!(trades.iter().all(|row| row.len() == 7));
        assert_eq!(trades[2][5], "");
    }

    #[test]
    fn complete_trade_lines_use_negotiation_columns() {
        let text = "Q  Negociação  C/V  Tipo mercado  Prazo  Especificação do título  Obs. (*)  Quantidade  Preço / Ajuste  Valor Operação / Ajuste  D/C\n\
                    1-BOVESPA C VISTA EMBRAER ON NM 100 24,20 2.420,00 D\n";
        let tables = tables_from_text(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(column_count(&tables[0]), 11);
        let row = &tables[0][1];
        assert_eq!(row[1], "1-BOVESPA");
        assert_eq!(row[2], "C");
        assert_eq!(row[5], "EMBRAER ON NM");
        assert_eq!(row[7], "100");
        assert_eq!(row[8], "24,20");
        assert_eq!(row[10], "D");
    }

    #[test]
    fn single_field_lines_are_not_tables() {
        assert!(tables_from_text("RESUMO\nsingle line only\n").is_empty());
        assert!(tables_from_text("").is_empty());
    }

    #[test]
    fn page_from_text_keeps_text() {
        let page = PdfPage::from_text(2, PAGE);
        assert_eq!(page.number, 2);
        assert!(page.text.contains("04/05/2024"));
        assert_eq!(page.tables.len(), 2);
    }

    #[test]
    fn garbage_bytes_are_unparsable() {
        let err = read_pages("lixo.pdf", b"definitely not a pdf", None).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("lixo.pdf"), "{message}");
    }

    #[test]
    fn encryption_messages_are_detected() {
        assert!(looks_encrypted("PDF is Encrypted and no password given"));
        assert!(looks_encrypted("failed to decrypt"));
        assert!(!looks_encrypted("invalid xref table"));
    }
}
