// Review - pull manually filled entries from the unmapped store
//
// The analyst fills `DESCRICAO=TICKER` lines in the unmapped file. Filled
// lines move to the main mapping; keys already mapped keep their value.

use anyhow::{Context, Result};
use std::fs;
use tracing::{info, warn};

use super::MappingFiles;
use crate::tickers::mapping::{decode_properties, property_lines, MAPPING_HEADER, UNMAPPED_HEADER};
use crate::tickers::TickerMapping;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub imported: usize,
    /// Filled entries whose key was already mapped (same value or conflict).
    pub skipped: usize,
    pub conflicts: Vec<(String, String, String)>,
    /// Entries still waiting for a ticker.
    pub pending: usize,
}

/// Import filled entries and rewrite both files when something was imported.
pub fn review(files: &MappingFiles) -> Result<ReviewSummary> {
    let mut summary = ReviewSummary::default();
    if !files.unmapped.exists() {
        info!("No unmapped file at {:?}, nothing to review", files.unmapped);
        return Ok(summary);
    }

    let bytes = fs::read(&files.unmapped)
        .with_context(|| format!("Failed to read unmapped file {:?}", files.unmapped))?;
    let content = decode_properties(&bytes);

    let mut mapping = TickerMapping::load(&files.mapping)?;
    let mut pending = TickerMapping::new();

    for (description, ticker) in property_lines(&content) {
        if ticker.is_empty() {
            pending.insert(description, ticker);
            continue;
        }

        let ticker = ticker.to_uppercase();
        match mapping.get(&description) {
            Some(existing) if existing == ticker => summary.skipped += 1,
            Some(existing) => {
                warn!(
                    "Keeping {}={} (reviewed value {} ignored)",
                    description, existing, ticker
                );
                summary
                    .conflicts
                    .push((description.clone(), existing.to_string(), ticker));
                summary.skipped += 1;
            }
            None => {
                mapping.insert(description, ticker);
                summary.imported += 1;
            }
        }
    }
    summary.pending = pending.len();

    if summary.imported > 0 {
        mapping.persist(&files.mapping, MAPPING_HEADER)?;
        pending.persist(&files.unmapped, UNMAPPED_HEADER)?;
    }

    info!(
        "Review: {} imported, {} skipped, {} pending",
        summary.imported, summary.skipped, summary.pending
    );
    Ok(summary)
}
