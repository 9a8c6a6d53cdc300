// Mapping generator - proposes tickers for descriptions not yet mapped
//
// Load, merge, sort, rewrite: existing entries are never overwritten and
// every store is persisted in full, sorted by key.

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::heuristic::{generate_ticker, parse_asset_name};
use super::{MappingFiles, TickerLookup};
use crate::tickers::mapping::{MAPPING_HEADER, OPTIONS_HEADER, UNMAPPED_HEADER};
use crate::tickers::{is_option_code, TickerMapping};

/// The three stores managed together.
#[derive(Debug, Clone, Default)]
pub struct MappingStores {
    pub mapping: TickerMapping,
    pub options: TickerMapping,
    pub unmapped: TickerMapping,
}

impl MappingStores {
    pub fn load(files: &MappingFiles) -> Result<Self> {
        Ok(Self {
            mapping: TickerMapping::load(&files.mapping)?,
            options: TickerMapping::load(&files.options)?,
            unmapped: TickerMapping::load(&files.unmapped)?,
        })
    }

    pub fn persist(&self, files: &MappingFiles) -> Result<()> {
        self.mapping.persist(&files.mapping, MAPPING_HEADER)?;
        self.options.persist(&files.options, OPTIONS_HEADER)?;
        self.unmapped.persist(&files.unmapped, UNMAPPED_HEADER)?;
        Ok(())
    }
}

/// Counters for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub total: usize,
    pub existing: usize,
    pub from_lookup: usize,
    pub from_heuristic: usize,
    pub options: usize,
    pub unmapped: usize,
}

impl GenerateSummary {
    pub fn added(&self) -> usize {
        self.from_lookup + self.from_heuristic
    }
}

/// Map every unique description into one of the stores.
pub fn generate<I, S>(descriptions: I, stores: &mut MappingStores, lookup: &dyn TickerLookup) -> GenerateSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<String> = descriptions
        .into_iter()
        .map(|d| d.as_ref().trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    let mut summary = GenerateSummary {
        total: unique.len(),
        ..Default::default()
    };

    for description in unique {
        if stores.mapping.contains(&description) {
            summary.existing += 1;
            stores.unmapped.remove(&description);
            continue;
        }

        if is_option_code(&description.to_uppercase()) {
            debug!("Option contract {}", description);
            stores.options.insert(description.clone(), description.to_uppercase());
            summary.options += 1;
            continue;
        }

        let asset = parse_asset_name(&description);
        if let Some(ticker) = lookup.lookup(&asset.company, asset.suffix_digit) {
            debug!("{} -> {} (lookup)", description, ticker);
            stores.unmapped.remove(&description);
            stores.mapping.insert(description, ticker);
            summary.from_lookup += 1;
            continue;
        }

        match generate_ticker(&asset.company, asset.share_class, asset.suffix_digit) {
            Some(ticker) => {
                debug!("{} -> {} (heuristic)", description, ticker);
                stores.unmapped.remove(&description);
                stores.mapping.insert(description, ticker);
                summary.from_heuristic += 1;
            }
            None => {
                debug!("{} left for manual review", description);
                stores.unmapped.insert(description, String::new());
                summary.unmapped += 1;
            }
        }
    }

    info!(
        "Mapping generation: {} description(s), {} existing, {} new, {} option(s), {} unmapped",
        summary.total,
        summary.existing,
        summary.added(),
        summary.options,
        summary.unmapped
    );
    summary
}
