//! Ticker resolution over a row's cells.
//!
//! Each cell is offered to an ordered list of strategies; the first strategy
//! that produces a ticker wins. Cells are visited in order, so an earlier
//! cell resolved by a weak strategy beats a later cell with a strong one.

use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use super::{find_direct_ticker, FallbackTable, TickerMapping};
use crate::normalize::{normalize_text, significant_words, similarity_ratio, word_overlap, SIMILARITY_THRESHOLD};

/// Which dictionary a lookup strategy reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Hardcoded,
    Config,
}

/// One matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// A `AAAA99` symbol already printed in the cell.
    DirectPattern,
    /// Normalized cell equals a normalized dictionary key.
    ExactLookup(Source),
    /// Word-overlap match; the highest score wins, ties keep the first key.
    FuzzyLookup(Source),
    /// Ratcliff/Obershelp ratio of at least 0.85, hardcoded keys first.
    SimilarityLookup,
}

impl MatchStrategy {
    /// Evaluation order used by [`TickerResolver::new`]: every exact
    /// strategy runs before any fuzzy one.
    pub const DEFAULT_ORDER: [MatchStrategy; 6] = [
        MatchStrategy::DirectPattern,
        MatchStrategy::ExactLookup(Source::Hardcoded),
        MatchStrategy::ExactLookup(Source::Config),
        MatchStrategy::FuzzyLookup(Source::Hardcoded),
        MatchStrategy::FuzzyLookup(Source::Config),
        MatchStrategy::SimilarityLookup,
    ];

    /// Tier number of the strategy in the resolution cascade. This is a fixed
    /// label, not the position in [`Self::DEFAULT_ORDER`].
    pub fn tier(&self) -> u8 {
        match self {
            MatchStrategy::DirectPattern => 1,
            MatchStrategy::ExactLookup(Source::Hardcoded) => 2,
            MatchStrategy::FuzzyLookup(Source::Hardcoded) => 3,
            MatchStrategy::ExactLookup(Source::Config) => 4,
            MatchStrategy::FuzzyLookup(Source::Config) => 5,
            MatchStrategy::SimilarityLookup => 6,
        }
    }

    /// Try to resolve a single, already cleaned cell.
    pub fn try_match(&self, cell: &str, dictionaries: &Dictionaries) -> Option<String> {
        match self {
            MatchStrategy::DirectPattern => find_direct_ticker(cell).map(str::to_string),
            MatchStrategy::ExactLookup(source) => {
                let normalized = normalize_text(cell);
                if normalized.is_empty() {
                    return None;
                }
                dictionaries
                    .entries(*source)
                    .iter()
                    .find(|entry| entry.normalized == normalized)
                    .map(|entry| entry.ticker.clone())
            }
            MatchStrategy::FuzzyLookup(source) => {
                let cell_words = significant_words(cell);
                if cell_words.is_empty() {
                    return None;
                }
                let mut best: Option<(f64, &DictionaryEntry)> = None;
                for entry in dictionaries.entries(*source) {
                    if let Some(score) = word_overlap(&cell_words, &entry.words) {
                        if best.map_or(true, |(best_score, _)| score > best_score) {
                            best = Some((score, entry));
                        }
                    }
                }
                best.map(|(_, entry)| entry.ticker.clone())
            }
            MatchStrategy::SimilarityLookup => [Source::Hardcoded, Source::Config]
                .iter()
                .flat_map(|source| dictionaries.entries(*source))
                .find(|entry| similarity_ratio(cell, &entry.key) >= SIMILARITY_THRESHOLD)
                .map(|entry| entry.ticker.clone()),
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchStrategy::DirectPattern => "direct pattern",
            MatchStrategy::ExactLookup(Source::Hardcoded) => "hardcoded exact",
            MatchStrategy::FuzzyLookup(Source::Hardcoded) => "hardcoded fuzzy",
            MatchStrategy::ExactLookup(Source::Config) => "config exact",
            MatchStrategy::FuzzyLookup(Source::Config) => "config fuzzy",
            MatchStrategy::SimilarityLookup => "similarity",
        };
        write!(f, "tier {} ({})", self.tier(), label)
    }
}

/// Dictionary key with its precomputed comparison forms.
#[derive(Debug, Clone)]
pub struct DictionaryEntry {
    key: String,
    normalized: String,
    words: BTreeSet<String>,
    ticker: String,
}

impl DictionaryEntry {
    fn new(key: &str, ticker: &str) -> Self {
        Self {
            key: key.to_string(),
            normalized: normalize_text(key),
            words: significant_words(key),
            ticker: ticker.to_string(),
        }
    }
}

/// Both dictionaries, kept apart so the strategies can rank them.
#[derive(Debug, Clone, Default)]
pub struct Dictionaries {
    hardcoded: Vec<DictionaryEntry>,
    config: Vec<DictionaryEntry>,
}

impl Dictionaries {
    pub fn new(fallback: &FallbackTable, config: Option<&TickerMapping>) -> Self {
        let hardcoded = fallback
            .iter()
            .map(|(key, ticker)| DictionaryEntry::new(key, ticker))
            .collect();
        let config = config
            .map(|mapping| {
                mapping
                    .iter()
                    .filter(|(_, ticker)| !ticker.is_empty())
                    .map(|(key, ticker)| DictionaryEntry::new(key, ticker))
                    .collect()
            })
            .unwrap_or_default();
        Self { hardcoded, config }
    }

    fn entries(&self, source: Source) -> &[DictionaryEntry] {
        match source {
            Source::Hardcoded => &self.hardcoded,
            Source::Config => &self.config,
        }
    }
}

/// A resolved ticker and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub ticker: String,
    pub strategy: MatchStrategy,
    pub cell_index: usize,
}

/// Resolves row cells to B3 tickers.
///
/// Built once per run from the fallback table and the loaded mapping and
/// then shared read-only by every document.
#[derive(Debug, Clone)]
pub struct TickerResolver {
    dictionaries: Dictionaries,
    strategies: Vec<MatchStrategy>,
}

impl TickerResolver {
    pub fn new(fallback: FallbackTable, config: Option<&TickerMapping>) -> Self {
        Self {
            dictionaries: Dictionaries::new(&fallback, config),
            strategies: MatchStrategy::DEFAULT_ORDER.to_vec(),
        }
    }

    /// Replace the strategy list, e.g. to exercise a single tier.
    pub fn with_strategies(mut self, strategies: Vec<MatchStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategies(&self) -> &[MatchStrategy] {
        &self.strategies
    }

    pub fn resolve<S: AsRef<str>>(&self, cells: &[S]) -> Option<String> {
        self.resolve_with_tier(cells).map(|resolution| resolution.ticker)
    }

    pub fn resolve_with_tier<S: AsRef<str>>(&self, cells: &[S]) -> Option<Resolution> {
        for (cell_index, raw) in cells.iter().enumerate() {
            let cell = clean_cell(raw.as_ref());
            if cell.is_empty() {
                continue;
            }
            for (step, strategy) in self.strategies.iter().enumerate() {
                if let Some(ticker) = strategy.try_match(&cell, &self.dictionaries) {
                    debug!(
                        "Resolved '{}' to {} via {}, step {}/{}",
                        cell,
                        ticker,
                        strategy,
                        step + 1,
                        self.strategies.len()
                    );
                    return Some(Resolution {
                        ticker,
                        strategy: *strategy,
                        cell_index,
                    });
                }
            }
        }
        None
    }
}

fn clean_cell(raw: &str) -> String {
    raw.replace(['\n', '\r'], " ").trim().to_string()
}
