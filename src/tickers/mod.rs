//! B3 ticker symbols: patterns, the De-Para table, the description mapping
//! store, the resolver and the optional B3 instrument registry.

use once_cell::sync::Lazy;
use regex::Regex;

pub mod mapping;
pub mod registry;
pub mod resolver;

pub use mapping::TickerMapping;
pub use resolver::{MatchStrategy, Resolution, Source, TickerResolver};

/// Hardcoded De-Para: description → ticker, consulted before the config
/// mapping on exact terms and never merged into it.
pub const DE_PARA_TICKERS: &[(&str, &str)] = &[
    ("PORTOSEGURO", "PSSA3"),
    ("PETROBRAS", "PETR3"),
    ("COPEL ON ED N1", "CPLE3"),
    ("NEOENERGIA ON NM", "NEOE3"),
    ("VALE ON", "VALE3"),
];

static DIRECT_TICKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{4}\d{2}").expect("valid direct ticker pattern"));

static OPTION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{4}[A-X]\d{3}E?$").expect("valid option code pattern"));

/// Small priority table consulted by the resolver before the config mapping.
///
/// Defaults to [`DE_PARA_TICKERS`]; other seed tables can be injected.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    entries: Vec<(String, String)>,
}

impl FallbackTable {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::from_pairs(DE_PARA_TICKERS.iter().copied())
    }
}

/// First `AAAA99`-shaped symbol inside the text, if any.
pub fn find_direct_ticker(text: &str) -> Option<&str> {
    DIRECT_TICKER.find(text).map(|m| m.as_str())
}

/// True for B3 option-contract codes such as `ABEVA135` or `BBASK344E`.
pub fn is_option_code(code: &str) -> bool {
    OPTION_CODE.is_match(code.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_ticker_needs_four_letters_and_two_digits() {
        assert_eq!(find_direct_ticker("FII HGLG11 CI"), Some("HGLG11"));
        assert_eq!(find_direct_ticker("BOVA11"), Some("BOVA11"));
        assert_eq!(find_direct_ticker("PETR4"), None);
        assert_eq!(find_direct_ticker("petr44"), None);
    }

    #[test]
    fn option_codes_are_detected() {
        assert!(is_option_code("ABEVA135"));
        assert!(is_option_code("B3SAB725"));
        assert!(is_option_code("BBASK344E"));
        assert!(!is_option_code("PETR4"));
        assert!(!is_option_code("EMBRAER ON NM"));
        assert!(!is_option_code("HGLG11"));
    }

    #[test]
    fn default_fallback_table_is_de_para() {
        let table = FallbackTable::default();
        assert_eq!(table.len(), DE_PARA_TICKERS.len());
        assert!(table.iter().any(|(k, v)| k == "VALE ON" && v == "VALE3"));
        assert!(FallbackTable::empty().is_empty());
    }
}
