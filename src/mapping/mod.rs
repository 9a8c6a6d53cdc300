//! Offline ticker-mapping tooling.
//!
//! Collects raw asset descriptions from notes, turns them into stable keys,
//! proposes tickers for new keys and keeps the persisted mapping healthy.
//! Nothing here runs during extraction; the extractor only reads the file
//! these tools write.

pub mod collector;
pub mod description;
pub mod generator;
pub mod heuristic;
pub mod review;
pub mod sanitizer;

use once_cell::unsync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::tickers::registry::B3Registry;

pub use description::normalize_description;
pub use heuristic::{generate_ticker, parse_asset_name, AssetName, ShareClass};

/// File name of the option-contract store, next to the main mapping.
pub const OPTIONS_FILENAME: &str = "tickerMapping_options.properties";

/// File name of the manual-review store, next to the main mapping.
pub const UNMAPPED_FILENAME: &str = "tickerMapping_unmapped.properties";

/// Second-chance source of real tickers for a company name.
pub trait TickerLookup {
    fn lookup(&self, company: &str, suffix_digit: Option<u8>) -> Option<String>;
}

/// Lookup that never finds anything. Used when `--online` is not given.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLookup;

impl TickerLookup for OfflineLookup {
    fn lookup(&self, _company: &str, _suffix_digit: Option<u8>) -> Option<String> {
        None
    }
}

/// Lookup against the B3 instruments list, loaded on first use.
///
/// A failed download disables the lookup for the rest of the run instead of
/// retrying for every description.
#[derive(Debug, Default)]
pub struct B3RegistryLookup {
    registry: OnceCell<Option<B3Registry>>,
}

impl B3RegistryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: B3Registry) -> Self {
        Self {
            registry: OnceCell::with_value(Some(registry)),
        }
    }

    fn registry(&self) -> Option<&B3Registry> {
        self.registry
            .get_or_init(|| match B3Registry::load_or_refresh() {
                Ok(registry) => Some(registry),
                Err(err) => {
                    warn!("B3 instruments unavailable, online lookup disabled: {:#}", err);
                    None
                }
            })
            .as_ref()
    }
}

impl TickerLookup for B3RegistryLookup {
    fn lookup(&self, company: &str, suffix_digit: Option<u8>) -> Option<String> {
        self.registry()?.find_ticker(company, suffix_digit)
    }
}

/// Paths of the three stores managed by the mapping tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingFiles {
    pub mapping: PathBuf,
    pub options: PathBuf,
    pub unmapped: PathBuf,
}

impl MappingFiles {
    /// Companion stores live in the same directory as the main mapping.
    pub fn beside<P: AsRef<Path>>(mapping: P) -> Self {
        let mapping = mapping.as_ref().to_path_buf();
        let dir = mapping
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            options: dir.join(OPTIONS_FILENAME),
            unmapped: dir.join(UNMAPPED_FILENAME),
            mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickers::registry::InstrumentRecord;

    #[test]
    fn companion_files_sit_next_to_mapping() {
        let files = MappingFiles::beside("resources/tickerMapping.properties");
        assert_eq!(files.options, PathBuf::from("resources/tickerMapping_options.properties"));
        assert_eq!(files.unmapped, PathBuf::from("resources/tickerMapping_unmapped.properties"));
    }

    #[test]
    fn offline_lookup_finds_nothing() {
        assert_eq!(OfflineLookup.lookup("EMBRAER", Some(3)), None);
    }

    #[test]
    fn registry_lookup_uses_injected_registry() {
        let registry = B3Registry::from_records(vec![InstrumentRecord {
            ticker: "WEGE3".to_string(),
            security_category: "SHARES".to_string(),
            corporate_name: "WEG S.A.".to_string(),
        }]);
        let lookup = B3RegistryLookup::with_registry(registry);
        assert_eq!(lookup.lookup("WEG", Some(3)).as_deref(), Some("WEGE3"));
        assert_eq!(lookup.lookup("WEG", Some(4)), None);
    }
}
