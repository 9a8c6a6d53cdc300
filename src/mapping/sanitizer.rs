//! Ticker validator and sanitizer.
//!
//! Checks every mapping entry against the B3 suffix rules for its share
//! class, proposes corrections and rewrites only the lines that change.

use anyhow::{Context, Result};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::heuristic::{parse_asset_name, ShareClass};
use super::TickerLookup;
use crate::normalize::normalize_text;
use crate::tickers::mapping::decode_properties;
use crate::tickers::TickerMapping;

/// Curated description → ticker pairs that break the suffix rules on purpose.
/// Seed data.
pub const KNOWN_EXCEPTIONS: &[(&str, &str)] = &[
    ("BRASIL ON", "EVEB31"),
    ("CESP ON", "CESP6"),
    ("CESP PNB", "CESP6"),
    ("COELBA ON", "CEEB5"),
    ("TIM ON", "0P0001N5CL"),
    ("AZUL PN", "0P0000U99Z"),
    ("ABC BRASIL PN", "ABCB4"),
    ("JBS ON", "JBSS3"),
    ("EQUATORIAL ON", "EQPA3"),
    ("UNIPAR ON", "UNIP3"),
];

pub const REASON_EXCEPTION: &str = "EXCEÇÃO CONHECIDA";
pub const REASON_SPECIAL_CODE: &str = "ISIN/Código Especial";
pub const REASON_FUND: &str = "Fundo/Classes Especiais";
pub const REASON_OK: &str = "OK";
pub const MANUAL_REVIEW: &str = "Revisão Manual";

static MARKET_SEGMENT_TAIL: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\s+(ON|PN|PNA|PNB|NM|N1|N2|N3)\b.*$")
        .case_insensitive(true)
        .build()
        .expect("valid company name pattern")
});

/// Outcome of checking one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub is_valid: bool,
    pub reason: String,
}

impl Validation {
    fn pass(reason: &str) -> Self {
        Self {
            is_valid: true,
            reason: reason.to_string(),
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            is_valid: false,
            reason,
        }
    }
}

/// An entry that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub description: String,
    pub ticker: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    pub checked: usize,
    /// Invalid entries grouped by reason.
    pub issues: BTreeMap<String, Vec<Issue>>,
    /// Corrections to apply: description → (current, corrected).
    pub fixes: BTreeMap<String, (String, String)>,
}

impl SanitizeReport {
    pub fn issue_count(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }

    /// Write the issues as CSV; returns the number of rows written.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {:?}", parent))?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create report {:?}", path))?;
        writer.write_record(["Descrição", "Ticker Atual", "Tipo de Problema", "Sugestão"])?;

        let mut rows = 0;
        for (reason, issues) in &self.issues {
            for issue in issues {
                let suggestion = issue.suggestion.as_deref().unwrap_or(MANUAL_REVIEW);
                writer.write_record([
                    issue.description.as_str(),
                    issue.ticker.as_str(),
                    reason.as_str(),
                    suggestion,
                ])?;
                rows += 1;
            }
        }
        writer.flush()?;

        info!("Wrote sanitization report with {} row(s) to {:?}", rows, path);
        Ok(rows)
    }
}

/// Default report location: next to the mapping file, timestamped.
pub fn default_report_path<P: AsRef<Path>>(mapping_path: P) -> PathBuf {
    let dir = mapping_path
        .as_ref()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    dir.join(format!(
        "ticker_sanitization_report_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

pub struct TickerSanitizer<'a> {
    lookup: &'a dyn TickerLookup,
}

impl<'a> TickerSanitizer<'a> {
    pub fn new(lookup: &'a dyn TickerLookup) -> Self {
        Self { lookup }
    }

    /// Check a ticker against the suffix rule of the description's share class.
    pub fn validate(&self, description: &str, ticker: &str) -> Validation {
        let ticker = ticker.trim().to_uppercase();

        if known_exception(description) == Some(ticker.as_str()) {
            return Validation::pass(REASON_EXCEPTION);
        }
        if ticker.starts_with("0P") {
            return Validation::pass(REASON_SPECIAL_CODE);
        }
        if ticker.ends_with("11") {
            return Validation::pass(REASON_FUND);
        }

        let last = ticker.chars().last().unwrap_or(' ');
        match share_class_of(description) {
            Some(ShareClass::On) if last != '3' => {
                if ('3'..='9').contains(&last) {
                    Validation::fail(format!(
                        "⚠️ ON termina em {} (esperado 3 - possível classe especial)",
                        last
                    ))
                } else {
                    Validation::fail(format!("ON deve terminar em 3 (não em {})", last))
                }
            }
            Some(ShareClass::Pnb) if !matches!(last, '4' | '5' | '6') => {
                Validation::fail(format!("PNB deve terminar em 4/5/6 (não em {})", last))
            }
            Some(ShareClass::Pna) if !matches!(last, '4' | '5') => {
                Validation::fail(format!("PNA deve terminar em 4/5 (não em {})", last))
            }
            Some(ShareClass::Pn) if !matches!(last, '4' | '5' | '6') => {
                Validation::fail(format!("PN deve terminar em 4/5/6 (não em {})", last))
            }
            _ => Validation::pass(REASON_OK),
        }
    }

    /// Corrected ticker for an entry, only when it differs from the current one.
    pub fn try_fix(&self, description: &str, ticker: &str) -> Option<String> {
        let current = ticker.trim().to_uppercase();

        if let Some(exception) = known_exception(description) {
            if exception != current {
                return Some(exception.to_string());
            }
        }

        let company = extract_company_name(description);
        if company.is_empty() {
            return None;
        }
        let digit = parse_asset_name(description).suffix_digit;
        self.lookup
            .lookup(&company, digit)
            .filter(|found| *found != current)
    }

    /// Validate every entry; with `fix`, also collect the corrections.
    pub fn sanitize(&self, mapping: &TickerMapping, fix: bool) -> SanitizeReport {
        let mut report = SanitizeReport::default();

        for (description, ticker) in mapping.iter() {
            report.checked += 1;
            let validation = self.validate(description, ticker);
            if validation.is_valid {
                continue;
            }

            let suggestion = self.try_fix(description, ticker);
            debug!(
                "Invalid mapping {}={} ({}), suggestion {:?}",
                description, ticker, validation.reason, suggestion
            );
            if fix {
                if let Some(corrected) = &suggestion {
                    report.fixes.insert(
                        description.to_string(),
                        (ticker.to_string(), corrected.clone()),
                    );
                }
            }
            report
                .issues
                .entry(validation.reason)
                .or_default()
                .push(Issue {
                    description: description.to_string(),
                    ticker: ticker.to_string(),
                    suggestion,
                });
        }

        report
    }
}

/// Company part of a description, without share class and segment.
pub fn extract_company_name(description: &str) -> String {
    MARKET_SEGMENT_TAIL
        .replace(description.trim(), "")
        .trim()
        .to_string()
}

/// Rewrite only the mapping lines whose key was fixed; every other line,
/// comments included, is kept verbatim. Returns the number of lines changed.
pub fn apply_fixes<P: AsRef<Path>>(path: P, fixes: &BTreeMap<String, (String, String)>) -> Result<usize> {
    let path = path.as_ref();
    if fixes.is_empty() {
        return Ok(0);
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read mapping file {:?}", path))?;
    let content = decode_properties(&bytes);

    let mut changed = 0;
    let mut output = String::with_capacity(content.len());
    for line in content.lines() {
        let trimmed = line.trim();
        let replacement = if trimmed.starts_with('#') {
            None
        } else {
            trimmed
                .split_once('=')
                .and_then(|(key, _)| fixes.get(key.trim()).map(|(_, new)| (key.trim(), new)))
        };

        match replacement {
            Some((key, new)) => {
                output.push_str(&format!("{}={}", key, new));
                changed += 1;
            }
            None => output.push_str(line),
        }
        output.push('\n');
    }

    fs::write(path, output).with_context(|| format!("Failed to write mapping file {:?}", path))?;
    info!("Applied {} ticker fix(es) to {:?}", changed, path);
    Ok(changed)
}

fn known_exception(description: &str) -> Option<&'static str> {
    let key = description.trim().to_uppercase();
    KNOWN_EXCEPTIONS
        .iter()
        .find(|(desc, _)| *desc == key)
        .map(|(_, ticker)| *ticker)
}

// Last class token wins so "Embraer ON NM" is treated as ON.
fn share_class_of(description: &str) -> Option<ShareClass> {
    normalize_text(description)
        .split_whitespace()
        .filter_map(|word| match word {
            "ON" | "PN" | "PNA" | "PNB" => ShareClass::parse(word),
            _ => None,
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::OfflineLookup;
    use tempfile::TempDir;

    struct FixedLookup;

    impl TickerLookup for FixedLookup {
        fn lookup(&self, company: &str, suffix_digit: Option<u8>) -> Option<String> {
            match (company, suffix_digit) {
                ("Embraer", Some(3)) => Some("EMBR3".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    fn on_shares_must_end_in_three() {
        let sanitizer = TickerSanitizer::new(&OfflineLookup);
        assert!(sanitizer.validate("Embraer ON", "EMBR3").is_valid);

        let wrong = sanitizer.validate("Embraer ON", "EMBR4");
        assert!(!wrong.is_valid);
        assert!(wrong.reason.contains("possível classe especial"));

        let letter = sanitizer.validate("Embraer ON NM", "EMBRX");
        assert!(!letter.is_valid);
        assert_eq!(letter.reason, "ON deve terminar em 3 (não em X)");
    }

    #[test]
    fn preferred_share_rules() {
        let sanitizer = TickerSanitizer::new(&OfflineLookup);
        assert!(sanitizer.validate("ITAUSA PN N1", "ITSA4").is_valid);
        assert!(!sanitizer.validate("ITAUSA PN N1", "ITSA3").is_valid);
        assert!(sanitizer.validate("BRADESPAR PNA", "BRAP5").is_valid);
        assert_eq!(
            sanitizer.validate("BRADESPAR PNA", "BRAP6").reason,
            "PNA deve terminar em 4/5 (não em 6)"
        );
        assert_eq!(
            sanitizer.validate("ELETROBRAS PNB", "ELET3").reason,
            "PNB deve terminar em 4/5/6 (não em 3)"
        );
    }

    #[test]
    fn universal_overrides_pass() {
        let sanitizer = TickerSanitizer::new(&OfflineLookup);
        assert_eq!(
            sanitizer.validate("Fundo X", "FUNDX11"),
            Validation::pass(REASON_FUND)
        );
        assert_eq!(sanitizer.validate("AZUL PN", "0P0000U99Z").reason, REASON_EXCEPTION);
        assert_eq!(sanitizer.validate("OUTRA ON", "0P0000ABCD").reason, REASON_SPECIAL_CODE);
        assert_eq!(sanitizer.validate("CESP PNB", "CESP6").reason, REASON_EXCEPTION);
        assert_eq!(sanitizer.validate("SANEPAR UNT N2", "SAPR11").reason, REASON_FUND);
        assert_eq!(sanitizer.validate("AMAZON DR", "AMZO34").reason, REASON_OK);
    }

    #[test]
    fn try_fix_prefers_exceptions_then_lookup() {
        let sanitizer = TickerSanitizer::new(&FixedLookup);
        assert_eq!(sanitizer.try_fix("TIM ON", "TIMS3").as_deref(), Some("0P0001N5CL"));
        assert_eq!(sanitizer.try_fix("Embraer ON NM", "EMBR4").as_deref(), Some("EMBR3"));
        // already correct
        assert_eq!(sanitizer.try_fix("Embraer ON NM", "EMBR3"), None);
        assert_eq!(sanitizer.try_fix("Desconhecida ON", "DESC4"), None);
    }

    #[test]
    fn company_name_drops_class_and_segment() {
        assert_eq!(extract_company_name("Embraer ON NM"), "Embraer");
        assert_eq!(extract_company_name("BANCO DO BRASIL ON ED NM"), "BANCO DO BRASIL");
        assert_eq!(extract_company_name("KLABIN S/A"), "KLABIN S/A");
    }

    #[test]
    fn sanitize_groups_issues_and_collects_fixes() {
        let mapping: TickerMapping = [
            ("Embraer ON NM", "EMBR4"),
            ("ITAUSA PN N1", "ITSA4"),
            ("TIM ON", "TIMS4"),
            ("GERDAU PN", "GGBR3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let sanitizer = TickerSanitizer::new(&FixedLookup);
        let report = sanitizer.sanitize(&mapping, true);
        assert_eq!(report.checked, 4);
        assert_eq!(report.issue_count(), 3);
        assert_eq!(report.fixes.len(), 2);
        assert_eq!(
            report.fixes.get("TIM ON"),
            Some(&("TIMS4".to_string(), "0P0001N5CL".to_string()))
        );

        let dry_run = sanitizer.sanitize(&mapping, false);
        assert!(dry_run.fixes.is_empty());
        assert_eq!(dry_run.issue_count(), 3);
    }

    #[test]
    fn apply_fixes_rewrites_only_changed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tickerMapping.properties");
        fs::write(&path, "# cabeçalho\nEmbraer ON NM = EMBR4\nVALE ON NM=VALE3\n\n").unwrap();

        let mut fixes = BTreeMap::new();
        fixes.insert(
            "Embraer ON NM".to_string(),
            ("EMBR4".to_string(), "EMBR3".to_string()),
        );
        assert_eq!(apply_fixes(&path, &fixes).unwrap(), 1);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "# cabeçalho\nEmbraer ON NM=EMBR3\nVALE ON NM=VALE3\n\n");
    }

    #[test]
    fn report_uses_manual_review_without_suggestion() {
        let dir = TempDir::new().unwrap();
        let mapping: TickerMapping = [("GERDAU PN".to_string(), "GGBR3".to_string())]
            .into_iter()
            .collect();
        let report = TickerSanitizer::new(&OfflineLookup).sanitize(&mapping, false);

        let path = dir.path().join("report.csv");
        assert_eq!(report.write_csv(&path).unwrap(), 1);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Descrição,Ticker Atual,Tipo de Problema,Sugestão\n"));
        assert!(content.contains("GERDAU PN,GGBR3,PN deve terminar em 4/5/6 (não em 3),Revisão Manual"));
    }

    #[test]
    fn default_report_path_is_next_to_mapping() {
        let path = default_report_path("resources/tickerMapping.properties");
        assert_eq!(path.parent(), Some(Path::new("resources")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("ticker_sanitization_report_"));
        assert!(name.ends_with(".csv"));
    }
}
