//! Asset-name parsing and the heuristic ticker generator.
//!
//! The generator is a last resort: it gives every description a stable,
//! plausible symbol (`EMBR3`, `KLAB4`, ...) that an analyst corrects later.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fmt;

use crate::normalize::normalize_text;

/// Share class as printed after the company name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareClass {
    On,
    Pn,
    Pna,
    Pnb,
    Dr,
}

impl ShareClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareClass::On => "ON",
            ShareClass::Pn => "PN",
            ShareClass::Pna => "PNA",
            ShareClass::Pnb => "PNB",
            ShareClass::Dr => "DR",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "ON" => Some(ShareClass::On),
            "PN" => Some(ShareClass::Pn),
            "PNA" => Some(ShareClass::Pna),
            "PNB" => Some(ShareClass::Pnb),
            "DR" => Some(ShareClass::Dr),
            _ => None,
        }
    }
}

impl fmt::Display for ShareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Company, share class and expected ticker digit of a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetName {
    pub company: String,
    pub share_class: ShareClass,
    pub suffix_digit: Option<u8>,
}

/// Known company prefixes → (ticker root, canonical digit). Seed data.
pub const SPECIAL_CASES: &[(&str, &str, u8)] = &[
    ("EMBRAER", "EMBR", 3),
    ("ULTRAPAR", "UGPA", 3),
    ("SUZANO", "SUZB", 3),
    ("BRASKEN", "BRKM", 5),
    ("PETROBRAS", "PETR", 3),
    ("VALE", "VALE", 3),
    ("COSAN", "CSAN", 3),
    ("CESP", "CESP", 6),
    ("BANCO DO BRASIL", "BBAS", 3),
];

/// Words dropped before building a ticker root.
const ROOT_STOPWORDS: [&str; 17] = [
    "DO", "DA", "DE", "E", "S", "A", "SA", "S/A", "ON", "PN", "PNA", "PNB", "DR", "NM", "N1", "N2", "N3",
];

static CLASS_PATTERNS: Lazy<Vec<(Regex, ShareClass, Option<u8>)>> = Lazy::new(|| {
    [
        (r"^(.*?)\s+ON\s+NM\b", ShareClass::On, Some(3)),
        (r"^(.*?)\s+PN\s+N1\b", ShareClass::Pn, Some(4)),
        (r"^(.*?)\s+PN\s+N2\b", ShareClass::Pn, Some(5)),
        (r"^(.*?)\s+PNA\b", ShareClass::Pna, Some(5)),
        (r"^(.*?)\s+PNB\b", ShareClass::Pnb, Some(6)),
        (r"^(.*?)\s+DR\b", ShareClass::Dr, None),
        (r"^(.*?)\s+ON\b", ShareClass::On, Some(3)),
        (r"^(.*?)\s+PN\b", ShareClass::Pn, Some(4)),
    ]
    .into_iter()
    .map(|(re, class, digit)| {
        let regex = RegexBuilder::new(re)
            .case_insensitive(true)
            .build()
            .expect("valid share class pattern");
        (regex, class, digit)
    })
    .collect()
});

/// Split a normalized description into company, class and expected digit.
///
/// Unrecognized descriptions default to the first word as an ON share.
pub fn parse_asset_name(description: &str) -> AssetName {
    let name = description.trim();

    for (regex, share_class, suffix_digit) in CLASS_PATTERNS.iter() {
        if let Some(caps) = regex.captures(name) {
            let company = caps.get(1).map_or("", |m| m.as_str()).trim();
            if company.is_empty() {
                continue;
            }
            return AssetName {
                company: company.to_string(),
                share_class: *share_class,
                suffix_digit: *suffix_digit,
            };
        }
    }

    AssetName {
        company: name.split_whitespace().next().unwrap_or("").to_string(),
        share_class: ShareClass::On,
        suffix_digit: Some(3),
    }
}

/// Synthesize a ticker from company name and share-class digit.
///
/// Returns `None` without a digit (DR has no standard suffix). Known
/// prefixes in [`SPECIAL_CASES`] win; otherwise the first four characters
/// of the significant words, padded with `X`, plus the digit.
pub fn generate_ticker(company: &str, share_class: ShareClass, suffix_digit: Option<u8>) -> Option<String> {
    let digit = suffix_digit?;
    let normalized = normalize_text(company);

    if let Some((_, root, canonical)) = SPECIAL_CASES
        .iter()
        .find(|(prefix, _, _)| starts_with_words(&normalized, prefix))
    {
        return Some(format!("{}{}", root, canonical));
    }

    let upper = company.to_uppercase();
    let joined: String = upper
        .split_whitespace()
        .filter(|word| !ROOT_STOPWORDS.contains(word) && *word != share_class.as_str())
        .collect::<Vec<_>>()
        .concat();
    let mut root: String = normalize_text(&joined)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect();
    while root.len() < 4 {
        root.push('X');
    }

    Some(format!("{}{}", root, digit))
}

/// Parse then generate, for a full description.
pub fn ticker_for_description(description: &str) -> Option<String> {
    let asset = parse_asset_name(description);
    generate_ticker(&asset.company, asset.share_class, asset.suffix_digit)
}

fn starts_with_words(text: &str, prefix: &str) -> bool {
    match text.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(' '),
        None => false,
    }
}
