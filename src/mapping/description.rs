//! Description normalizer for mapping keys.
//!
//! Raw title cells carry operation and market prefixes ("1-BOVESPA",
//! "RV LISTADO C FRACIONARIO", ...) and sometimes the quantity/price columns
//! bleeding into the text. Stripping them yields a stable dictionary key such
//! as `Embraer ON NM`. Case and share-class suffixes are preserved.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

fn pattern(re: &str) -> Regex {
    RegexBuilder::new(re)
        .case_insensitive(true)
        .build()
        .expect("valid description pattern")
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| pattern(r"\s+"));

static NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| pattern(r"^\s*\d+[\-\s]*"));

/// Operation prefixes, most specific first.
static OPERATION_PREFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^NB3\s+RV\s+LISTADO\s+C\s+FRACIONARIO\s+",
        r"^RV\s+LISTADO\s+V\s+VISTA\s+",
        r"^RV\s+LISTADO\s+V\s+FRACIONARIO\s+",
        r"^RV\s+LISTADO\s+C\s+FRACIONARIO\s+",
        r"^C\s+FRACIONARIO\s+",
        r"^C\s+VISTA\s+",
        r"^V\s+FRACIONARIO\s+",
        r"^V\s+VISTA\s+",
        r"^RV\s+LISTADO\s+",
    ]
    .iter()
    .map(|re| pattern(re))
    .collect()
});

static MARKET_TOKEN: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^(?:BOVESPA|B3|FRACIONARIO|FRACIONÁRIO|VISTA|C/V|NEGOCIAÇÃO|NEGOCIACAO|COTACAO)\b[\s\-]*")
});

static STRAY_SYMBOLS: Lazy<Regex> = Lazy::new(|| pattern(r"[@#*|]+"));

static NUMERIC_TAIL: Lazy<Regex> = Lazy::new(|| pattern(r"\s+\d+[\d\s,.\-/]*[A-Za-z]?$"));

static SHARE_CLASS_IN_ROW: Lazy<Regex> = Lazy::new(|| {
    pattern(r"([A-Za-zÀ-ÿ0-9.\-\s]{2,60}?)\s+(ON|PN|PNA|PNB|DR)(?:\s+(NM|N1|N2|N3))?")
});

static SHARE_CLASS_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    pattern(r"([A-Za-zÀ-ÿ0-9.\- ]{2,60}?)\s+(ON|PN|PNA|PNB|DR)\b(?:\s+NM|\s+N1|\s+N2)?")
});

static LETTER_WORDS: Lazy<Regex> =
    Lazy::new(|| pattern(r"([A-Za-zÀ-ÿ]{3,}(?:\s+[A-Za-zÀ-ÿ]{2,}){0,3})"));

static HAS_LETTER: Lazy<Regex> = Lazy::new(|| pattern(r"[A-Za-zÀ-ÿ]"));

const EDGE_PUNCTUATION: &[char] = &[' ', '\t', '\n', '\r', '\x0b', '\x0c', '-', '.', ',', ';', ':', '(', ')'];

/// Normalize a raw asset description into a mapping key.
///
/// Idempotent: the single pass is repeated until nothing changes, so
/// `normalize_description(normalize_description(x)) == normalize_description(x)`.
pub fn normalize_description(desc: &str) -> String {
    let mut current = desc.to_string();
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_pass(desc: &str) -> String {
    let mut s = collapse(desc.trim());

    s = NUMERIC_PREFIX.replace(&s, "").into_owned();

    for prefix in OPERATION_PREFIXES.iter() {
        s = prefix.replace(&s, "").into_owned();
    }

    // stacked tokens such as "BOVESPA VISTA"
    loop {
        let stripped = MARKET_TOKEN.replace(&s, "").into_owned();
        if stripped == s {
            break;
        }
        s = stripped;
    }

    s = STRAY_SYMBOLS.replace_all(&s, "").into_owned();
    s = NUMERIC_TAIL.replace(&s, "").into_owned();

    collapse(s.trim_matches(EDGE_PUNCTUATION))
}

fn collapse(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").into_owned()
}

/// Pull an asset description out of a table row.
///
/// The title column (index 5, "Especificação do título") is used when it
/// holds letters; else the first `<name> ON|PN|PNA|PNB|DR [NM|N1|N2|N3]`
/// phrase in the row; else the first run of letter words longer than three
/// characters.
pub fn description_from_row<S: AsRef<str>>(cells: &[S]) -> Option<String> {
    if let Some(title) = cells.get(5).map(|c| c.as_ref().trim()) {
        if HAS_LETTER.is_match(title) {
            return non_empty(normalize_description(title));
        }
    }

    let row_text = cells
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(caps) = SHARE_CLASS_IN_ROW.captures(&row_text) {
        let company = caps.get(1).map_or("", |m| m.as_str()).trim();
        let class = caps.get(2).map_or("", |m| m.as_str()).to_uppercase();
        let rebuilt = match caps.get(3) {
            Some(segment) => format!("{} {} {}", company, class, segment.as_str().to_uppercase()),
            None => format!("{} {}", company, class),
        };
        return non_empty(normalize_description(&rebuilt));
    }

    let candidate = LETTER_WORDS.captures(&row_text)?.get(1)?.as_str().trim();
    if candidate.chars().count() > 3 {
        return non_empty(normalize_description(candidate));
    }
    None
}

/// Every share-class phrase found in free page text, normalized.
pub fn descriptions_from_text(text: &str) -> Vec<String> {
    SHARE_CLASS_IN_TEXT
        .find_iter(text)
        .map(|m| normalize_description(m.as_str().trim()))
        .filter(|d| !d.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
