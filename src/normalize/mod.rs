//! Text and number normalization shared by the extractor and the mapping tools
//!
//! Brokerage notes print numbers in Brazilian locale ("1.234,56") and asset
//! names in free-form Portuguese with accents, hyphens and stray punctuation.
//! Everything that compares or stores those values goes through this module.

use std::collections::BTreeSet;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Words that carry share-class or listing-segment information but do not
/// help telling one company from another.
const FUZZY_STOPWORDS: [&str; 9] = ["ON", "PN", "NM", "N1", "N2", "ED", "EDUC", "PREFER", "ORDINARIA"];

/// Minimum share of dictionary-key words that must appear in the cell.
pub const FUZZY_MIN_SCORE: f64 = 0.70;

/// Minimum number of shared words that is accepted regardless of the score.
pub const FUZZY_MIN_COMMON_WORDS: usize = 2;

/// Minimum similarity ratio for the typo-tolerant fallback.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Convert a Brazilian-locale number to a dotted decimal string.
///
/// Whitespace (including non-breaking spaces) is dropped. When a comma is
/// present, periods are thousands separators and the comma is the decimal
/// point. Without a comma every character that is not a digit or a period
/// is removed. Never fails; `None` and empty input yield an empty string.
///
/// # Examples
/// ```
/// use corretagem::normalize::normalize_number;
///
/// assert_eq!(normalize_number("1.234,56"), "1234.56");
/// assert_eq!(normalize_number("1\u{a0}234,56"), "1234.56");
/// assert_eq!(normalize_number("123.45"), "123.45");
/// assert_eq!(normalize_number(None::<&str>), "");
/// ```
pub fn normalize_number<'a>(text: impl Into<Option<&'a str>>) -> String {
    let Some(text) = text.into() else {
        return String::new();
    };

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.contains(',') {
        compact.replace('.', "").replace(',', ".")
    } else {
        compact
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect()
    }
}

/// Normalize an asset name for comparison.
///
/// Uppercases, strips accents, turns hyphens and any whitespace into single
/// spaces and drops every other non-alphanumeric character.
///
/// # Examples
/// ```
/// use corretagem::normalize::normalize_text;
///
/// assert_eq!(normalize_text("  Suzano-Papel  on nm "), "SUZANO PAPEL ON NM");
/// assert_eq!(normalize_text("Negociação"), "NEGOCIACAO");
/// ```
pub fn normalize_text(input: &str) -> String {
    let upper = input.to_uppercase();
    let mut out = String::with_capacity(upper.len());
    for ch in upper.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if ch == '-' || ch.is_whitespace() {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Significant words of an asset name.
///
/// Share-class and segment words are removed unless nothing else is left,
/// in which case the full word set is returned.
pub fn significant_words(text: &str) -> BTreeSet<String> {
    let normalized = normalize_text(text);
    let words: BTreeSet<String> = normalized.split(' ').filter(|w| !w.is_empty()).map(str::to_string).collect();

    let significant: BTreeSet<String> = words
        .iter()
        .filter(|w| !FUZZY_STOPWORDS.contains(&w.as_str()))
        .cloned()
        .collect();

    if significant.is_empty() {
        words
    } else {
        significant
    }
}

/// Word-overlap score of `cell` against a dictionary key.
///
/// Returns `Some(score)` with `score = |common| / |key words|` when the
/// match is accepted (score at least 0.70, or at least two shared words),
/// `None` otherwise.
pub fn fuzzy_score(cell: &str, key: &str) -> Option<f64> {
    word_overlap(&significant_words(cell), &significant_words(key))
}

/// [`fuzzy_score`] over precomputed word sets.
pub fn word_overlap(cell_words: &BTreeSet<String>, key_words: &BTreeSet<String>) -> Option<f64> {
    if key_words.is_empty() {
        return None;
    }
    let common = cell_words.intersection(key_words).count();
    let score = common as f64 / key_words.len() as f64;

    if score >= FUZZY_MIN_SCORE || common >= FUZZY_MIN_COMMON_WORDS {
        Some(score)
    } else {
        None
    }
}

/// Ratcliff/Obershelp similarity of two asset names, in `0.0..=1.0`.
///
/// Both sides are passed through [`normalize_text`] first. The ratio is
/// `2·M / T` where `M` is the number of characters in matching blocks and
/// `T` the total length of both strings.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let a: Vec<char> = normalize_text(a).chars().collect();
    let b: Vec<char> = normalize_text(b).chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks found by recursive longest-match.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block inside the given windows; earliest in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                curr[col] = prev[col - 1] + 1;
                if curr[col] > best_size {
                    best_size = curr[col];
                    best_i = i + 1 - best_size;
                    best_j = j + 1 - best_size;
                }
            } else {
                curr[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (best_i, best_j, best_size)
}

/// True when any character of the text is an ASCII digit.
pub fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}
