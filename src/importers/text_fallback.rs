// Text fallback - recovers trade lines straight from page text
//
// Table reconstruction sometimes loses lines, typically trades split across a
// page break. Each trade line still reads
// `1-BOVESPA <C|V> <market> [prazo] <asset> [#] <qty> <price> <value> <D|C>`.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::nota_corretagem::{Side, Transaction};
use crate::normalize::normalize_number;
use crate::tickers::TickerResolver;

pub const MARKER: &str = "1-BOVESPA";

static TRADE_LINE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"1-BOVESPA\s+([CV])\s+(\w+)\s+(.+?)\s+#?\s*(\d+)\s+([\d.,]+)\s+([\d.,]+)\s+([DC])",
    )
    .case_insensitive(true)
    .build()
    .expect("valid trade line pattern")
});

/// Raw fields of one matched trade line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeLine {
    pub side: Side,
    pub market: String,
    pub asset_name: String,
    pub quantity: String,
    pub price: String,
    pub value: String,
    pub debit_credit: String,
}

/// Every trade line in `text`, in order of appearance.
pub fn scan_trade_lines(text: &str) -> Vec<TradeLine> {
    if !text.contains(MARKER) {
        return Vec::new();
    }

    TRADE_LINE
        .captures_iter(text)
        .map(|caps| {
            let group = |i: usize| caps.get(i).map_or("", |m| m.as_str()).trim().to_string();
            TradeLine {
                side: Side::from_marker(&group(1)),
                market: group(2),
                asset_name: group(3),
                quantity: group(4),
                price: group(5),
                value: group(6),
                debit_credit: group(7).to_uppercase(),
            }
        })
        .collect()
}

/// Trade lines turned into transactions dated `date`.
///
/// Lines whose asset cannot be resolved, or that lack a quantity or a
/// price, are dropped.
pub fn operations_from_text(text: &str, date: &str, resolver: &TickerResolver) -> Vec<Transaction> {
    scan_trade_lines(text)
        .into_iter()
        .filter_map(|line| {
            let Some(ticker) = resolver.resolve(&[line.asset_name.as_str()]) else {
                debug!("Text line asset '{}' not resolved", line.asset_name);
                return None;
            };
            let quantity = normalize_number(line.quantity.as_str());
            let price = normalize_number(line.price.as_str());
            if quantity.is_empty() || price.is_empty() {
                return None;
            }
            Some(Transaction {
                date: Some(date.to_string()),
                ticker,
                side: line.side,
                quantity,
                price,
            })
        })
        .collect()
}
