//! Corretagem - trades out of Brazilian brokerage notes
//!
//! Reads B3 brokerage note PDFs (notas de corretagem), resolves each traded
//! asset description to its ticker and exports the trades to spreadsheets.
//! The `mapping` tools maintain the description→ticker file the resolver
//! reads.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod importers;
pub mod mapping;
pub mod normalize;
pub mod tickers;
pub mod ui;
