// Import module - brokerage note PDFs to transactions
//
// The batch runner walks the input, processes one document at a time and
// stops cleanly between documents when cancelled.

pub mod nota_corretagem;
pub mod pdf_pages;
pub mod row_classifier;
pub mod sources;
pub mod text_fallback;

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::tickers::TickerResolver;
use crate::ui::progress::ProgressEvent;

pub use nota_corretagem::{NoteExtractor, Side, Transaction};
pub use pdf_pages::PdfPage;
pub use sources::{discover, DocumentRef};

/// Cooperative stop flag checked between documents.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A document that contributed nothing, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub year: Option<i32>,
    pub password: Option<String>,
}

/// Everything a run produced. When `interrupted` is set, `transactions`
/// holds the documents finished before the stop.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub transactions: Vec<Transaction>,
    pub processed: usize,
    pub failed: usize,
    /// Outside the year filter, or byte-identical to an earlier document.
    pub ignored: usize,
    pub skipped: Vec<SkippedDocument>,
    pub interrupted: bool,
}

/// Documents that pass the year filter, with the ignored count.
pub fn select_documents(documents: Vec<DocumentRef>, year: Option<i32>) -> (Vec<DocumentRef>, usize) {
    let total = documents.len();
    let selected: Vec<_> = documents
        .into_iter()
        .filter(|doc| sources::should_process(&doc.name, year))
        .collect();
    let ignored = total - selected.len();
    (selected, ignored)
}

/// Process every PDF under `input`.
///
/// Only a missing input or an unreadable top-level archive is an error;
/// any per-document failure is recorded in [`BatchOutcome::skipped`].
pub fn run_batch(
    input: &Path,
    options: &BatchOptions,
    resolver: &TickerResolver,
    token: &CancellationToken,
    progress: &dyn Fn(ProgressEvent),
) -> Result<BatchOutcome> {
    if let Some(year) = options.year {
        info!("Year filter active: {}", year);
    }

    let discovery = discover(input)?;
    let mut outcome = BatchOutcome::default();
    for (name, reason) in discovery.broken_archives {
        outcome.failed += 1;
        outcome.skipped.push(SkippedDocument { name, reason });
    }

    let (documents, ignored) = select_documents(discovery.documents, options.year);
    outcome.ignored += ignored;
    if documents.is_empty() {
        warn!("No PDF documents to process under {:?}", input);
    }

    let extractor = NoteExtractor::new(resolver);
    let password = options.password.as_deref();
    let mut seen = HashSet::new();

    progress(ProgressEvent::Started {
        total: documents.len(),
    });
    for doc in &documents {
        if token.is_cancelled() {
            warn!("Interrupted, stopping before {}", doc.label());
            outcome.interrupted = true;
            break;
        }

        let label = doc.label();
        progress(ProgressEvent::Document {
            label: label.clone(),
        });

        match doc.read() {
            Ok(bytes) => {
                if !seen.insert(blake3::hash(&bytes)) {
                    info!("Skipping {}: identical to a document already processed", label);
                    outcome.ignored += 1;
                } else {
                    match extractor.process_document(&label, &bytes, password) {
                        Ok(transactions) => {
                            outcome.processed += 1;
                            outcome.transactions.extend(transactions);
                        }
                        Err(err) => {
                            error!("Failed to process {}: {:#}", label, err);
                            outcome.failed += 1;
                            outcome.skipped.push(SkippedDocument {
                                name: label,
                                reason: format!("{:#}", err),
                            });
                        }
                    }
                }
            }
            Err(err) => {
                error!("Failed to read {}: {:#}", label, err);
                outcome.failed += 1;
                outcome.skipped.push(SkippedDocument {
                    name: label,
                    reason: format!("{:#}", err),
                });
            }
        }
        progress(ProgressEvent::Advanced);
    }
    progress(ProgressEvent::Finished);

    info!(
        "Batch done: {} processed, {} failed, {} ignored, {} record(s){}",
        outcome.processed,
        outcome.failed,
        outcome.ignored,
        outcome.transactions.len(),
        if outcome.interrupted { " (partial)" } else { "" }
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickers::FallbackTable;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    fn resolver() -> TickerResolver {
        TickerResolver::new(FallbackTable::default(), None)
    }

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn year_filter_counts_ignored_documents() {
        let docs = ["a 2023.pdf", "b 2024.pdf", "sem ano.pdf"]
            .iter()
            .map(|name| DocumentRef {
                name: name.to_string(),
                location: sources::Location::File((*name).into()),
            })
            .collect();
        let (selected, ignored) = select_documents(docs, Some(2024));
        assert_eq!(ignored, 2);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "b 2024.pdf");
    }

    #[test]
    fn unparsable_documents_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("quebrado 2024.pdf"), b"not a pdf at all").unwrap();
        fs::write(dir.path().join("copia 2024.pdf"), b"not a pdf at all").unwrap();

        let events = RefCell::new(Vec::new());
        let outcome = run_batch(
            dir.path(),
            &BatchOptions::default(),
            &resolver(),
            &CancellationToken::new(),
            &|event| events.borrow_mut().push(event),
        )
        .unwrap();

        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.ignored, 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(!outcome.interrupted);

        let events = events.into_inner();
        assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 2 }));
        assert_eq!(events.last(), Some(&ProgressEvent::Finished));
    }

    #[test]
    fn cancelled_token_stops_before_first_document() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nota 2024.pdf"), b"%PDF-1.4").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let outcome = run_batch(dir.path(), &BatchOptions::default(), &resolver(), &token, &|_| {})
            .unwrap();
        assert!(outcome.interrupted);
        assert_eq!(outcome.processed + outcome.failed, 0);
    }

    #[test]
    fn missing_input_aborts() {
        let result = run_batch(
            Path::new("/nao/existe"),
            &BatchOptions::default(),
            &resolver(),
            &CancellationToken::new(),
            &|_| {},
        );
        assert!(result.is_err());
    }
}
