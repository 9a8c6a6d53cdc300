// Collector - raw asset descriptions across many notes
//
// Walks the input the same way the batch runner does and keeps every
// normalized description found in table rows or page text.

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use super::description::{description_from_row, descriptions_from_text};
use crate::importers::pdf_pages::{self, PdfPage};
use crate::importers::{discover, select_documents, SkippedDocument};
use crate::ui::progress::ProgressEvent;

#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Sorted, unique.
    pub descriptions: Vec<String>,
    pub documents: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// Descriptions of one page: every table row, then the page text.
pub fn descriptions_from_page(page: &PdfPage) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for table in &page.tables {
        for row in table {
            if let Some(desc) = description_from_row(row) {
                found.insert(desc);
            }
        }
    }
    found.extend(descriptions_from_text(&page.text));
    found
}

pub fn collect_descriptions(
    input: &Path,
    year: Option<i32>,
    password: Option<&str>,
    progress: &dyn Fn(ProgressEvent),
) -> Result<Collection> {
    let discovery = discover(input)?;
    let (documents, _) = select_documents(discovery.documents, year);

    let mut collection = Collection::default();
    let mut found = BTreeSet::new();
    let mut seen = HashSet::new();

    progress(ProgressEvent::Started {
        total: documents.len(),
    });
    for doc in &documents {
        let label = doc.label();
        progress(ProgressEvent::Document {
            label: label.clone(),
        });

        let pages = doc.read().and_then(|bytes| {
            if !seen.insert(blake3::hash(&bytes)) {
                return Ok(Vec::new());
            }
            pdf_pages::read_pages(&label, &bytes, password)
        });
        match pages {
            Ok(pages) => {
                collection.documents += 1;
                for page in &pages {
                    found.extend(descriptions_from_page(page));
                }
            }
            Err(err) => {
                error!("Failed to collect from {}: {:#}", label, err);
                collection.skipped.push(SkippedDocument {
                    name: label,
                    reason: format!("{:#}", err),
                });
            }
        }
        progress(ProgressEvent::Advanced);
    }
    progress(ProgressEvent::Finished);

    collection.descriptions = found.into_iter().collect();
    info!(
        "Collected {} unique description(s) from {} document(s)",
        collection.descriptions.len(),
        collection.documents
    );
    Ok(collection)
}

/// One description per line.
pub fn write_descriptions<P: AsRef<Path>>(path: P, descriptions: &[String]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let mut content = descriptions.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
