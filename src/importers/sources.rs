// Input discovery - loose PDFs, ZIP archives and folders holding both
//
// Discovery only lists documents; bytes are read one document at a time by
// the batch runner.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::ZipArchive;

use crate::error::ExtractionError;

static YEAR_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year pattern"));

/// Kind of input path given by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Zip,
    Folder,
}

/// Where a document's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    ZipEntry { archive: PathBuf, entry: String },
}

/// One PDF to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// File name used for logs and the year filter.
    pub name: String,
    pub location: Location,
}

impl DocumentRef {
    /// Human label: `file.pdf` or `archive.zip:entry.pdf`.
    pub fn label(&self) -> String {
        match &self.location {
            Location::File(_) => self.name.clone(),
            Location::ZipEntry { archive, entry } => {
                format!("{}:{}", file_name(archive), entry)
            }
        }
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        match &self.location {
            Location::File(path) => {
                fs::read(path).with_context(|| format!("Failed to read {:?}", path))
            }
            Location::ZipEntry { archive, entry } => {
                let mut zip = open_archive(archive)?;
                let mut file = zip
                    .by_name(entry)
                    .with_context(|| format!("Entry {} missing from {:?}", entry, archive))?;
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)
                    .with_context(|| format!("Failed to read {} from {:?}", entry, archive))?;
                Ok(bytes)
            }
        }
    }
}

/// Documents found under an input path, plus unreadable nested archives.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub documents: Vec<DocumentRef>,
    /// Archives inside a folder that could not be listed: (name, reason).
    pub broken_archives: Vec<(String, String)>,
}

/// Classify the input path by extension or directory.
pub fn detect_input_kind<P: AsRef<Path>>(path: P) -> Result<InputKind> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ExtractionError::InputNotFound(path.display().to_string()).into());
    }
    if path.is_dir() {
        return Ok(InputKind::Folder);
    }

    match extension_of(path).as_deref() {
        Some("pdf") => Ok(InputKind::Pdf),
        Some("zip") => Ok(InputKind::Zip),
        other => Err(anyhow!(
            "Unsupported input {:?} (extension {:?}). Supported: .pdf, .zip or a folder",
            path,
            other.unwrap_or("")
        )),
    }
}

/// List every PDF reachable from `path`.
///
/// A folder is scanned one level deep, sorted by name: loose PDFs first, then
/// the PDF entries of each archive in archive order. A top-level archive that
/// cannot be opened is an error; a broken archive inside a folder is only
/// reported.
pub fn discover<P: AsRef<Path>>(path: P) -> Result<Discovery> {
    let path = path.as_ref();
    let mut discovery = Discovery::default();

    match detect_input_kind(path)? {
        InputKind::Pdf => discovery.documents.push(DocumentRef {
            name: file_name(path),
            location: Location::File(path.to_path_buf()),
        }),
        InputKind::Zip => discovery.documents.extend(list_archive(path)?),
        InputKind::Folder => {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)
                .with_context(|| format!("Failed to list folder {:?}", path))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();

            for pdf in entries.iter().filter(|p| extension_of(p).as_deref() == Some("pdf")) {
                discovery.documents.push(DocumentRef {
                    name: file_name(pdf),
                    location: Location::File(pdf.clone()),
                });
            }

            for archive in entries.iter().filter(|p| extension_of(p).as_deref() == Some("zip")) {
                match list_archive(archive) {
                    Ok(documents) => discovery.documents.extend(documents),
                    Err(err) => {
                        warn!("Could not list archive {:?}: {:#}", archive, err);
                        discovery
                            .broken_archives
                            .push((file_name(archive), format!("{:#}", err)));
                    }
                }
            }
        }
    }

    info!("Found {} PDF document(s) under {:?}", discovery.documents.len(), path);
    Ok(discovery)
}

fn list_archive(path: &Path) -> Result<Vec<DocumentRef>> {
    let archive = open_archive(path)?;
    Ok(archive
        .file_names()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .into_iter()
        .filter(|entry| entry.to_lowercase().ends_with(".pdf"))
        .map(|entry| DocumentRef {
            name: entry.rsplit('/').next().unwrap_or(&entry).to_string(),
            location: Location::ZipEntry {
                archive: path.to_path_buf(),
                entry,
            },
        })
        .collect())
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open archive {:?}", path))?;
    ZipArchive::new(file)
        .map_err(|e| ExtractionError::Archive(format!("{}: {}", path.display(), e)).into())
}

/// Year printed in a file name, e.g. `Clear 2024 01 Janeiro.pdf`.
pub fn year_from_filename(name: &str) -> Option<i32> {
    YEAR_IN_NAME
        .find(name)
        .and_then(|m| m.as_str().parse().ok())
}

/// Year filter: without a target every document passes; with one, names
/// without a year are rejected.
pub fn should_process(name: &str, target_year: Option<i32>) -> bool {
    let Some(target) = target_year else {
        return true;
    };
    match year_from_filename(name) {
        Some(year) => year == target,
        None => {
            warn!("Could not find a year in file name: {}", name);
            false
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn year_is_read_from_file_name() {
        assert_eq!(year_from_filename("Clear 2024 01 Janeiro.pdf"), Some(2024));
        assert_eq!(year_from_filename("nota-1999.pdf"), Some(1999));
        assert_eq!(year_from_filename("nota_sem_ano.pdf"), None);
        assert_eq!(year_from_filename("12345.pdf"), None);
    }

    #[test]
    fn year_filter() {
        assert!(should_process("qualquer.pdf", None));
        assert!(should_process("Clear 2024 05.pdf", Some(2024)));
        assert!(!should_process("Clear 2023 05.pdf", Some(2024)));
        assert!(!should_process("sem ano.pdf", Some(2024)));
    }

    #[test]
    fn missing_input_is_reported() {
        let err = discover("/definitely/not/here").unwrap_err();
        assert!(err.to_string().starts_with("input path not found"));
    }

    #[test]
    fn folder_lists_pdfs_then_archive_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b 2024.pdf"), b"%PDF-b").unwrap();
        fs::write(dir.path().join("a 2024.pdf"), b"%PDF-a").unwrap();
        fs::write(dir.path().join("notas.txt"), b"ignored").unwrap();
        write_zip(
            &dir.path().join("mensal.zip"),
            &[("2024/c 2024.pdf", &b"%PDF-c"[..]), ("leia.txt", &b"x"[..])],
        );

        let discovery = discover(dir.path()).unwrap();
        let names: Vec<_> = discovery.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a 2024.pdf", "b 2024.pdf", "c 2024.pdf"]);
        assert_eq!(discovery.documents[2].label(), "mensal.zip:2024/c 2024.pdf");
        assert_eq!(discovery.documents[2].read().unwrap(), b"%PDF-c");
        assert!(discovery.broken_archives.is_empty());
    }

    #[test]
    fn broken_archive_in_folder_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("quebrado.zip"), b"not a zip").unwrap();
        let discovery = discover(dir.path()).unwrap();
        assert!(discovery.documents.is_empty());
        assert_eq!(discovery.broken_archives.len(), 1);
        assert_eq!(discovery.broken_archives[0].0, "quebrado.zip");
    }

    #[test]
    fn broken_top_level_archive_aborts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quebrado.zip");
        fs::write(&path, b"not a zip").unwrap();
        assert!(discover(&path).is_err());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nota.docx");
        fs::write(&path, b"x").unwrap();
        assert!(detect_input_kind(&path).is_err());
        assert_eq!(detect_input_kind(dir.path()).unwrap(), InputKind::Folder);
    }
}
