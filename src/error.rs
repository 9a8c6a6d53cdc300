//! Error handling for the note extractor
//!
//! Defines the error taxonomy for document and mapping operations and
//! establishes a unified Result type using anyhow for context chaining.
//! Row-level problems are never errors: rows that cannot be classified or
//! resolved are simply discarded by the pipeline.

use thiserror::Error;

/// Core error types for extraction and mapping operations
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unparsable document {name}: {reason}")]
    Pdf { name: String, reason: String },

    #[error("document {0} is password protected; set pdf.password in the configuration")]
    PasswordRequired(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("input path not found: {0}")]
    InputNotFound(String),

    #[error("mapping error: {0}")]
    Mapping(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for extractor operations
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = ExtractionError::Pdf {
            name: "Clear 2024 01.pdf".to_string(),
            reason: "corrupt xref".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unparsable document Clear 2024 01.pdf: corrupt xref"
        );
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: Result<()> = Err(anyhow::anyhow!("original error"))
            .context("failed to open archive");
        match result {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("failed to open archive"));
                let debug_msg = format!("{:?}", e);
                assert!(debug_msg.contains("original error"));
            }
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_extraction_error_variants() {
        let pwd = ExtractionError::PasswordRequired("nota.pdf".to_string());
        assert!(pwd.to_string().contains("pdf.password"));

        let missing = ExtractionError::InputNotFound("/tmp/nada".to_string());
        assert!(missing.to_string().starts_with("input path not found"));

        let mapping = ExtractionError::Mapping("test".to_string());
        assert!(mapping.to_string().starts_with("mapping error"));
    }
}
