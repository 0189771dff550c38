use std::path::Path;

use crate::error::{Result, ScrapeError};

/// Structural check run on a downloaded file before it is kept.
pub trait ArtifactValidator {
    fn validate(&self, path: &Path) -> Result<()>;
}

/// Accepts files lopdf can parse into a document with at least one page.
pub struct PdfValidator;

impl ArtifactValidator for PdfValidator {
    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: String| ScrapeError::ValidationFailure {
            path: path.to_path_buf(),
            reason,
        };

        let document = lopdf::Document::load(path).map_err(|e| invalid(e.to_string()))?;
        if document.get_pages().is_empty() {
            return Err(invalid("document has no pages".to_string()));
        }
        Ok(())
    }
}
