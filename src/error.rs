use std::{path::PathBuf, time::Duration};

use thiserror::Error;

pub type Result<T> = core::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Required page element is missing. Field: {field}")]
    LocatorNotFound { field: String },

    #[error("Could not parse page: {0}")]
    Parse(String),

    #[error("No new file appeared in {dir:?} within {waited:?}")]
    DownloadTimeout { dir: PathBuf, waited: Duration },

    #[error("Downloaded file {path:?} is not a valid document: {reason}")]
    ValidationFailure { path: PathBuf, reason: String },

    #[error("Gave up on {action} after {attempts} attempts")]
    ExhaustedRetries { action: String, attempts: u8 },

    #[error("WebDriver Error: {0}")]
    Driver(#[from] thirtyfour::error::WebDriverError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<url::ParseError> for ScrapeError {
    fn from(e: url::ParseError) -> Self {
        ScrapeError::Parse(format!("Invalid search url: {}", e))
    }
}

impl ScrapeError {
    pub fn missing(field: impl Into<String>) -> Self {
        ScrapeError::LocatorNotFound {
            field: field.into(),
        }
    }
}

/// A failure scoped to one target. Carries the markup visible when it happened
/// so the caller can dump it for offline diagnosis.
#[derive(Debug, Error)]
#[error("Crawl of target {target} failed: {source}")]
pub struct CrawlError {
    pub target: String,
    #[source]
    pub source: ScrapeError,
    pub page_source: Option<String>,
}
