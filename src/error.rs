use std::io;

use thiserror::Error;

/// Failures surfaced by the catalog layer.
///
/// Values are cloneable so a single population outcome can be handed to every
/// caller awaiting it.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("cache storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("invalid filter criteria: {0}")]
    InvalidCriteria(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::SourceUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("logger initialization failed: {0}")]
    Logger(String),
}
