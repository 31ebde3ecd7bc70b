use thiserror::Error;

use crate::core::{BracketTableError, ParsePeriodError};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures at the edges of the engine: reading files, decoding requests and
/// validating settings. The computations themselves do not fail.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid tax brackets: {0}")]
    Brackets(#[from] BracketTableError),

    #[error("Invalid period: {0}")]
    InvalidPeriod(#[from] ParsePeriodError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Whether the caller sent something unusable, as opposed to a local failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::Io(_))
    }
}
