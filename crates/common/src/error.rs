//! Error types for Coopsuite's shared core

use thiserror::Error;

use crate::fixtures::FixtureKey;

/// Result type alias using the Coopsuite common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Coopsuite common error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid date '{input}': expected dd/mm/yyyy")]
    DateParse { input: String },

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Fixture '{0}' was not produced by any earlier stage")]
    MissingFixture(FixtureKey),

    #[error("Unknown fixture key: {0}")]
    UnknownFixture(String),

    #[error("Failed to persist {path}: {reason}")]
    Persist { path: String, reason: String },
}
