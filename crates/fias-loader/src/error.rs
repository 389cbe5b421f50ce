//! Loader error types

use thiserror::Error;

use crate::extractor::ExtractError;
use crate::schema::SchemaKey;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Coarse failure class deciding what a failure aborts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Version check or download; aborts the cycle
    Transport,
    /// Malformed XML; aborts the current file
    Decode,
    /// Connection, DDL or DML; aborts the current file
    Storage,
    /// Unpacking; aborts the cycle
    Archive,
    /// Local filesystem
    Io,
    Config,
    /// A file without a classification or a key without a schema
    Schema,
}

/// Errors raised while checking, fetching, unpacking or loading
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] ExtractError),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No schema registered for {0}")]
    UnknownSchema(SchemaKey),

    #[error("Cannot classify {0}")]
    Unclassified(String),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Http(_) | IngestError::Transport(_) => ErrorKind::Transport,
            IngestError::Decode(_) => ErrorKind::Decode,
            IngestError::Storage(_) => ErrorKind::Storage,
            IngestError::Archive(_) => ErrorKind::Archive,
            IngestError::Io(_) => ErrorKind::Io,
            IngestError::Config(_) => ErrorKind::Config,
            IngestError::UnknownSchema(_) | IngestError::Unclassified(_) => ErrorKind::Schema,
        }
    }
}

impl From<zip::result::ZipError> for IngestError {
    fn from(err: zip::result::ZipError) -> Self {
        IngestError::Archive(err.to_string())
    }
}

impl From<config::ConfigError> for IngestError {
    fn from(err: config::ConfigError) -> Self {
        IngestError::Config(err.to_string())
    }
}

impl From<fias_common::FiasError> for IngestError {
    fn from(err: fias_common::FiasError) -> Self {
        match err {
            fias_common::FiasError::Io(e) => IngestError::Io(e),
            other => IngestError::Config(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Io(std::io::Error::other(err))
    }
}
