//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, FiasError>;

#[derive(Error, Debug)]
pub enum FiasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {setting}: {value}")]
    InvalidSetting { setting: &'static str, value: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Progress template error: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
}
