use std::path::{Path, PathBuf};
use thiserror::Error;

pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("invalid signature '{name}': {reason}")]
    InvalidSignature { name: String, reason: String },

    #[error("path not found: {0}")]
    MissingPath(PathBuf),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("output error: {0}")]
    SinkError(String),
}

impl ScanError {
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        ScanError::InvalidPattern {
            pattern: pattern.into(),
            source: Box::new(source),
        }
    }

    pub fn invalid_signature(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ScanError::InvalidSignature {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_path(path: &Path) -> Self {
        ScanError::MissingPath(path.to_path_buf())
    }

    pub fn file_not_found(path: &Path) -> Self {
        ScanError::FileNotFound(path.to_path_buf())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        ScanError::ConfigError(msg.into())
    }

    pub fn sink_error(msg: impl Into<String>) -> Self {
        ScanError::SinkError(msg.into())
    }
}
