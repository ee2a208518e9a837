use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while flushing the content archive
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive path escapes the archive root: {0}")]
    InvalidPath(String),
}
