//! Audit sink port (driven/secondary port)
//!
//! Collects payloads recorded during a run and writes them to durable storage
//! once the run ends. `tributary-audit` provides the directory-tree
//! implementation.

use std::path::PathBuf;

/// Buffered store for audit payloads
pub trait IAuditSink: Send + Sync {
    /// Buffer `data` under the relative `path`, replacing any previous entry
    fn add_file(&self, path: &str, data: Vec<u8>);

    /// Whether a payload is already buffered under `path`
    fn contains(&self, path: &str) -> bool;

    /// Number of buffered payloads
    fn file_count(&self) -> usize;

    /// Flush buffered payloads. Writes nothing, and returns `Ok(None)`, when
    /// no file was ever added; otherwise returns the written location.
    fn write_to_disk(&self) -> anyhow::Result<Option<PathBuf>>;
}
