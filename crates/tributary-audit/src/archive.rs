//! ContentArchive - directory-tree audit sink
//!
//! Buffers payloads recorded during a run and writes them below a single run
//! directory when the run closes:
//!
//! ```text
//! <base>/tributary_<timestamp>_<run>/
//!     content/source/<kind>/<name>.json
//!     content/destination/<kind>/<name>.json
//!     content/altered/<kind>/<name>.json
//!     output.log
//!     homework.txt
//! ```
//!
//! Nothing is written when no file was added.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info};
use tributary_core::domain::RunId;
use tributary_core::ports::IAuditSink;

use crate::error::AuditError;

/// Buffered directory-tree archive for one run
#[derive(Debug)]
pub struct ContentArchive {
    root: PathBuf,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl ContentArchive {
    /// Archive writing directly into `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Mutex::new(BTreeMap::new()),
        }
    }

    /// Archive writing into a fresh, timestamped directory below `base`
    pub fn for_run(base: &Path, run_id: &RunId) -> Self {
        let dir = format!(
            "tributary_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            run_id.short()
        );
        Self::new(base.join(dir))
    }

    /// Directory files are written into
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Buffered paths, sorted
    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Buffered payload at `path`
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().get(path).cloned()
    }

    fn write_all(&self) -> Result<Option<PathBuf>, AuditError> {
        let files = self.lock().clone();
        if files.is_empty() {
            debug!("Content archive is empty, nothing to write");
            return Ok(None);
        }

        for (relative, data) in &files {
            let target = self.resolve(relative)?;
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|source| AuditError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::write(&target, data).map_err(|source| AuditError::Write {
                path: target.clone(),
                source,
            })?;
        }

        info!(
            root = %self.root.display(),
            files = files.len(),
            "Content archive written"
        );
        Ok(Some(self.root.clone()))
    }

    /// Join a relative archive path onto the root, refusing anything that
    /// would land outside it.
    fn resolve(&self, relative: &str) -> Result<PathBuf, AuditError> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.is_empty() {
            return Err(AuditError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl IAuditSink for ContentArchive {
    fn add_file(&self, path: &str, data: Vec<u8>) {
        self.lock().insert(path.to_string(), data);
    }

    fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    fn file_count(&self) -> usize {
        self.lock().len()
    }

    fn write_to_disk(&self) -> anyhow::Result<Option<PathBuf>> {
        Ok(self.write_all()?)
    }
}

/// Make a component name safe to use as a single path segment
pub fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
