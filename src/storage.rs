//! # Transient Upload Storage
//!
//! Each request spools its uploaded image to disk under a unique name and
//! deletes it again on every exit path. Names are `{uuid}_{filename}` so
//! concurrent requests never collide, and the filename component is reduced
//! to a safe character set before it touches the filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Directory of per-request transient upload files.
#[derive(Debug, Clone)]
pub struct TransientStore {
    root: PathBuf,
}

impl TransientStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage directory if it does not exist yet.
    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under a fresh unique name and hand back a guard that
    /// removes the file when dropped.
    pub fn spool(&self, filename: &str, bytes: &[u8]) -> io::Result<TempUpload> {
        let unique_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename));
        let path = self.root.join(unique_name);
        fs::write(&path, bytes)?;
        Ok(TempUpload { path })
    }
}

/// Reduce an uploaded filename to its final path component, restricted to
/// `[A-Za-z0-9._-]`. Anything else (separators, traversal sequences, shell
/// metacharacters) becomes an underscore.
fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// A spooled upload that is deleted when it goes out of scope.
///
/// Deletion failures are logged and discarded: by the time the guard drops,
/// the response has already been computed (or failed) and a cleanup error
/// must not mask it.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            debug!(
                path = %self.path.display(),
                error = %err,
                "Failed to remove transient upload"
            );
        }
    }
}
