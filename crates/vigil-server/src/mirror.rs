//! Per-user mirror on server-local storage
//!
//! Every operation is scoped to `<backuppath>/<username>/`. Relative paths
//! arriving from the wire are re-validated component by component, so no
//! computed target can leave the sandbox regardless of what the router let
//! through.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use vigil::digest::file_sha256;
use vigil::VigilError;

use crate::error::{ApiError, ApiResult};

/// Root of the per-user sandboxes
#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Sandbox directory of a user
    pub fn sandbox(&self, user: &str) -> PathBuf {
        self.root.join(user)
    }

    /// Map a wire-relative path into the user's sandbox. Only plain name
    /// components are allowed; anything else is a bad path.
    fn resolve(&self, user: &str, rel: &str) -> ApiResult<PathBuf> {
        let rel_path = Path::new(rel);
        for component in rel_path.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(ApiError::BadRequest("Bad path".to_string())),
            }
        }
        Ok(self.sandbox(user).join(rel_path))
    }

    /// Write file content at the sandbox-relative path, creating parent
    /// directories as needed. The bytes land in a temporary file first and
    /// are renamed into place, so a failed write never leaves a corrupt
    /// file at the final name.
    pub fn save_file(&self, user: &str, rel: &str, bytes: &[u8]) -> ApiResult<()> {
        let target = self.resolve(user, rel)?;
        let parent = target
            .parent()
            .ok_or_else(|| ApiError::BadRequest("Bad path".to_string()))?;
        std::fs::create_dir_all(parent)?;

        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        staged.write_all(bytes)?;
        staged.flush()?;
        staged
            .persist(&target)
            .map_err(|e| ApiError::Storage(e.error))?;
        Ok(())
    }

    /// Recursively create the directory. The empty relative path creates
    /// the sandbox itself.
    pub fn new_directory(&self, user: &str, rel: &str) -> ApiResult<()> {
        let target = self.resolve(user, rel)?;
        std::fs::create_dir_all(target)?;
        Ok(())
    }

    /// SHA-256 of the file at the sandbox-relative path, or `None` when no
    /// regular file is there.
    pub fn file_digest(&self, user: &str, rel: &str) -> ApiResult<Option<String>> {
        let target = self.resolve(user, rel)?;
        if !target.is_file() {
            return Ok(None);
        }
        let digest = file_sha256(&target).map_err(|e| match e {
            VigilError::Io(io) => ApiError::Storage(io),
            other => ApiError::Internal(other.to_string()),
        })?;
        Ok(Some(digest))
    }

    /// Reconcile a mirror directory against the client's children listing:
    /// every entry the client no longer has is deleted recursively. Returns
    /// whether the directory exists. This is how client-side deletions the
    /// client never names explicitly reach the mirror.
    pub fn probe_directory(
        &self,
        user: &str,
        rel: &str,
        children: &BTreeSet<String>,
    ) -> ApiResult<bool> {
        let target = self.resolve(user, rel)?;
        if !target.is_dir() {
            return Ok(false);
        }

        for entry in std::fs::read_dir(&target)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if children.contains(&name) {
                continue;
            }
            tracing::debug!("reaping stale mirror entry {}/{}", rel, name);
            let stale = entry.path();
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&stale)?;
            } else {
                std::fs::remove_file(&stale)?;
            }
        }
        Ok(true)
    }

    /// Recursively delete the entry. Returns false when nothing was there.
    /// The empty relative path is refused: it names the sandbox itself.
    pub fn delete(&self, user: &str, rel: &str) -> ApiResult<bool> {
        if rel.is_empty() {
            return Err(ApiError::BadRequest("Bad path".to_string()));
        }
        let target = self.resolve(user, rel)?;

        if target.is_dir() {
            std::fs::remove_dir_all(&target)?;
            Ok(true)
        } else if target.symlink_metadata().is_ok() {
            std::fs::remove_file(&target)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
