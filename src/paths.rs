/*!
 * Path newtypes for the wire
 *
 * Three path flavors cross this codebase: absolute local paths
 * (`&Path`/`PathBuf`), watched-root-relative paths (`RelPath`), and URL
 * targets where spaces are `%20`. Keeping the relative form in its own type
 * stops absolute paths from leaking into request targets.
 */

use std::path::{Component, Path};

use crate::error::{Result, VigilError};

/// A path relative to the watched root: raw (no escaping), forward slashes,
/// no leading slash. The watched root itself is the empty relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelPath(String);

impl RelPath {
    /// Build the relative path of `abs` under `root`.
    pub fn new(root: &Path, abs: &Path) -> Result<Self> {
        let stripped = abs
            .strip_prefix(root)
            .map_err(|_| VigilError::InvalidPath(abs.to_path_buf()))?;

        let mut parts = Vec::new();
        for comp in stripped.components() {
            match comp {
                Component::Normal(name) => match name.to_str() {
                    Some(s) => parts.push(s),
                    None => return Err(VigilError::InvalidPath(abs.to_path_buf())),
                },
                Component::CurDir => {}
                _ => return Err(VigilError::InvalidPath(abs.to_path_buf())),
            }
        }

        Ok(RelPath(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the watched root itself
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// URL form: every space becomes `%20`. Nothing else is escaped; the
    /// protocol's only percent sequence is `%20`.
    pub fn encode(&self) -> String {
        self.0.replace(' ', "%20")
    }
}
