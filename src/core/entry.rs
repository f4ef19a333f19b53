//! Entry points: source files that export a renderable node.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::path::relative_id;

/// A discovered entry point.
///
/// Identity is the `/`-separated path relative to the entry root, so two
/// entries compare equal regardless of how their absolute path was spelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryPoint {
    /// Relative identifier, e.g. `blog/post.tsx`
    pub id: String,
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Lowercase extension without the dot
    pub ext: String,
}

impl EntryPoint {
    /// Build an entry point for `path` below `root` (both normalized).
    pub fn new(path: &Path, root: &Path) -> Option<Self> {
        let id = relative_id(path, root)?;
        let ext = path.extension().and_then(OsStr::to_str)?.to_ascii_lowercase();
        Some(Self {
            id,
            path: path.to_path_buf(),
            ext,
        })
    }

    /// File name without extension (`post` for `blog/post.tsx`).
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
    }

    /// Relative identifier with the extension removed (`blog/post`).
    ///
    /// `ext` is lowercased, so the suffix is matched ignoring ASCII case.
    pub fn id_without_ext(&self) -> &str {
        let Some(split) = self.id.len().checked_sub(self.ext.len() + 1) else {
            return &self.id;
        };
        match self.id.split_at_checked(split) {
            Some((base, suffix))
                if suffix
                    .strip_prefix('.')
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.ext)) =>
            {
                base
            }
            _ => &self.id,
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
