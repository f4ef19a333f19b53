//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `resolve_path` - resolve relative paths with fallback directory
//! - `relative_id` - stable `/`-separated identifier below a root

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to lexical cleanup when the path does not exist (removed
/// files still need to match graph keys).
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        };
        lexical_clean(&absolute)
    })
}

/// Resolve `.` and `..` components without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    // A missing leaf under an existing (possibly symlinked) parent should still
    // agree with canonicalized siblings.
    match (out.parent(), out.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(out),
        _ => out,
    }
}

/// Resolve a path that may be relative to `base` or a fallback directory.
///
/// Tries in order:
/// 1. If absolute, use as-is
/// 2. If exists relative to `base` (usually the cwd), normalize to absolute
/// 3. Otherwise, resolve relative to fallback_dir
///
/// ```text
/// // User passes "blog/post.tsx" from the project root, fallback is entry_root
/// ./blog/post.tsx missing → <entry_root>/blog/post.tsx
/// ```
#[inline]
pub fn resolve_path(path: &Path, base: &Path, fallback_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(path);
    }
    let joined = base.join(path);
    if joined.exists() {
        return normalize_path(&joined);
    }
    normalize_path(&fallback_dir.join(path))
}

/// Identifier of `path` relative to `root`, always `/`-separated.
///
/// Returns `None` when `path` is not below `root`.
pub fn relative_id(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
