//! Output paths and writes.
//!
//! `pages/blog/post.tsx` → `<outputRoot>/blog/post.html`: the entry's
//! relative path re-rooted under the output root with the template extension.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::task::{ErrorKind, TaskError};
use crate::config::Config;
use crate::core::EntryPoint;
use crate::utils::hash;

pub fn output_path(entry: &EntryPoint, config: &Config) -> PathBuf {
    config.output_root.join(format!(
        "{}.{}",
        entry.id_without_ext(),
        config.template_extension
    ))
}

/// Write `content` unless the file already holds it. Returns whether the
/// file was left unchanged.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool, TaskError> {
    if hash::is_fresh(path, content) {
        return Ok(true);
    }
    let write = || -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    };
    write().map_err(|e| {
        TaskError::new(ErrorKind::Write, format!("cannot write output: {e}")).with_cause(path)
    })?;
    Ok(false)
}

/// Delete the artifact of a removed entry, then prune directories it leaves
/// empty (never the output root itself).
pub fn remove_output(entry: &EntryPoint, config: &Config) -> io::Result<Option<PathBuf>> {
    let path = output_path(entry, config);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    }

    let mut dir = path.parent();
    while let Some(d) = dir {
        if d == config.output_root || !d.starts_with(&config.output_root) {
            break;
        }
        if fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
    Ok(Some(path))
}
