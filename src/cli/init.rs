//! `kiln init`: write a default configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::Config;

/// Write the default config to `path` (relative to `cwd`).
pub fn write_config(path: &Path, cwd: &Path, force: bool) -> Result<PathBuf> {
    let path = cwd.join(path);
    if path.exists() && !force {
        bail!(
            "`{}` already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create `{}`", parent.display()))?;
    }
    fs::write(&path, Config::template())
        .with_context(|| format!("cannot write `{}`", path.display()))?;

    crate::log!("init"; "wrote {}", path.display());
    Ok(path)
}
