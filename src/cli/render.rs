//! Default action: render entry points, once or in watch mode.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, bail};

use super::Cli;
use crate::config::Config;
use crate::core::{EntryPoint, ShutdownSignal};
use crate::discovery::is_vendored;
use crate::session::Session;
use crate::utils::path::resolve_path;

pub async fn run(cli: &Cli, config: Config, shutdown: ShutdownSignal) -> Result<ExitCode> {
    let explicit = if cli.render.files.is_empty() {
        None
    } else {
        let cwd = std::env::current_dir()?;
        Some(resolve_files(&cli.render.files, &cwd, &config)?)
    };

    let session = Session::new(config, shutdown);
    if cli.render.watch {
        session.watch(explicit, cli.render.live_reload).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = session.build(explicit).await?;
    Ok(ExitCode::from(report.exit_code()))
}

/// Resolve file arguments against `cwd`, then against the entry root.
pub fn resolve_files(files: &[PathBuf], cwd: &Path, config: &Config) -> Result<Vec<EntryPoint>> {
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let path = resolve_path(file, cwd, &config.entry_root);
        if !path.is_file() {
            bail!("`{}` does not exist", file.display());
        }

        if !config.is_entry_extension(&path) {
            bail!(
                "`{}` is not an entry point (extensions: {})",
                file.display(),
                config.extensions.join(", ")
            );
        }
        if is_vendored(&path) {
            bail!("`{}` is vendored code", file.display());
        }
        let Some(entry) = EntryPoint::new(&path, &config.entry_root) else {
            bail!(
                "`{}` is outside the entry root `{}`",
                file.display(),
                config.entry_root.display()
            );
        };
        entries.push(entry);
    }

    entries.sort();
    entries.dedup();
    Ok(entries)
}
