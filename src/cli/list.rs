//! `kiln list`: print discovered entry points.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::discovery::discover;
use crate::render::output_path;

#[derive(Serialize)]
struct Listed<'a> {
    id: &'a str,
    path: &'a Path,
    output: PathBuf,
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    write_list(&mut out, config, json)
}

fn write_list(out: &mut impl Write, config: &Config, json: bool) -> Result<()> {
    let entries = discover(config);
    if json {
        let listed: Vec<_> = entries
            .iter()
            .map(|entry| Listed {
                id: &entry.id,
                path: &entry.path,
                output: output_path(entry, config),
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &listed)?;
        writeln!(out)?;
    } else {
        for entry in &entries {
            writeln!(out, "{}", entry.id)?;
        }
    }
    Ok(())
}
