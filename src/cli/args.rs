//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Incremental prerenderer for component entry points
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (searched upward from the current directory)
    #[arg(short = 'C', long, global = true, default_value = "kiln.json", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub render: RenderArgs,

    /// subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Arguments of the default render action
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Entry points to render (default: everything under the entry root)
    #[arg(value_name = "FILES", value_hint = clap::ValueHint::FilePath)]
    pub files: Vec<PathBuf>,

    /// Keep running and re-render on changes
    #[arg(short, long)]
    pub watch: bool,

    /// Tell connected browsers to refresh after each successful batch
    #[arg(short, long, requires = "watch")]
    pub live_reload: bool,

    /// Output directory (relative to the current directory)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,

    /// Live-reload WebSocket port
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a default kiln.json
    #[command(visible_alias = "i")]
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Print discovered entry points
    #[command(visible_alias = "ls")]
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
