//! Project configuration (`kiln.json`).
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error      # ConfigError, ConfigDiagnostics
//! ├── section    # watch / format / concurrency / merge sections
//! ├── util       # config discovery, path resolution
//! └── mod.rs     # Config (this file)
//! ```
//!
//! All paths in the file are relative to the directory holding it. After
//! loading, every path is absolute and normalized, and the value is shared
//! read-only as `Arc<Config>`: each render batch captures its own snapshot.

mod error;
mod section;
mod util;

pub use error::{ConfigDiagnostics, ConfigError};
pub use section::{Concurrency, FormatConfig, MergeStrategy, WatchConfig};

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use util::{find_config_file, resolve_config_path};

/// Default config filename
pub const CONFIG_FILE: &str = "kiln.json";

/// Root configuration structure representing `kiln.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Directory scanned for entry points
    pub entry_root: PathBuf,

    /// Directory receiving rendered documents
    pub output_root: PathBuf,

    /// Directory holding host templates
    pub template_root: PathBuf,

    /// Entry-point extensions (without the dot)
    #[serde(default = "defaults::extensions")]
    pub extensions: Vec<String>,

    /// Extension of templates and of rendered output files
    #[serde(default = "defaults::template_extension")]
    pub template_extension: String,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Live-reload WebSocket port
    #[serde(default = "defaults::port")]
    pub port: u16,

    #[serde(default)]
    pub concurrency: Concurrency,

    #[serde(default)]
    pub format: FormatConfig,

    /// Template-merge strategy identifier
    #[serde(default)]
    pub merge: MergeStrategy,

    /// Render worker command line; the task request is written to its stdin
    #[serde(default = "defaults::renderer")]
    pub renderer: Vec<String>,

    /// Per-task worker timeout
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Time in-flight workers get to finish after a shutdown request
    #[serde(default = "defaults::grace_ms")]
    pub grace_ms: u64,

    /// Bound live-reload port, set at runtime when live reload is on
    #[serde(skip)]
    pub live_reload: Option<u16>,

    /// Command-line values, re-applied when the file is reloaded
    #[serde(skip)]
    pub overrides: Overrides,
}

/// Values given on the command line. They win over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Absolute output directory
    pub output_root: Option<PathBuf>,
    pub port: Option<u16>,
}

impl Overrides {
    pub fn from_cli(cli: &Cli) -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self {
            output_root: cli
                .render
                .out_dir
                .as_deref()
                .map(|dir| resolve_config_path(dir, &cwd)),
            port: cli.render.port,
        }
    }
}

mod defaults {
    pub fn extensions() -> Vec<String> {
        vec!["jsx".into(), "tsx".into()]
    }
    pub fn template_extension() -> String {
        "html".into()
    }
    pub fn port() -> u16 {
        35729
    }
    pub fn renderer() -> Vec<String> {
        vec!["node".into(), "kiln-render.mjs".into()]
    }
    pub fn timeout_ms() -> u64 {
        30_000
    }
    pub fn grace_ms() -> u64 {
        2_000
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            entry_root: PathBuf::from("src/pages"),
            output_root: PathBuf::from("dist"),
            template_root: PathBuf::from("templates"),
            extensions: defaults::extensions(),
            template_extension: defaults::template_extension(),
            watch: WatchConfig::default(),
            port: defaults::port(),
            concurrency: Concurrency::default(),
            format: FormatConfig::default(),
            merge: MergeStrategy::default(),
            renderer: defaults::renderer(),
            timeout_ms: defaults::timeout_ms(),
            grace_ms: defaults::grace_ms(),
            live_reload: None,
            overrides: Overrides::default(),
        }
    }
}

impl Config {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file, applies CLI overrides
    /// and validates the result.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let path = find_config_file(&cli.config)
            .ok_or_else(|| ConfigError::NotFound(cli.config.clone()))?;

        let mut config = Self::from_path(&path)?;
        config.apply(Overrides::from_cli(cli));

        config.validate()?.print_warnings();
        Ok(config)
    }

    /// Re-read the file this config came from, keeping command-line
    /// overrides and runtime state. The current value stays untouched on
    /// error.
    pub fn reload(&self) -> Result<Self, ConfigError> {
        let mut next = Self::from_path(&self.config_path)?;
        next.apply(self.overrides.clone());
        next.live_reload = self.live_reload;
        next.validate()?.print_warnings();
        Ok(next)
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(out_dir) = &overrides.output_root {
            self.output_root = out_dir.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        self.overrides = overrides;
    }

    /// Read, parse and resolve a config file (no validation).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config_path = crate::utils::path::normalize_path(path);
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let (mut config, ignored) =
            Self::parse(&content).map_err(|e| ConfigError::Parse(config_path.clone(), e))?;
        for key in ignored {
            crate::log!("config"; "unknown field `{}` ignored", key);
        }

        config.config_path = config_path;
        config.finalize(&root);
        Ok(config)
    }

    /// Parse JSON, collecting the paths of unknown keys.
    fn parse(content: &str) -> Result<(Self, Vec<String>), serde_json::Error> {
        let mut ignored = Vec::new();
        let mut de = serde_json::Deserializer::from_str(content);
        let config: Self = serde_ignored::deserialize(&mut de, |path| {
            ignored.push(path.to_string());
        })?;
        de.end()?;
        Ok((config, ignored))
    }

    /// Resolve all paths against the project root.
    fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.entry_root = resolve_config_path(&self.entry_root, root);
        self.output_root = resolve_config_path(&self.output_root, root);
        self.template_root = resolve_config_path(&self.template_root, root);
        for ext in &mut self.extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }
        self.template_extension = self.template_extension.trim_start_matches('.').to_string();
    }

    /// Validate a finalized config, returning the collected warnings.
    pub fn validate(&self) -> Result<ConfigDiagnostics, ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        if !self.entry_root.is_dir() {
            diag.error_with_hint(
                "entryRoot",
                format!("directory `{}` does not exist", self.entry_root.display()),
                "point entryRoot at the directory holding your page components",
            );
        }
        if !self.template_root.is_dir() {
            diag.warn(
                "templateRoot",
                format!(
                    "directory `{}` does not exist, the built-in template will be used",
                    self.template_root.display()
                ),
            );
        }
        if self.output_root == self.entry_root || self.entry_root.starts_with(&self.output_root) {
            diag.error("outputRoot", "must not contain the entry root");
        }
        if self.extensions.is_empty() || self.extensions.iter().any(String::is_empty) {
            diag.error("extensions", "needs at least one non-empty extension");
        }
        if self.template_extension.is_empty() {
            diag.error("templateExtension", "must not be empty");
        }
        if !(1..=8).contains(&self.format.indent) {
            diag.error("format.indent", "must be between 1 and 8");
        }
        if self.timeout_ms == 0 {
            diag.error("timeoutMs", "must be greater than 0");
        }
        match self.renderer.first() {
            None => diag.error_with_hint(
                "renderer",
                "render worker command is empty",
                "e.g. [\"node\", \"kiln-render.mjs\"]",
            ),
            Some(program) if which::which(program).is_err() => diag.warn(
                "renderer",
                format!("`{program}` was not found on PATH, every render will fail to start"),
            ),
            Some(_) => {}
        }

        diag.into_result()
    }

    /// Whether `path` has one of the configured entry-point extensions.
    pub fn is_entry_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Pretty JSON written by `kiln init`.
    pub fn template() -> String {
        let mut out = serde_json::to_string_pretty(&Self::default()).unwrap_or_default();
        out.push('\n');
        out
    }
}
