//! Render task and outcome values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::core::EntryPoint;

/// One unit of work: render `entry` with a frozen configuration snapshot.
#[derive(Debug, Clone)]
pub struct RenderTask {
    pub entry: EntryPoint,
    pub config: Arc<Config>,
}

impl RenderTask {
    pub fn new(entry: EntryPoint, config: Arc<Config>) -> Self {
        Self { entry, config }
    }
}

/// Why a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Entry point failed to load or has an invalid export shape
    ModuleLoad,
    /// The rendering collaborator threw
    Render,
    /// Output formatting failed and formatting is required
    Format,
    /// Template unreadable or insertion point not found
    Template,
    /// Output could not be written
    Write,
    /// Worker failed to start, crashed or timed out
    Process,
    /// Stopped by shutdown before completing
    Cancelled,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ModuleLoad => "module-load-error",
            Self::Render => "render-error",
            Self::Format => "format-error",
            Self::Template => "template-error",
            Self::Write => "write-error",
            Self::Process => "process-error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single pipeline step, folded into [`RenderOutcome::Failed`].
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
    /// File responsible for the failure when it is not the entry itself
    pub cause: Option<PathBuf>,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, path: impl Into<PathBuf>) -> Self {
        self.cause = Some(path.into());
        self
    }
}

/// Result of one task. Always a value, never an error crossing the
/// scheduler boundary.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Succeeded {
        entry: EntryPoint,
        output: PathBuf,
        /// Output already held identical content and was not rewritten
        unchanged: bool,
        /// Non-fatal problems (e.g. best-effort formatting failed)
        warnings: Vec<String>,
    },
    Failed {
        entry: EntryPoint,
        kind: ErrorKind,
        message: String,
        cause: Option<PathBuf>,
    },
}

impl RenderOutcome {
    pub fn failed(entry: EntryPoint, error: TaskError) -> Self {
        Self::Failed {
            entry,
            kind: error.kind,
            message: error.message,
            cause: error.cause,
        }
    }

    pub fn cancelled(entry: EntryPoint, message: impl Into<String>) -> Self {
        Self::failed(entry, TaskError::new(ErrorKind::Cancelled, message))
    }

    pub fn entry(&self) -> &EntryPoint {
        match self {
            Self::Succeeded { entry, .. } | Self::Failed { entry, .. } => entry,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }

    pub fn output(&self) -> Option<&Path> {
        match self {
            Self::Succeeded { output, .. } => Some(output),
            Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for RenderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { entry, output, .. } => {
                write!(f, "{} -> {}", entry, output.display())
            }
            Self::Failed {
                entry,
                kind,
                message,
                cause,
            } => {
                write!(f, "{entry}: {kind}: {message}")?;
                if let Some(cause) = cause {
                    write!(f, " ({})", cause.display())?;
                }
                Ok(())
            }
        }
    }
}
