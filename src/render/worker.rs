//! Render worker protocol.
//!
//! One worker process per task. The request is a single JSON line on stdin:
//!
//! ```json
//! {"entry":"/site/pages/home.tsx","id":"home.tsx","root":"/site/pages"}
//! ```
//!
//! The worker imports the module fresh, renders it and prints its response
//! as the last non-empty line on stdout; anything before it (logs from user
//! code) is ignored:
//!
//! ```json
//! {"status":"ok","markup":"<main>…</main>","styles":"…","targetId":"app"}
//! {"status":"error","kind":"module-load","message":"Cannot find module './x'"}
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

use super::task::{ErrorKind, TaskError};

/// Bytes of stderr kept for crash reports.
const STDERR_TAIL: usize = 2048;

#[derive(Debug, Serialize)]
pub struct WorkerRequest<'a> {
    pub entry: &'a Path,
    pub id: &'a str,
    pub root: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerResponse {
    Ok {
        markup: String,
        #[serde(default)]
        styles: Option<String>,
        #[serde(default, rename = "targetId")]
        target_id: Option<String>,
    },
    Error {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    ModuleLoad,
    InvalidExport,
    Render,
}

/// Output of a successful render, export shape validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub markup: String,
    pub styles: Option<String>,
    pub target_id: String,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("worker exited with {status}{}", stderr_suffix(.stderr))]
    Crashed { status: String, stderr: String },

    #[error("worker sent no valid response ({reason}){}", stderr_suffix(.stderr))]
    BadResponse { reason: String, stderr: String },

    #[error("terminated by shutdown")]
    Cancelled,

    #[error("{0}")]
    ModuleLoad(String),

    #[error("invalid export: {0}")]
    InvalidExport(String),

    #[error("{0}")]
    Render(String),
}

impl From<WorkerError> for TaskError {
    fn from(err: WorkerError) -> Self {
        let kind = match &err {
            WorkerError::ModuleLoad(_) | WorkerError::InvalidExport(_) => ErrorKind::ModuleLoad,
            WorkerError::Render(_) => ErrorKind::Render,
            WorkerError::Cancelled => ErrorKind::Cancelled,
            WorkerError::Spawn { .. }
            | WorkerError::Timeout(_)
            | WorkerError::Crashed { .. }
            | WorkerError::BadResponse { .. } => ErrorKind::Process,
        };
        TaskError::new(kind, err.to_string())
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{stderr}")
    }
}

/// Encode the request line written to the worker's stdin.
pub fn encode_request(request: &WorkerRequest<'_>) -> Vec<u8> {
    let mut line = serde_json::to_vec(request).unwrap_or_default();
    line.push(b'\n');
    line
}

/// Interpret a finished worker's output.
///
/// A parseable response wins over the exit status for reported failures, so
/// a worker that prints a `module-load` error and exits 1 yields a
/// module-load failure rather than a crash.
pub fn interpret(
    status: ExitStatus,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<Rendered, WorkerError> {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = tail(&String::from_utf8_lossy(stderr), STDERR_TAIL);

    let response = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(serde_json::from_str::<WorkerResponse>);

    match response {
        Some(Ok(WorkerResponse::Error { kind, message })) => Err(match kind {
            FailureKind::ModuleLoad => WorkerError::ModuleLoad(message),
            FailureKind::InvalidExport => WorkerError::InvalidExport(message),
            FailureKind::Render => WorkerError::Render(message),
        }),
        _ if !status.success() => Err(WorkerError::Crashed {
            status: status.to_string(),
            stderr,
        }),
        Some(Ok(WorkerResponse::Ok {
            markup,
            styles,
            target_id,
        })) => {
            let target_id = validate_target_id(target_id)?;
            Ok(Rendered {
                markup,
                styles: styles.filter(|s| !s.trim().is_empty()),
                target_id,
            })
        }
        Some(Err(err)) => Err(WorkerError::BadResponse {
            reason: err.to_string(),
            stderr,
        }),
        None => Err(WorkerError::BadResponse {
            reason: "empty output".into(),
            stderr,
        }),
    }
}

/// The target id is spliced into `id="…"` lookups and attributes.
fn validate_target_id(id: Option<String>) -> Result<String, WorkerError> {
    let id = id.ok_or_else(|| WorkerError::InvalidExport("missing target element id".into()))?;
    if id.is_empty() {
        return Err(WorkerError::InvalidExport("target element id is empty".into()));
    }
    if id.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>')) {
        return Err(WorkerError::InvalidExport(format!(
            "target element id `{id}` is not a valid id"
        )));
    }
    Ok(id)
}

/// Last `max` bytes of `s`, cut at a char boundary.
fn tail(s: &str, max: usize) -> String {
    let s = s.trim_end();
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &s[start..])
}
