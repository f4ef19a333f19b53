//! Process-isolated render executor.
//!
//! ```text
//! spawn worker ──► request on stdin ──► await exit (timeout / shutdown)
//!       │                                      │
//!       ▼                                      ▼
//!  process-error                      interpret response
//!                                              │
//!                  format → template → merge → live-reload → write
//! ```
//!
//! The worker process is the isolation boundary: user code runs there and
//! nowhere else, so a crash, hang or leaked module cache dies with it. The
//! child is created with `kill_on_drop`, and every early return drops it.
//! On shutdown the worker first gets SIGTERM and `grace_ms` to exit on its
//! own; the drop kills whatever is still running after that.
//! Steps after the worker are plain string work and file IO, run on the
//! blocking pool.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use super::format::format_html;
use super::merge;
use super::output::{output_path, write_if_changed};
use super::scheduler::Executor;
use super::task::{ErrorKind, RenderOutcome, RenderTask, TaskError};
use super::template;
use super::worker::{self, Rendered, WorkerError, WorkerRequest};
use crate::core::ShutdownSignal;

/// Runs the configured `renderer` command once per task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    async fn execute(&self, task: RenderTask, shutdown: ShutdownSignal) -> RenderOutcome {
        if shutdown.is_triggered() {
            return RenderOutcome::cancelled(task.entry, "shut down before start");
        }

        let rendered = match run_worker(&task, shutdown).await {
            Ok(rendered) => rendered,
            Err(err) => return RenderOutcome::failed(task.entry, err.into()),
        };

        let entry = task.entry.clone();
        match tokio::task::spawn_blocking(move || finish(&task, rendered)).await {
            Ok(outcome) => outcome,
            Err(err) => RenderOutcome::failed(
                entry,
                TaskError::new(ErrorKind::Process, format!("render task failed: {err}")),
            ),
        }
    }
}

/// Run one worker process to completion.
async fn run_worker(
    task: &RenderTask,
    mut shutdown: ShutdownSignal,
) -> Result<Rendered, WorkerError> {
    let config = &task.config;
    let (program, args) = config
        .renderer
        .split_first()
        .ok_or_else(|| WorkerError::Spawn {
            program: String::new(),
            source: std::io::Error::other("renderer command is empty"),
        })?;

    let mut child = Command::new(program)
        .args(args)
        .current_dir(&config.root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| WorkerError::Spawn {
            program: program.clone(),
            source,
        })?;

    let request = worker::encode_request(&WorkerRequest {
        entry: &task.entry.path,
        id: &task.entry.id,
        root: &config.entry_root,
    });
    if let Some(mut stdin) = child.stdin.take() {
        // A worker may exit before reading; its exit status tells the story.
        if let Err(e) = stdin.write_all(&request).await {
            crate::debug!("render"; "{}: request not delivered: {}", task.entry, e);
        }
    }

    let pid = child.id();
    let run = collect(child);
    tokio::pin!(run);

    let timeout = config.timeout();
    let mut stopping = false;
    let finished = tokio::select! {
        finished = &mut run => finished,
        _ = tokio::time::sleep(timeout) => return Err(WorkerError::Timeout(timeout)),
        _ = shutdown.cancelled() => {
            stopping = true;
            request_stop(pid);
            match tokio::time::timeout(config.grace(), &mut run).await {
                Ok(finished) => finished,
                Err(_) => return Err(WorkerError::Cancelled),
            }
        }
    };

    let (status, stdout, stderr) = finished.map_err(|source| WorkerError::Spawn {
        program: program.clone(),
        source,
    })?;
    match worker::interpret(status, &stdout, &stderr) {
        // Exited because we asked it to.
        Err(WorkerError::Crashed { .. } | WorkerError::BadResponse { .. }) if stopping => {
            Err(WorkerError::Cancelled)
        }
        result => result,
    }
}

/// Send SIGTERM so the worker can exit cleanly within the grace period.
#[cfg(unix)]
fn request_stop(pid: Option<u32>) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        crate::debug!("render"; "cannot signal worker {}: {}", pid, e);
    }
}

/// No polite stop signal here; the worker is killed once grace runs out.
#[cfg(not(unix))]
fn request_stop(_pid: Option<u32>) {}

/// Wait for exit while draining both output pipes.
async fn collect(mut child: Child) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (out, err, status) = tokio::join!(drain(stdout), drain(stderr), child.wait());
    Ok((status?, out?, err?))
}

async fn drain(pipe: Option<impl AsyncRead + Unpin>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Everything after the worker: format, template, merge, write.
fn finish(task: &RenderTask, rendered: Rendered) -> RenderOutcome {
    let mut warnings = Vec::new();
    match compose(task, rendered, &mut warnings).and_then(|doc| {
        let output = output_path(&task.entry, &task.config);
        let unchanged = write_if_changed(&output, &doc)?;
        Ok((output, unchanged))
    }) {
        Ok((output, unchanged)) => RenderOutcome::Succeeded {
            entry: task.entry.clone(),
            output,
            unchanged,
            warnings,
        },
        Err(err) => RenderOutcome::failed(task.entry.clone(), err),
    }
}

/// Build the final document for a rendered entry.
fn compose(
    task: &RenderTask,
    rendered: Rendered,
    warnings: &mut Vec<String>,
) -> Result<String, TaskError> {
    let config = &task.config;
    let Rendered {
        mut markup,
        styles,
        target_id,
    } = rendered;

    if config.format.enabled {
        match format_html(&markup, config.format.indent) {
            Ok(formatted) => markup = formatted,
            Err(e) if config.format.required => {
                return Err(TaskError::new(ErrorKind::Format, e.to_string()));
            }
            Err(e) => warnings.push(format!("formatting skipped: {e}")),
        }
    }

    let template = template::load(&task.entry, config, &target_id)?;
    let doc = merge::strategy(config.merge)
        .merge(&template.content, &markup, styles.as_deref(), &target_id)
        .map_err(|e| {
            let err = TaskError::new(ErrorKind::Template, e.to_string());
            match template.path() {
                Some(path) => err.with_cause(path),
                None => err,
            }
        })?;

    Ok(match config.live_reload {
        Some(port) => crate::reload::inject_client(&doc, port),
        None => doc,
    })
}
