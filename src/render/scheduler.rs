//! Bounded render scheduler.
//!
//! Every task is spawned at once but must take a semaphore permit before its
//! executor runs, so at most `limit` executors are active. Tasks are
//! independent: a failure or panic in one only shapes its own outcome.
//! Every input produces exactly one [`RenderOutcome`], in completion order.
//!
//! On shutdown, tasks still waiting for a permit report `cancelled`; running
//! ones receive the signal and report whatever their executor decides.

use std::future::Future;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};

use super::task::{ErrorKind, RenderOutcome, RenderTask, TaskError};
use crate::core::{EntryPoint, ShutdownSignal};

/// Runs one task to completion. Implementations report every failure as a
/// [`RenderOutcome::Failed`] value.
pub trait Executor: Send + Sync + 'static {
    fn execute(
        &self,
        task: RenderTask,
        shutdown: ShutdownSignal,
    ) -> impl Future<Output = RenderOutcome> + Send;
}

pub struct Scheduler<E> {
    executor: Arc<E>,
    limit: usize,
    shutdown: ShutdownSignal,
}

impl<E: Executor> Scheduler<E> {
    pub fn new(executor: E, limit: usize, shutdown: ShutdownSignal) -> Self {
        Self {
            executor: Arc::new(executor),
            limit: limit.max(1),
            shutdown,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run a batch, returning one outcome per task.
    pub async fn run(&self, tasks: Vec<RenderTask>) -> Vec<RenderOutcome> {
        self.run_with(tasks, |_| {}).await
    }

    /// Run a batch, calling `on_done` as each outcome arrives.
    pub async fn run_with(
        &self,
        tasks: Vec<RenderTask>,
        mut on_done: impl FnMut(&RenderOutcome),
    ) -> Vec<RenderOutcome> {
        let permits = Arc::new(Semaphore::new(self.limit));
        let mut set = JoinSet::new();
        let mut slots = FxHashMap::default();
        let total = tasks.len();

        for task in tasks {
            let permits = Arc::clone(&permits);
            let executor = Arc::clone(&self.executor);
            let mut shutdown = self.shutdown.clone();
            let slot_entry = task.entry.clone();

            let handle = set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => None,
                    permit = permits.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return RenderOutcome::cancelled(task.entry, "shut down before start");
                };

                // Nested spawn so a panicking executor still yields an outcome
                // for its own entry.
                let entry = task.entry.clone();
                let run = tokio::spawn(async move { executor.execute(task, shutdown).await });
                match run.await {
                    Ok(outcome) => outcome,
                    Err(err) => RenderOutcome::failed(entry, join_error(err)),
                }
            });
            slots.insert(handle.id(), slot_entry);
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = set.join_next_with_id().await {
            match slot_outcome(joined, &mut slots) {
                Some(outcome) => {
                    on_done(&outcome);
                    outcomes.push(outcome);
                }
                None => crate::log!("error"; "render slot lost without an entry"),
            }
        }
        outcomes
    }
}

/// Outcome of one joined slot. A slot that died without producing one still
/// reports a process error for the entry it was spawned for.
fn slot_outcome(
    joined: Result<(Id, RenderOutcome), JoinError>,
    slots: &mut FxHashMap<Id, EntryPoint>,
) -> Option<RenderOutcome> {
    match joined {
        Ok((id, outcome)) => {
            slots.remove(&id);
            Some(outcome)
        }
        Err(err) => {
            let entry = slots.remove(&err.id())?;
            Some(RenderOutcome::failed(entry, join_error(err)))
        }
    }
}

fn join_error(err: JoinError) -> TaskError {
    let message = match err.try_into_panic() {
        Ok(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            format!("render task panicked: {reason}")
        }
        Err(err) => format!("render task aborted: {err}"),
    };
    TaskError::new(ErrorKind::Process, message)
}
