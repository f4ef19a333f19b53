//! Rendering: one entry point in, one outcome out.
//!
//! # Module Structure
//!
//! ```text
//! render/
//! ├── task       # RenderTask, RenderOutcome, ErrorKind
//! ├── scheduler  # bounded pool over an Executor
//! ├── executor   # ProcessExecutor: worker process + post-processing
//! ├── worker     # worker stdin/stdout protocol
//! ├── format     # best-effort markup indentation
//! ├── template   # host template lookup and built-in fallback
//! ├── merge      # TemplateMerge strategies
//! └── output     # output paths, freshness-checked writes
//! ```

mod executor;
mod format;
mod merge;
mod output;
mod scheduler;
mod task;
pub mod template;
mod worker;

pub use executor::ProcessExecutor;
pub use output::{output_path, remove_output};
pub use scheduler::Scheduler;
pub use task::{ErrorKind, RenderOutcome, RenderTask, TaskError};

use std::sync::Arc;

use crate::config::Config;
use crate::core::{EntryPoint, ShutdownSignal};

/// Scheduler over worker processes, sized from the configuration.
pub fn process_scheduler(
    config: &Config,
    shutdown: ShutdownSignal,
) -> Scheduler<ProcessExecutor> {
    Scheduler::new(ProcessExecutor, config.concurrency.limit(), shutdown)
}

/// Tasks for `entries`, all sharing one configuration snapshot.
pub fn tasks_for(
    entries: impl IntoIterator<Item = EntryPoint>,
    config: &Arc<Config>,
) -> Vec<RenderTask> {
    entries
        .into_iter()
        .map(|entry| RenderTask::new(entry, Arc::clone(config)))
        .collect()
}
