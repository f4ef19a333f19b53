//! Core types shared across the codebase.

mod entry;
mod state;

pub use entry::EntryPoint;
pub use state::{Shutdown, ShutdownSignal, setup_shutdown_handler, shutdown_signal};
