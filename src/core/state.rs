//! Shutdown state.
//!
//! Ctrl+C flips a global flag and broadcasts on a `watch` channel. Everything
//! that must stop (the watch loop, queued render tasks, in-flight workers)
//! holds a [`ShutdownSignal`] and awaits it alongside its own work. A second
//! Ctrl+C exits immediately.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Process-wide shutdown broadcaster
static GLOBAL: LazyLock<Shutdown> = LazyLock::new(Shutdown::new);

/// Owner side of a shutdown broadcast.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            tx: watch::channel(false).0,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.tx.subscribe())
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of a shutdown broadcast.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Whether shutdown was already requested.
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once shutdown is requested. Never resolves if the owner is
    /// dropped without triggering.
    pub async fn cancelled(&mut self) {
        if self.0.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            crate::log!("kiln"; "forced exit");
            std::process::exit(130);
        }
        crate::log!("kiln"; "shutting down... (Ctrl+C again to force)");
        GLOBAL.trigger();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Subscribe to the process-wide shutdown broadcast.
pub fn shutdown_signal() -> ShutdownSignal {
    GLOBAL.signal()
}
