//! Change watcher.
//!
//! Watches the derived root set and hands debounced change batches to the
//! session over a channel. Implements the "Watcher-First" pattern: the
//! subscription exists before the initial build, so edits made while it runs
//! are not lost.
//!
//! Architecture:
//! ```text
//! notify → bridge thread → Debouncer (pure timing) → Vec<ChangeEvent> → session
//!                                                     session: classify::plan
//! ```
//!
//! The session recomputes the root set after each graph rebuild and
//! publishes it through [`Watcher::roots_sender`].

// Raw changes -> affected entry points.
pub mod classify;
// Pure timing and deduplication.
mod debouncer;
// `watch.extra` glob patterns.
pub mod pattern;
// Watch root attach/re-attach lifecycle.
pub mod roots;
// Shared fs event types.
mod types;

#[cfg(test)]
mod tests;

pub use classify::{ChangePlan, plan};
pub use pattern::ExtraPattern;
pub use roots::{WatchRoot, compute as compute_roots};
pub use types::ChangeEvent;

use std::time::Duration;

use crossbeam::channel;
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher};
use tokio::sync::{mpsc, watch};

use crate::core::ShutdownSignal;
use debouncer::Debouncer;
use roots::WatchRoots;

/// Watcher actor - owns the notify subscription
pub struct Watcher {
    /// Channel to receive notify events (sync side)
    notify_rx: channel::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    /// Watch-root consistency layer (attach/re-attach root directories)
    watch_roots: WatchRoots,
    /// Latest desired root set, published by the session
    roots_rx: watch::Receiver<Vec<WatchRoot>>,
    roots_tx: watch::Sender<Vec<WatchRoot>>,
    /// Debounced batches out
    batch_tx: mpsc::Sender<Vec<ChangeEvent>>,
    debouncer: Debouncer,
}

impl Watcher {
    /// Start watching `roots` immediately.
    ///
    /// Events buffer in the channel while the caller performs the initial
    /// build; [`run`](Self::run) starts draining them.
    pub fn new(
        roots: Vec<WatchRoot>,
        debounce: Duration,
        batch_tx: mpsc::Sender<Vec<ChangeEvent>>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // Missing roots will be re-attached once they appear
        let mut watch_roots = WatchRoots::new(roots.clone());
        watch_roots.attach_existing(&mut watcher)?;
        crate::debug!("watch"; "watching {} roots", watch_roots.attached_count());

        let (roots_tx, roots_rx) = watch::channel(roots);

        Ok(Self {
            notify_rx,
            watcher,
            watch_roots,
            roots_rx,
            roots_tx,
            batch_tx,
            debouncer: Debouncer::new(debounce),
        })
    }

    /// Handle for publishing a recomputed root set.
    pub fn roots_sender(&self) -> watch::Sender<Vec<WatchRoot>> {
        self.roots_tx.clone()
    }

    /// Run the actor event loop until shutdown or until the session stops
    /// listening. Dropping the notify watcher on return closes the
    /// subscription and ends the bridge thread.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let Self {
            notify_rx,
            mut watcher,
            mut watch_roots,
            mut roots_rx,
            roots_tx,
            batch_tx,
            mut debouncer,
        } = self;
        drop(roots_tx);
        roots_rx.mark_unchanged();

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // Poll notify events on a thread and forward them to the async side
        let bridge = std::thread::Builder::new()
            .name("kiln-watch".into())
            .spawn(move || {
                while let Ok(result) = notify_rx.recv() {
                    match result {
                        Ok(event) => {
                            if async_tx.blocking_send(event).is_err() {
                                break; // Receiver dropped
                            }
                        }
                        Err(e) => crate::log!("watch"; "notify error: {}", e),
                    }
                }
            });
        if let Err(e) = bridge {
            crate::log!("watch"; "cannot start watcher thread: {}", e);
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(event) = async_rx.recv() => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
                    ) {
                        for path in &event.paths {
                            watch_roots.refresh(path, &mut watcher);
                        }
                    }
                    debouncer.add_event(&event);
                }
                Ok(()) = roots_rx.changed() => {
                    let roots = roots_rx.borrow_and_update().clone();
                    watch_roots.replace(roots, &mut watcher);
                }
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    // Ensure watcher roots remain attached.
                    watch_roots.maintain(&mut watcher);
                    let Some(events) = debouncer.take_if_ready() else {
                        continue;
                    };
                    if batch_tx.send(events).await.is_err() {
                        break;
                    }
                }
            }
        }

        crate::debug!("watch"; "watcher stopped");
    }
}
