//! Watch mode: the long-running change → render → reload loop.
//!
//! Startup order:
//! 1. live-reload server (its port is baked into rendered output)
//! 2. graph, then the watcher subscription over the derived roots
//! 3. initial batch
//!
//! Teardown runs in reverse: stop taking batches, let the running batch
//! drain (the scheduler cancels queued tasks on shutdown), stop the
//! watcher, close the live-reload server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::{BatchReport, Session};
use crate::core::EntryPoint;
use crate::discovery::discover;
use crate::reload::LiveReload;
use crate::render;
use crate::watch::{self, ChangeEvent, ChangePlan, ExtraPattern, Watcher};

/// Pending debounced batches; further batches merge while one renders.
const BATCH_BUFFER: usize = 16;

impl Session {
    /// Render, then keep re-rendering affected entries until shutdown.
    pub async fn watch(mut self, explicit: Option<Vec<EntryPoint>>, live_reload: bool) -> Result<()> {
        let live = if live_reload {
            let live = LiveReload::start(self.config.port)?;
            Arc::make_mut(&mut self.config).live_reload = Some(live.port());
            crate::log!("reload"; "ws://127.0.0.1:{}", live.port());
            Some(live)
        } else {
            None
        };

        let discovered = self.rebuild_graph().await;
        let mut patterns = ExtraPattern::compile_all(&self.config.watch.extra, &self.config.root);

        let (batch_tx, mut batch_rx) = mpsc::channel(BATCH_BUFFER);
        let roots = watch::compute_roots(&self.config, &self.graph.load(), &patterns);
        let watcher = Watcher::new(
            roots,
            Duration::from_millis(self.config.watch.debounce_ms),
            batch_tx,
        )
        .context("cannot start file watcher")?;
        let roots_tx = watcher.roots_sender();
        let watcher_task = tokio::spawn(watcher.run(self.shutdown.clone()));

        let initial = explicit.unwrap_or(discovered);
        if initial.is_empty() {
            crate::log!("watch"; "no entry points yet");
        } else {
            let report = self.render(initial, true).await;
            report.print();
            self.notify(&live, &report).await;
        }
        crate::log!("watch"; "watching for changes, press Ctrl+C to stop");

        let mut shutdown = self.shutdown.clone();
        loop {
            let events = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                batch = batch_rx.recv() => match batch {
                    Some(events) => events,
                    None => break,
                },
            };

            let mut plan = self.plan(events, &patterns);
            while let Ok(more) = batch_rx.try_recv() {
                plan.merge(self.plan(more, &patterns));
            }
            if plan.is_empty() {
                continue;
            }

            if plan.reload_config && self.reload_config() {
                patterns = ExtraPattern::compile_all(&self.config.watch.extra, &self.config.root);
            }

            let report = self.apply(plan).await;
            if self.shutdown.is_triggered() {
                break;
            }

            self.rebuild_graph().await;
            let roots = watch::compute_roots(&self.config, &self.graph.load(), &patterns);
            let _ = roots_tx.send(roots);
            self.notify(&live, &report).await;
        }

        crate::logger::status_detach();
        crate::debug!("watch"; "shutting down");
        drop(batch_rx);
        if let Err(e) = watcher_task.await {
            crate::log!("watch"; "watcher task failed: {}", e);
        }
        if let Some(live) = live {
            live.shutdown().await;
        }
        Ok(())
    }

    fn plan(&self, events: Vec<ChangeEvent>, patterns: &[ExtraPattern]) -> ChangePlan {
        watch::plan(events, &self.config, &self.graph.load(), patterns)
    }

    /// Swap in a freshly loaded config. An invalid file keeps the old one.
    fn reload_config(&mut self) -> bool {
        match self.config.reload() {
            Ok(config) => {
                self.config = Arc::new(config);
                crate::log!("config"; "reloaded {}", self.config.config_path.display());
                true
            }
            Err(e) => {
                crate::log!("error"; "{}", e);
                crate::log!("config"; "keeping previous configuration");
                false
            }
        }
    }

    async fn apply(&self, plan: ChangePlan) -> BatchReport {
        for entry in &plan.removed {
            match render::remove_output(entry, &self.config) {
                Ok(Some(path)) => crate::log!("watch"; "removed {}", path.display()),
                Ok(None) => {}
                Err(e) => crate::log!("error"; "cannot remove output of {}: {}", entry, e),
            }
        }

        let entries: Vec<EntryPoint> = if plan.full {
            discover(&self.config)
        } else {
            plan.render.into_iter().collect()
        };
        let report = self.render(entries, false).await;
        report.print_status();
        report
    }

    async fn notify(&self, live: &Option<LiveReload>, report: &BatchReport) {
        if let Some(live) = live
            && report.any_success()
        {
            live.reload().await;
        }
    }
}
