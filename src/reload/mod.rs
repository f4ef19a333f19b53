//! Live reload for development.
//!
//! ```text
//! acceptor thread ──[AddClient]──► Notifier ──► browser clients
//!                                     ▲
//! watch session ──────[Reload]────────┘
//! ```
//!
//! - `server`: bind (with port retry) and accept WebSocket clients
//! - `notifier`: client registry, broadcast, ping/pong
//! - `message`: JSON message protocol
//! - `client`: script injected into rendered documents

mod client;
mod message;
mod notifier;
mod server;

pub use client::inject_client;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use notifier::{Notifier, NotifierMsg};

/// Notifier channel capacity
const CHANNEL_BUFFER: usize = 32;

/// Handle to a running live-reload server.
pub struct LiveReload {
    port: u16,
    tx: mpsc::Sender<NotifierMsg>,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl LiveReload {
    /// Start the server on `port` (or the next free one). Must be called
    /// inside a tokio runtime.
    pub fn start(port: u16) -> Result<Self> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let stop = Arc::new(AtomicBool::new(false));
        let port = server::start(port, tx.clone(), Arc::clone(&stop))?;
        let task = tokio::spawn(Notifier::new(rx, Arc::clone(&stop)).run());
        Ok(Self {
            port,
            tx,
            stop,
            task,
        })
    }

    /// Port actually bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Ask every connected client to refresh.
    pub async fn reload(&self) {
        if self.tx.send(NotifierMsg::Reload).await.is_err() {
            crate::debug!("reload"; "notifier is gone");
        }
    }

    /// Close all clients, stop the acceptor and wait for the notifier.
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.tx.send(NotifierMsg::Shutdown).await;
        drop(self.tx);
        if let Err(e) = self.task.await {
            crate::debug!("reload"; "notifier task failed: {}", e);
        }
    }
}
