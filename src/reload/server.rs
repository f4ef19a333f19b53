//! Live-reload WebSocket server.
//!
//! One acceptor thread owns the listener. Each connection is upgraded to a
//! WebSocket on that thread and handed to the notifier over its channel.

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use super::notifier::NotifierMsg;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Accept loop poll interval
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Bind the server and start accepting clients. Returns the bound port.
///
/// The acceptor thread exits once `stop` is set or the notifier is gone.
pub fn start(
    base_port: u16,
    tx: mpsc::Sender<NotifierMsg>,
    stop: Arc<AtomicBool>,
) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    std::thread::Builder::new()
        .name("kiln-reload-accept".into())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, addr)) => {
                        // Handshake in blocking mode, the notifier switches it back.
                        let _ = stream.set_nonblocking(false);
                        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
                        match tungstenite::accept(stream) {
                            Ok(ws) => {
                                crate::debug!("reload"; "client connected: {}", addr);
                                if tx.blocking_send(NotifierMsg::AddClient(ws)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => crate::debug!("reload"; "handshake failed: {}", e),
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(ACCEPT_POLL);
                    }
                    Err(e) => {
                        crate::log!("reload"; "accept error: {}", e);
                        std::thread::sleep(ACCEPT_POLL);
                    }
                }
            }
            crate::debug!("reload"; "acceptor stopped");
        })?;

    Ok(actual_port)
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind live-reload server on ports {}..{}: {}",
        base_port,
        base_port.saturating_add(max_retries),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_port_is_skipped() {
        let (held, port) = try_bind_port(0, 1).unwrap();
        let (_next, next_port) = try_bind_port(port, MAX_PORT_RETRIES).unwrap();
        assert_ne!(port, next_port);
        drop(held);
    }
}
