//! Live-reload notifier actor.
//!
//! ```text
//! session --[Reload]--> Notifier --[{"type":"reload"}]--> clients
//!                          ^                                 |
//!                          +------[ping → pong]--------------+
//! ```
//!
//! Clients live in a shared list: the actor broadcasts to it, and a reader
//! thread polls it (non-blocking) to answer pings and drop closed sockets.

use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::message::ReloadMessage;

/// Reader thread poll interval
const READ_POLL: Duration = Duration::from_millis(100);

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

pub enum NotifierMsg {
    /// Upgraded client connection from the acceptor
    AddClient(WebSocket<TcpStream>),
    /// Tell every client to refresh
    Reload,
    /// Close all clients and stop
    Shutdown,
}

pub struct Notifier {
    rx: mpsc::Receiver<NotifierMsg>,
    clients: Clients,
    stop: Arc<AtomicBool>,
}

impl Notifier {
    pub fn new(rx: mpsc::Receiver<NotifierMsg>, stop: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
            stop,
        }
    }

    /// Run the actor event loop until shutdown or all senders are gone.
    pub async fn run(mut self) {
        let clients = Arc::clone(&self.clients);
        let stop = Arc::clone(&self.stop);
        let reader = std::thread::Builder::new()
            .name("kiln-reload-read".into())
            .spawn(move || reader_loop(&clients, &stop));
        if let Err(e) = reader {
            crate::log!("reload"; "client reader unavailable: {}", e);
        }

        while let Some(msg) = self.rx.recv().await {
            match msg {
                NotifierMsg::AddClient(ws) => self.add_client(ws),
                NotifierMsg::Reload => self.broadcast(ReloadMessage::Reload),
                NotifierMsg::Shutdown => break,
            }
        }

        self.stop.store(true, Ordering::Relaxed);
        let mut clients = self.clients.lock();
        for mut ws in clients.drain(..) {
            let _ = ws.close(None);
            let _ = ws.flush();
        }
        crate::debug!("reload"; "notifier stopped");
    }

    fn add_client(&self, ws: WebSocket<TcpStream>) {
        if let Err(e) = ws.get_ref().set_nonblocking(true) {
            crate::debug!("reload"; "dropping client: {}", e);
            return;
        }
        let mut clients = self.clients.lock();
        clients.push(ws);
        crate::debug!("reload"; "{} client(s) connected", clients.len());
    }

    /// Send to all clients, dropping those whose connection failed.
    fn broadcast(&self, msg: ReloadMessage) {
        let frame = Message::Text(msg.to_json().into());
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            crate::debug!("reload"; "no clients connected");
            return;
        }
        clients.retain_mut(|ws| match ws.send(frame.clone()) {
            Ok(()) => true,
            Err(ref e) if would_block(e) => true,
            Err(e) => {
                crate::debug!("reload"; "client disconnected: {}", e);
                false
            }
        });
        crate::debug!("reload"; "reload sent to {} client(s)", clients.len());
    }
}

/// Poll clients for incoming frames until `stop` is set.
fn reader_loop(clients: &Clients, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(READ_POLL);
        clients.lock().retain_mut(poll_client);
    }
}

/// Drain pending frames from one client. Returns false once it is gone.
fn poll_client(ws: &mut WebSocket<TcpStream>) -> bool {
    loop {
        match ws.read() {
            Ok(Message::Text(text)) => {
                if ReloadMessage::from_json(&text) == Some(ReloadMessage::Ping) {
                    let pong = Message::Text(ReloadMessage::Pong.to_json().into());
                    match ws.send(pong) {
                        Ok(()) => {}
                        Err(ref e) if would_block(e) => {}
                        Err(_) => return false,
                    }
                }
            }
            Ok(Message::Close(_)) => return false,
            Ok(_) => {}
            Err(ref e) if would_block(e) => return true,
            Err(_) => return false,
        }
    }
}

/// Non-blocking socket has nothing to read, or its send buffer is full
/// (the frame stays queued in tungstenite).
fn would_block(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io) if io.kind() == std::io::ErrorKind::WouldBlock)
}
