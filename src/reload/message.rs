//! Live-reload message protocol.
//!
//! JSON text frames, tagged by `type`:
//!
//! - `reload`: server → client, refresh the page
//! - `ping`: client → server, answered with `pong`
//!
//! Anything else a client sends is ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    Reload,
    Ping,
    Pong,
}

impl ReloadMessage {
    pub fn to_json(self) -> String {
        serde_json::to_string(&self).unwrap_or_default()
    }

    /// Parse a client frame; `None` for unrecognized shapes.
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
