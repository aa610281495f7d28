//! Connection-level wire protocol. The first text frame is a [`Hello`];
//! after an attach, frames belong to the session.

use serde::{Deserialize, Serialize};
use tether_mux::SessionSummary;
use tether_pty::SpawnOptions;

/// First message a client sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Hello {
    Attach {
        session_id: String,
        #[serde(default)]
        spawn: SpawnOptions,
    },
    List,
    Kill {
        session_id: String,
    },
    Restart {
        session_id: String,
    },
}

/// Replies to one-shot hellos. Attached viewers get session frames instead.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Sessions { sessions: Vec<SessionSummary> },
    Killed { session_id: String, ok: bool },
    Restarted { session_id: String, ok: bool },
    Error { message: String },
}

/// Session ids are 1-64 chars of alphanumerics, `-`, `_` or `.`.
pub fn validate_session_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("session id must not be empty".into());
    }
    if id.len() > 64 {
        return Err(format!("session id too long ({} chars, max 64)", id.len()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err("session id contains invalid characters".into());
    }
    Ok(())
}
