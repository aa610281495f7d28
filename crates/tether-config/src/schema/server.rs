use serde::{Deserialize, Serialize};

/// WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind: String,
    pub port: u16,
    /// Seconds a new connection has to send its hello frame.
    pub hello_timeout_secs: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 7681,
            hello_timeout_secs: 10,
        }
    }
}
