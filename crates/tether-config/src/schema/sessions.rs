//! Per-session resource limits and timers.

use serde::{Deserialize, Serialize};

/// Session multiplexer settings.
///
/// The byte limits bound memory per session and per viewer; the timers
/// govern keepalive probing and how often activity is reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Scrollback retained for replay on reconnect (valid range: 1 KiB - 16 MiB).
    pub scrollback_cap_bytes: u32,
    /// Viewers with at least this many unsent bytes skip live chunks.
    pub backpressure_threshold_bytes: u32,
    /// Keepalive probe period in seconds (valid range: 1-600).
    pub keepalive_interval_secs: u32,
    /// Minimum seconds between last-active reports and approval notifications.
    pub activity_debounce_secs: u32,
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            scrollback_cap_bytes: 100 * 1024,
            backpressure_threshold_bytes: 64 * 1024,
            keepalive_interval_secs: 30,
            activity_debounce_secs: 30,
            default_cols: 80,
            default_rows: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_config_defaults() {
        let config = SessionsConfig::default();
        assert_eq!(config.scrollback_cap_bytes, 102_400);
        assert_eq!(config.backpressure_threshold_bytes, 65_536);
        assert_eq!(config.keepalive_interval_secs, 30);
        assert_eq!(config.activity_debounce_secs, 30);
        assert_eq!((config.default_cols, config.default_rows), (80, 24));
    }
}
