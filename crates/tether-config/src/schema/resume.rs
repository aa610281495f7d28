use serde::{Deserialize, Serialize};

/// Resume-id backfill after spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeConfig {
    pub enabled: bool,
    /// Seconds to wait after spawn before looking for the session log.
    pub delay_secs: u32,
    /// Directory holding per-project session logs. `None` means
    /// `~/.claude/projects`.
    pub log_root: Option<String>,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: 8,
            log_root: None,
        }
    }
}
