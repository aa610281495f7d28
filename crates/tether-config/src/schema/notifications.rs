use serde::{Deserialize, Serialize};

/// Approval-prompt notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    /// Case-insensitive regexes matched against ANSI-stripped output.
    pub approval_patterns: Vec<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            approval_patterns: vec![
                r"do you want to (proceed|continue|make this edit)".into(),
                r"\(y/n\)".into(),
                r"\[y/n\]".into(),
                r"allow .{1,80}\?".into(),
            ],
        }
    }
}
