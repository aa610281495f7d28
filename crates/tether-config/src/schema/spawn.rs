//! How spawn options are framed into a command line.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Command framing and environment adjustments applied at spawn time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Appended to the command when the caller sets `bypass`.
    pub bypass_flag: String,
    /// Precedes the resume id, e.g. `--resume <id>`.
    pub resume_flag: String,
    /// Precedes the model name, e.g. `--model <name>`.
    pub model_flag: String,
    /// Host variables never passed to children.
    pub strip_env: Vec<String>,
    /// Extra environment variables injected into every child.
    pub env: HashMap<String, String>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            bypass_flag: "--dangerously-skip-permissions".into(),
            resume_flag: "--resume".into(),
            model_flag: "--model".into(),
            strip_env: vec!["CLAUDECODE".into(), "TETHER_SESSION".into()],
            env: HashMap::new(),
        }
    }
}
