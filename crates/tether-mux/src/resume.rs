//! Locating the resume id of a freshly started agent session.
//!
//! The agent writes one `<resume-id>.jsonl` log per conversation under a
//! directory derived from its working directory. Shortly after a spawn the
//! newest such file is taken to belong to the new session. This is a
//! heuristic: a slow disk or a concurrent session in the same directory can
//! make it pick the wrong file or none.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tether_pty::validate::is_valid_resume_id;

/// Files modified this long before the spawn still count.
const MTIME_SLACK: Duration = Duration::from_secs(2);

/// Finds resume ids under a session-log root.
#[derive(Debug, Clone)]
pub struct ResumeLocator {
    log_root: PathBuf,
}

impl ResumeLocator {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
        }
    }

    /// `~/.claude/projects`, if a home directory is known.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".claude").join("projects"))
    }

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Directory holding logs for sessions started in `cwd`.
    pub fn project_dir(&self, cwd: &Path) -> PathBuf {
        self.log_root.join(project_dir_name(cwd))
    }

    /// Newest valid `*.jsonl` stem under the project directory for `cwd`
    /// that was modified at or after `since` (minus a little slack).
    pub fn locate(&self, cwd: &Path, since: SystemTime) -> Option<String> {
        let dir = self.project_dir(cwd);
        let threshold = since.checked_sub(MTIME_SLACK).unwrap_or(since);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "no session log directory");
                return None;
            }
        };

        let mut newest: Option<(SystemTime, String)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_valid_resume_id(stem) {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if modified < threshold {
                continue;
            }
            match &newest {
                Some((t, _)) if modified <= *t => {}
                _ => newest = Some((modified, stem.to_string())),
            }
        }
        newest.map(|(_, id)| id)
    }
}

/// Every character other than ASCII alphanumerics and `-` becomes `-`.
pub fn project_dir_name(cwd: &Path) -> String {
    cwd.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}
