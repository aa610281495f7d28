//! Working-directory resolution.

use std::path::{Path, PathBuf};

/// Platform-specific lookup for a requested directory that does not exist
/// as given (a Windows path handed to a WSL host, a `~` path, ...).
pub trait CwdRecovery: Send + Sync {
    fn recover(&self, requested: &Path) -> Option<PathBuf>;
}

/// Expands `~` and maps `C:\...` / `C:/...` drive paths to `/mnt/c/...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCwdRecovery;

impl CwdRecovery for DefaultCwdRecovery {
    fn recover(&self, requested: &Path) -> Option<PathBuf> {
        let raw = requested.to_str()?;

        if let Some(rest) = raw.strip_prefix('~') {
            let home = dirs::home_dir()?;
            let rest = rest.trim_start_matches(|c: char| c == '/' || c == '\\');
            return Some(if rest.is_empty() { home } else { home.join(rest) });
        }

        drive_path_to_mount(raw)
    }
}

/// `C:\Users\me` -> `/mnt/c/Users/me`.
fn drive_path_to_mount(raw: &str) -> Option<PathBuf> {
    let mut chars = raw.chars();
    let drive = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    if chars.next() != Some(':') {
        return None;
    }
    let rest: String = chars.as_str().replace('\\', "/");
    let rest = rest.trim_start_matches('/');
    let mut path = PathBuf::from(format!("/mnt/{}", drive.to_ascii_lowercase()));
    if !rest.is_empty() {
        path.push(rest);
    }
    Some(path)
}

/// Pick the directory a new process starts in.
///
/// Uses `requested` when it is an existing directory, then whatever
/// `recovery` finds, then the user's home directory.
pub fn resolve_cwd(requested: Option<&Path>, recovery: &dyn CwdRecovery) -> PathBuf {
    if let Some(requested) = requested {
        if requested.is_dir() {
            tracing::debug!(cwd = %requested.display(), "Using requested working directory");
            return requested.to_path_buf();
        }

        if let Some(recovered) = recovery.recover(requested).filter(|p| p.is_dir()) {
            tracing::info!(
                requested = %requested.display(),
                cwd = %recovered.display(),
                "Recovered working directory"
            );
            return recovered;
        }

        tracing::warn!(
            requested = %requested.display(),
            "Working directory missing or not a directory, using home"
        );
    }

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    tracing::info!(cwd = %home.display(), "Using home directory");
    home
}
