//! Process spawning for tether sessions.
//!
//! Validates untrusted spawn options, resolves the shell, working directory
//! and environment, and launches one process attached to a pseudo-terminal
//! via `portable-pty`. Output and exit are delivered as [`ProcessEvent`]s on
//! a tokio channel so the caller never polls.

pub mod cwd;
pub mod env;
pub mod error;
pub mod plan;
pub mod process;
pub mod shell;
pub mod spawn;
pub mod validate;

pub use cwd::{CwdRecovery, DefaultCwdRecovery};
pub use error::{ProcessError, SpawnError};
pub use plan::{SpawnOptions, SpawnParams, SpawnPlan, SpawnPlanner, SpawnPolicy};
pub use process::{KillSignal, ProcessControl, ProcessEvent, SpawnedProcess};
pub use spawn::{ProcessSpawner, PtySpawner};

/// Default terminal columns.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal rows.
pub const DEFAULT_ROWS: u16 = 24;

/// Largest accepted terminal width.
pub const MAX_COLS: u16 = 500;

/// Largest accepted terminal height.
pub const MAX_ROWS: u16 = 200;

/// Clamp a requested terminal size into `[1, MAX_COLS] x [1, MAX_ROWS]`.
pub fn clamp_size(cols: i64, rows: i64) -> (u16, u16) {
    let cols = cols.clamp(1, i64::from(MAX_COLS)) as u16;
    let rows = rows.clamp(1, i64::from(MAX_ROWS)) as u16;
    (cols, rows)
}
