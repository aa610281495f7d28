//! The handle a session holds on a running process.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::ProcessError;

/// Something that happened to a spawned process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of terminal output, in the order the process produced it.
    Output(Vec<u8>),
    /// The process ended. Delivered exactly once, after all output.
    Exit { code: Option<i32> },
}

/// Signals a caller may ask for when killing a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    Hangup,
    Interrupt,
    Terminate,
    Kill,
}

impl KillSignal {
    #[cfg(unix)]
    pub(crate) fn as_raw(self) -> libc::c_int {
        match self {
            KillSignal::Hangup => libc::SIGHUP,
            KillSignal::Interrupt => libc::SIGINT,
            KillSignal::Terminate => libc::SIGTERM,
            KillSignal::Kill => libc::SIGKILL,
        }
    }
}

/// Control surface of a live process.
///
/// All methods take `&self`; implementations guard their own state so the
/// handle can be shared between the session and its input path.
pub trait ProcessControl: Send + Sync {
    fn pid(&self) -> Option<u32>;

    /// Write bytes to the process's terminal input.
    fn write(&self, data: &[u8]) -> Result<(), ProcessError>;

    fn resize(&self, cols: u16, rows: u16) -> Result<(), ProcessError>;

    /// Terminate the process. `None` uses the platform default.
    fn kill(&self, signal: Option<KillSignal>);
}

/// A freshly spawned process and the stream of its events.
pub struct SpawnedProcess {
    pub control: Arc<dyn ProcessControl>,
    pub events: UnboundedReceiver<ProcessEvent>,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.control.pid())
            .finish_non_exhaustive()
    }
}
