//! Launching a [`SpawnPlan`] inside a pseudo-terminal.

use std::io::{Read, Write};
use std::sync::mpsc as std_mpsc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

use crate::error::{ProcessError, SpawnError};
use crate::plan::SpawnPlan;
use crate::process::{KillSignal, ProcessControl, ProcessEvent, SpawnedProcess};

/// Bytes per read from the PTY master.
const PTY_READ_CHUNK: usize = 8192;

/// How long the waiter lets the reader drain after the child exits.
const READER_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Creates processes from plans.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, plan: &SpawnPlan) -> Result<SpawnedProcess, SpawnError>;
}

/// Spawns real processes with `portable-pty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PtySpawner;

impl PtySpawner {
    pub fn new() -> Self {
        Self
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn build_command(plan: &SpawnPlan) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(&plan.program);
    cmd.args(&plan.args);
    cmd.cwd(&plan.params.cwd);
    cmd.env_clear();
    for (key, value) in &plan.params.env {
        cmd.env(key, value);
    }
    cmd
}

impl ProcessSpawner for PtySpawner {
    fn spawn(&self, plan: &SpawnPlan) -> Result<SpawnedProcess, SpawnError> {
        let (process, events) = spawn_pty(plan)?;
        Ok(SpawnedProcess {
            control: process,
            events,
        })
    }
}

fn spawn_pty(
    plan: &SpawnPlan,
) -> Result<(Arc<PtyProcess>, mpsc::UnboundedReceiver<ProcessEvent>), SpawnError> {
    let params = &plan.params;
    let pair = native_pty_system()
        .openpty(pty_size(params.cols, params.rows))
        .map_err(|e| SpawnError::Failed(format!("open pty: {e}")))?;

    let mut child = pair
        .slave
        .spawn_command(build_command(plan))
        .map_err(|e| SpawnError::Failed(format!("spawn '{}': {e}", plan.program)))?;

    // Only the child keeps the slave open, so the reader sees EOF on exit.
    drop(pair.slave);

    let pid = child.process_id();
    let killer = child.clone_killer();

    let writer = pair
        .master
        .take_writer()
        .map_err(|e| SpawnError::Failed(format!("take pty writer: {e}")))?;
    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| SpawnError::Failed(format!("clone pty reader: {e}")))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let (drained_tx, drained_rx) = std_mpsc::channel::<()>();

    let output_tx = tx.clone();
    thread::Builder::new()
        .name("pty-reader".into())
        .spawn(move || {
            let mut buf = [0u8; PTY_READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if output_tx.send(ProcessEvent::Output(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "pty reader stopped");
                        break;
                    }
                }
            }
            let _ = drained_tx.send(());
        })
        .map_err(|e| SpawnError::Failed(format!("start pty reader: {e}")))?;

    let reaped = Arc::new(AtomicBool::new(false));
    let waiter_reaped = Arc::clone(&reaped);
    let exit_tx = tx;
    thread::Builder::new()
        .name("pty-waiter".into())
        .spawn(move || {
            let code = match child.wait() {
                Ok(status) => Some(status.exit_code() as i32),
                Err(e) => {
                    tracing::warn!(pid = ?pid, error = %e, "waiting on pty child failed");
                    None
                }
            };
            // Once reaped the pid may be reused; no more signals after this.
            waiter_reaped.store(true, Ordering::Release);
            // Grandchildren can hold the terminal open; don't wait on them forever.
            let _ = drained_rx.recv_timeout(READER_DRAIN_GRACE);
            let _ = exit_tx.send(ProcessEvent::Exit { code });
        })
        .map_err(|e| SpawnError::Failed(format!("start pty waiter: {e}")))?;

    tracing::debug!(pid = ?pid, program = %plan.program, "pty process started");

    let process = PtyProcess {
        pid,
        master: Mutex::new(pair.master),
        writer: Mutex::new(writer),
        killer: Mutex::new(killer),
        reaped,
    };
    Ok((Arc::new(process), rx))
}

/// A process running on the master side of a PTY pair.
struct PtyProcess {
    pid: Option<u32>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    /// Set by the waiter thread once the child has been reaped.
    reaped: Arc<AtomicBool>,
}

impl PtyProcess {
    fn is_reaped(&self) -> bool {
        self.reaped.load(Ordering::Acquire)
    }

    #[cfg(unix)]
    fn signal(&self, signal: KillSignal) -> bool {
        let Some(pid) = self.pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
            return false;
        };
        // The child leads its own process group; signal the whole group first.
        // SAFETY: kill(2) has no memory-safety preconditions.
        let group = unsafe { libc::kill(-pid, signal.as_raw()) };
        if group == 0 {
            return true;
        }
        // SAFETY: as above.
        unsafe { libc::kill(pid, signal.as_raw()) == 0 }
    }

    #[cfg(not(unix))]
    fn signal(&self, _signal: KillSignal) -> bool {
        false
    }

    fn kill_default(&self) {
        let mut killer = self.killer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = killer.kill() {
            tracing::debug!(pid = ?self.pid, error = %e, "kill failed (process likely gone)");
        }
    }
}

impl ProcessControl for PtyProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn write(&self, data: &[u8]) -> Result<(), ProcessError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), ProcessError> {
        self.master
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .resize(pty_size(cols, rows))
            .map_err(|e| ProcessError::ResizeFailed(e.to_string()))
    }

    fn kill(&self, signal: Option<KillSignal>) {
        if self.is_reaped() {
            return;
        }
        match signal {
            Some(signal) if self.signal(signal) => {}
            _ => self.kill_default(),
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if self.is_reaped() {
            return;
        }
        let _ = self.killer.get_mut().map(|k| k.kill());
    }
}
