//! One PTY-backed process, its scrollback and its attached viewers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tether_common::{ClientId, Notification};
use tether_pty::{
    clamp_size, ProcessControl, ProcessEvent, SpawnOptions, SpawnParams, SpawnedProcess,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::activity::Debounce;
use crate::broadcast::{self, ClientSlot};
use crate::context::MuxContext;
use crate::hooks::{self, MetaPatch, SessionStatus};
use crate::scrollback::ScrollbackBuffer;
use crate::transport::{ControlMessage, CLOSE_NORMAL};

/// A long-lived terminal session.
///
/// Mutable state lives behind one mutex per session; nothing is shared
/// across sessions. Restart, respawn and kill are additionally serialized by
/// an async lifecycle lock since they spawn or kill processes.
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    pub(crate) ctx: Arc<MuxContext>,
    state: Mutex<SessionState>,
    pub(crate) lifecycle: tokio::sync::Mutex<()>,
}

pub(crate) struct SessionState {
    pub(crate) process: Option<Arc<dyn ProcessControl>>,
    pub(crate) pid: Option<u32>,
    /// Bumped whenever the current process is replaced or killed. Events
    /// from older generations are dropped.
    pub(crate) generation: u64,
    pub(crate) alive: bool,
    pub(crate) exit_code: Option<i32>,
    pub(crate) restarting: bool,
    pub(crate) killed: bool,
    pub(crate) params: SpawnParams,
    pub(crate) options: SpawnOptions,
    pub(crate) scrollback: ScrollbackBuffer,
    pub(crate) clients: HashMap<ClientId, ClientSlot>,
    pub(crate) keepalive: Option<JoinHandle<()>>,
    last_active: Debounce,
    approval_notice: Debounce,
}

impl Session {
    /// Create a session around a freshly spawned process and start pumping
    /// its events.
    pub(crate) fn start(
        id: String,
        ctx: Arc<MuxContext>,
        spawned: SpawnedProcess,
        params: SpawnParams,
        options: SpawnOptions,
    ) -> Arc<Self> {
        let settings = &ctx.settings;
        let state = SessionState {
            process: None,
            pid: None,
            generation: 0,
            alive: false,
            exit_code: None,
            restarting: false,
            killed: false,
            params: params.clone(),
            options,
            scrollback: ScrollbackBuffer::new(settings.scrollback_cap),
            clients: HashMap::new(),
            keepalive: None,
            last_active: Debounce::new(settings.activity_debounce),
            approval_notice: Debounce::new(settings.activity_debounce),
        };
        let session = Arc::new(Self {
            id,
            created_at: Utc::now(),
            ctx,
            state: Mutex::new(state),
            lifecycle: tokio::sync::Mutex::new(()),
        });
        session.install(spawned, params);
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_alive(&self) -> bool {
        self.state().alive
    }

    pub fn pid(&self) -> Option<u32> {
        self.state().pid
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.state().exit_code
    }

    pub fn client_count(&self) -> usize {
        self.state().clients.len()
    }

    pub fn is_killed(&self) -> bool {
        self.state().killed
    }

    /// Parameters a restart would reuse.
    pub fn spawn_params(&self) -> SpawnParams {
        self.state().params.clone()
    }

    /// Current scrollback contents.
    pub fn scrollback(&self) -> Vec<u8> {
        self.state().scrollback.snapshot()
    }

    /// Make `spawned` the current process and start its event pump.
    pub(crate) fn install(self: &Arc<Self>, spawned: SpawnedProcess, params: SpawnParams) {
        let SpawnedProcess { control, events } = spawned;
        let generation = {
            let mut state = self.state();
            state.generation += 1;
            state.pid = control.pid();
            state.process = Some(control);
            state.alive = true;
            state.exit_code = None;
            state.restarting = false;
            state.params = params;
            state.generation
        };
        tokio::spawn(pump(Arc::downgrade(self), generation, events));
    }

    pub(crate) fn set_options(&self, options: SpawnOptions) {
        self.state().options = options;
    }

    pub(crate) fn options(&self) -> SpawnOptions {
        self.state().options.clone()
    }

    fn handle_output(&self, generation: u64, data: Vec<u8>) {
        let chunk: Arc<[u8]> = data.into();
        let now = Instant::now();
        let (touch, prompt) = {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            // Append before fan-out: an attach in between sees the chunk in
            // its snapshot and is not in the client set yet.
            state.scrollback.append(Arc::clone(&chunk));
            let threshold = self.ctx.settings.backpressure_threshold;
            broadcast::fan_out(&mut state.clients, &chunk, threshold);

            let touch = state.last_active.try_fire(now);
            let prompt = if state.approval_notice.ready(now) {
                self.ctx.approval.detect(&chunk)
            } else {
                None
            };
            if prompt.is_some() {
                state.approval_notice.try_fire(now);
            }
            (touch, prompt)
        };

        if touch {
            hooks::report_field(
                self.ctx.store.as_ref(),
                &self.id,
                MetaPatch::LastActive(Utc::now()),
            );
        }
        if let Some(line) = prompt {
            tracing::info!(session = %self.id, "approval prompt detected");
            hooks::send_notification(
                self.ctx.notifier.as_ref(),
                &Notification::warning(format!("Session {} needs input", self.id), line),
            );
        }
    }

    fn handle_exit(&self, generation: u64, code: Option<i32>) {
        {
            let mut state = self.state();
            if state.generation != generation || state.restarting {
                tracing::debug!(session = %self.id, ?code, "replaced process exited");
                return;
            }
            state.alive = false;
            state.exit_code = code;
            state.process = None;
            broadcast::send_control(
                &mut state.clients,
                &ControlMessage::Exit { exit_code: code },
            );
        }
        tracing::info!(session = %self.id, ?code, "process exited");
        hooks::report_status(self.ctx.store.as_ref(), &self.id, SessionStatus::Exited, None);
    }

    /// Forward viewer input to the process. No-op once it has exited.
    pub fn write_input(&self, data: &[u8]) {
        let process = {
            let state = self.state();
            if !state.alive {
                return;
            }
            state.process.clone()
        };
        if let Some(process) = process {
            if let Err(e) = process.write(data) {
                tracing::debug!(session = %self.id, error = %e, "input write failed");
            }
        }
    }

    /// Resize the terminal, clamping to the accepted range.
    pub fn resize(&self, cols: i64, rows: i64) {
        let (cols, rows) = clamp_size(cols, rows);
        let process = {
            let mut state = self.state();
            state.params.cols = cols;
            state.params.rows = rows;
            if state.alive {
                state.process.clone()
            } else {
                None
            }
        };
        if let Some(process) = process {
            if let Err(e) = process.resize(cols, rows) {
                tracing::debug!(session = %self.id, error = %e, "resize failed");
            }
        }
    }

    pub(crate) fn remove_client(&self, client: &ClientId) -> bool {
        let mut state = self.state();
        let removed = state.clients.remove(client).is_some();
        if state.clients.is_empty() {
            if let Some(handle) = state.keepalive.take() {
                handle.abort();
            }
        }
        removed
    }

    /// Close every viewer, stop timers and terminate the process.
    pub(crate) fn terminate(&self) {
        let process = {
            let mut state = self.state();
            state.killed = true;
            state.alive = false;
            state.generation += 1;
            if let Some(handle) = state.keepalive.take() {
                handle.abort();
            }
            for (_, slot) in state.clients.drain() {
                slot.transport.close(CLOSE_NORMAL, "session killed");
            }
            state.process.take()
        };
        if let Some(process) = process {
            process.kill(None);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Feed one process generation's events into its session.
async fn pump(session: Weak<Session>, generation: u64, mut events: UnboundedReceiver<ProcessEvent>) {
    while let Some(event) = events.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        match event {
            ProcessEvent::Output(data) => session.handle_output(generation, data),
            ProcessEvent::Exit { code } => {
                session.handle_exit(generation, code);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{settle, Harness, RecordingViewer};

    #[tokio::test]
    async fn output_lands_in_scrollback() {
        let h = Harness::new();
        let session = h.spawn("s1").await;
        h.spawner.last().emit(b"hello ");
        h.spawner.last().emit(b"world");
        settle().await;
        assert_eq!(session.scrollback(), b"hello world");
    }

    #[tokio::test]
    async fn exit_marks_dead_and_notifies_each_client_once() {
        let h = Harness::new();
        let session = h.spawn("s1").await;
        let a = RecordingViewer::new();
        let b = RecordingViewer::new();
        let _ga = h.registry.attach("s1", a.clone(), &Default::default()).await.unwrap();
        let _gb = h.registry.attach("s1", b.clone(), &Default::default()).await.unwrap();

        h.spawner.last().exit(Some(7));
        settle().await;

        assert!(!session.is_alive());
        assert_eq!(session.exit_code(), Some(7));
        for viewer in [&a, &b] {
            assert_eq!(
                viewer.controls(),
                vec![ControlMessage::Exit { exit_code: Some(7) }]
            );
        }
        assert_eq!(h.store.last_status("s1"), Some((SessionStatus::Exited, None)));
    }

    #[tokio::test]
    async fn input_after_exit_is_dropped() {
        let h = Harness::new();
        let session = h.spawn("s1").await;
        let process = h.spawner.last();
        session.write_input(b"ls\r");
        process.exit(Some(0));
        settle().await;
        session.write_input(b"pwd\r");
        assert_eq!(process.process.written(), b"ls\r");
    }

    #[tokio::test]
    async fn resize_is_clamped_and_remembered() {
        let h = Harness::new();
        let session = h.spawn("s1").await;
        session.resize(9999, 0);
        assert_eq!(h.spawner.last().process.sizes(), vec![(500, 1)]);
        let params = session.spawn_params();
        assert_eq!((params.cols, params.rows), (500, 1));
    }

    #[tokio::test]
    async fn last_active_is_debounced() {
        let h = Harness::new();
        let _session = h.spawn("s1").await;
        for _ in 0..20 {
            h.spawner.last().emit(b"tick\n");
        }
        settle().await;
        assert_eq!(h.store.last_active_updates("s1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn approval_prompt_notifies_once_per_window() {
        let h = Harness::new();
        let _session = h.spawn("s1").await;
        h.spawner.last().emit(b"Do you want to proceed?\r\n");
        h.spawner.last().emit(b"Do you want to proceed?\r\n");
        settle().await;
        assert_eq!(h.notifier.count(), 1);

        tokio::time::advance(h.settings.activity_debounce).await;
        h.spawner.last().emit(b"Allow edit to main.rs?\r\n");
        settle().await;
        assert_eq!(h.notifier.count(), 2);
    }

    #[tokio::test]
    async fn failing_store_never_breaks_output() {
        let h = Harness::with_failing_store();
        let session = h.spawn("s1").await;
        let viewer = RecordingViewer::new();
        let _guard = h.registry.attach("s1", viewer.clone(), &Default::default()).await.unwrap();
        h.spawner.last().emit(b"still here");
        settle().await;
        assert_eq!(viewer.output(), b"still here");
        assert!(session.is_alive());
    }
}
