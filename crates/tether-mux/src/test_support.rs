//! In-memory fakes for exercising sessions without real processes or sockets.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use tether_common::Notification;
use tether_config::schema::NotificationsConfig;
use tether_pty::{
    KillSignal, ProcessControl, ProcessError, ProcessEvent, ProcessSpawner, SpawnError,
    SpawnOptions, SpawnPlan, SpawnPlanner, SpawnedProcess,
};
use tokio::sync::mpsc;

use crate::approval::ApprovalDetector;
use crate::context::{MuxContext, MuxSettings};
use crate::error::{NotifyError, StoreError, TransportError};
use crate::hooks::{MemoryStore, MetaPatch, Notifier, SessionMeta, SessionStatus, StatusStore};
use crate::registry::SessionRegistry;
use crate::resume::ResumeLocator;
use crate::session::Session;
use crate::transport::{ControlMessage, ViewerFrame, ViewerTransport};

/// Let spawned tasks drain their channels.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

pub(crate) struct FakeProcess {
    pid: u32,
    tx: mpsc::UnboundedSender<ProcessEvent>,
    written: Mutex<Vec<u8>>,
    sizes: Mutex<Vec<(u16, u16)>>,
    kills: AtomicUsize,
    exited: AtomicBool,
}

impl FakeProcess {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub(crate) fn sizes(&self) -> Vec<(u16, u16)> {
        self.sizes.lock().unwrap().clone()
    }

    pub(crate) fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    fn exit(&self, code: Option<i32>) {
        if !self.exited.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(ProcessEvent::Exit { code });
        }
    }
}

impl ProcessControl for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn write(&self, data: &[u8]) -> Result<(), ProcessError> {
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), ProcessError> {
        self.sizes.lock().unwrap().push((cols, rows));
        Ok(())
    }

    fn kill(&self, _signal: Option<KillSignal>) {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.exit(None);
    }
}

/// A spawned fake and the plan it was started from.
#[derive(Clone)]
pub(crate) struct FakeHandle {
    pub process: Arc<FakeProcess>,
    pub plan: SpawnPlan,
}

impl FakeHandle {
    pub(crate) fn emit(&self, data: &[u8]) {
        let _ = self.process.tx.send(ProcessEvent::Output(data.to_vec()));
    }

    pub(crate) fn exit(&self, code: Option<i32>) {
        self.process.exit(code);
    }
}

pub(crate) struct FakeSpawner {
    handles: Mutex<Vec<FakeHandle>>,
    gate: Mutex<Option<Arc<Barrier>>>,
    fail_next: AtomicBool,
    next_pid: AtomicU32,
}

impl FakeSpawner {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            handles: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            fail_next: AtomicBool::new(false),
            next_pid: AtomicU32::new(1000),
        })
    }

    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Make the next `parties` spawns wait for each other before returning.
    pub(crate) fn hold_spawns(&self, parties: usize) {
        *self.gate.lock().unwrap() = Some(Arc::new(Barrier::new(parties)));
    }

    pub(crate) fn handles(&self) -> Vec<FakeHandle> {
        self.handles.lock().unwrap().clone()
    }

    pub(crate) fn spawn_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> FakeHandle {
        self.handles
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing spawned yet")
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, plan: &SpawnPlan) -> Result<SpawnedProcess, SpawnError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SpawnError::Failed("simulated".into()));
        }
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if gate.wait().is_leader() {
                *self.gate.lock().unwrap() = None;
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let process = Arc::new(FakeProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            tx,
            written: Mutex::new(Vec::new()),
            sizes: Mutex::new(Vec::new()),
            kills: AtomicUsize::new(0),
            exited: AtomicBool::new(false),
        });
        self.handles.lock().unwrap().push(FakeHandle {
            process: Arc::clone(&process),
            plan: plan.clone(),
        });
        Ok(SpawnedProcess {
            control: process,
            events: rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Viewers
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingViewer {
    frames: Mutex<Vec<ViewerFrame>>,
    buffered: AtomicUsize,
    fail: AtomicBool,
    pings: AtomicUsize,
    closed: Mutex<Option<(u16, String)>>,
}

impl RecordingViewer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_buffered(&self, bytes: usize) {
        self.buffered.store(bytes, Ordering::SeqCst);
    }

    pub(crate) fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn frames(&self) -> Vec<ViewerFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub(crate) fn output_frames(&self) -> Vec<Vec<u8>> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                ViewerFrame::Output(bytes) => Some(bytes.to_vec()),
                ViewerFrame::Control(_) => None,
            })
            .collect()
    }

    pub(crate) fn output(&self) -> Vec<u8> {
        self.output_frames().concat()
    }

    pub(crate) fn controls(&self) -> Vec<ControlMessage> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                ViewerFrame::Control(msg) => Some(msg),
                ViewerFrame::Output(_) => None,
            })
            .collect()
    }

    pub(crate) fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> Option<(u16, String)> {
        self.closed.lock().unwrap().clone()
    }
}

impl ViewerTransport for RecordingViewer {
    fn send(&self, frame: ViewerFrame) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) || self.closed().is_some() {
            return Err(TransportError::Closed);
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn buffered_amount(&self) -> usize {
        self.buffered.load(Ordering::SeqCst)
    }

    fn ping(&self) -> Result<(), TransportError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        *self.closed.lock().unwrap() = Some((code, reason.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Store and notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    failing: bool,
    statuses: Mutex<HashMap<String, Vec<(SessionStatus, Option<u32>)>>>,
    fields: Mutex<HashMap<String, Vec<MetaPatch>>>,
}

impl RecordingStore {
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub(crate) fn last_status(&self, id: &str) -> Option<(SessionStatus, Option<u32>)> {
        self.statuses.lock().unwrap().get(id)?.last().copied()
    }

    pub(crate) fn fields(&self, id: &str) -> Vec<MetaPatch> {
        self.fields.lock().unwrap().get(id).cloned().unwrap_or_default()
    }

    pub(crate) fn last_active_updates(&self, id: &str) -> usize {
        self.fields(id)
            .iter()
            .filter(|p| matches!(p, MetaPatch::LastActive(_)))
            .count()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

impl StatusStore for RecordingStore {
    fn get_session_meta(&self, id: &str) -> Result<Option<SessionMeta>, StoreError> {
        self.check()?;
        self.inner.get_session_meta(id)
    }

    fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
        pid: Option<u32>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.statuses
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push((status, pid));
        self.inner.set_status(id, status, pid)
    }

    fn set_field(&self, id: &str, patch: MetaPatch) -> Result<(), StoreError> {
        self.check()?;
        self.fields
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push(patch.clone());
        self.inner.set_field(id, patch)
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A registry wired to fakes, with handles on each fake.
pub(crate) struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub spawner: Arc<FakeSpawner>,
    pub store: Arc<RecordingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: MuxSettings,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::build(RecordingStore::default(), None)
    }

    pub(crate) fn with_failing_store() -> Self {
        Self::build(RecordingStore::failing(), None)
    }

    pub(crate) fn with_resume_root(root: &Path) -> Self {
        Self::build(RecordingStore::default(), Some(ResumeLocator::new(root)))
    }

    fn build(store: RecordingStore, resume: Option<ResumeLocator>) -> Self {
        let spawner = FakeSpawner::new();
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = MuxSettings::default();
        let approval = ApprovalDetector::new(&NotificationsConfig::default().approval_patterns)
            .expect("default patterns compile");
        let ctx = MuxContext {
            spawner: spawner.clone(),
            planner: SpawnPlanner::default(),
            store: store.clone(),
            notifier: notifier.clone(),
            approval,
            resume,
            settings: settings.clone(),
        };
        Self {
            registry: Arc::new(SessionRegistry::new(ctx)),
            spawner,
            store,
            notifier,
            settings,
        }
    }

    /// Spawn a bare session with default options.
    pub(crate) async fn spawn(&self, id: &str) -> Arc<Session> {
        self.registry
            .get_or_spawn(id, &SpawnOptions::default())
            .await
            .expect("fake spawn succeeds")
    }
}
