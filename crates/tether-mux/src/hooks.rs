//! External collaborators the multiplexer reports to: a status store and a
//! notification sink.
//!
//! Every call is best-effort. The helpers at the bottom log failures at
//! `debug` and carry on, so a broken store never aborts a spawn, attach or
//! broadcast.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tether_common::{Notification, NotificationLevel};
use tether_pty::SpawnOptions;

use crate::error::{NotifyError, StoreError};

/// Lifecycle state as reported to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Stopped,
    Exited,
    Error,
}

/// What the store remembers about a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionMeta {
    /// Options the session was last spawned with. Used to respawn it when a
    /// viewer reattaches after the process is gone.
    pub options: SpawnOptions,
    pub status: Option<SessionStatus>,
    pub pid: Option<u32>,
    pub last_active: Option<DateTime<Utc>>,
}

/// A single-field update.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaPatch {
    Options(SpawnOptions),
    ResumeId(String),
    LastActive(DateTime<Utc>),
}

impl MetaPatch {
    fn apply(self, meta: &mut SessionMeta) {
        match self {
            MetaPatch::Options(options) => meta.options = options,
            MetaPatch::ResumeId(id) => meta.options.resume_id = Some(id),
            MetaPatch::LastActive(at) => meta.last_active = Some(at),
        }
    }
}

/// Persistent session metadata, owned by someone else.
pub trait StatusStore: Send + Sync {
    fn get_session_meta(&self, id: &str) -> Result<Option<SessionMeta>, StoreError>;

    fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
        pid: Option<u32>,
    ) -> Result<(), StoreError>;

    fn set_field(&self, id: &str, patch: MetaPatch) -> Result<(), StoreError>;
}

/// Process-local store. Forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionMeta>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStore {
    fn get_session_meta(&self, id: &str) -> Result<Option<SessionMeta>, StoreError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(id).cloned())
    }

    fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
        pid: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let meta = sessions.entry(id.to_string()).or_default();
        meta.status = Some(status);
        meta.pid = pid;
        Ok(())
    }

    fn set_field(&self, id: &str, patch: MetaPatch) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        patch.apply(sessions.entry(id.to_string()).or_default());
        Ok(())
    }
}

/// Somewhere to send user-facing alerts.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.level {
            NotificationLevel::Info => {
                tracing::info!(title = %notification.title, body = %notification.body, "notification")
            }
            NotificationLevel::Warning => {
                tracing::warn!(title = %notification.title, body = %notification.body, "notification")
            }
            NotificationLevel::Error => {
                tracing::error!(title = %notification.title, body = %notification.body, "notification")
            }
        }
        Ok(())
    }
}

pub(crate) fn report_status(
    store: &dyn StatusStore,
    id: &str,
    status: SessionStatus,
    pid: Option<u32>,
) {
    if let Err(e) = store.set_status(id, status, pid) {
        tracing::debug!(session = %id, ?status, error = %e, "status report dropped");
    }
}

pub(crate) fn report_field(store: &dyn StatusStore, id: &str, patch: MetaPatch) {
    if let Err(e) = store.set_field(id, patch) {
        tracing::debug!(session = %id, error = %e, "field update dropped");
    }
}

pub(crate) fn saved_options(store: &dyn StatusStore, id: &str) -> Option<SpawnOptions> {
    match store.get_session_meta(id) {
        Ok(meta) => meta.map(|m| m.options),
        Err(e) => {
            tracing::debug!(session = %id, error = %e, "session meta lookup failed");
            None
        }
    }
}

pub(crate) fn send_notification(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.notify(notification) {
        tracing::debug!(title = %notification.title, error = %e, "notification dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_tracks_status_and_fields() {
        let store = MemoryStore::new();
        assert!(store.get_session_meta("s1").unwrap().is_none());

        store
            .set_field(
                "s1",
                MetaPatch::Options(SpawnOptions {
                    command: Some("claude".into()),
                    ..Default::default()
                }),
            )
            .unwrap();
        store.set_status("s1", SessionStatus::Running, Some(42)).unwrap();
        store.set_field("s1", MetaPatch::ResumeId("abc".into())).unwrap();

        let meta = store.get_session_meta("s1").unwrap().unwrap();
        assert_eq!(meta.status, Some(SessionStatus::Running));
        assert_eq!(meta.pid, Some(42));
        assert_eq!(meta.options.command.as_deref(), Some("claude"));
        assert_eq!(meta.options.resume_id.as_deref(), Some("abc"));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Exited).unwrap(),
            "\"exited\""
        );
    }

    struct BrokenStore;

    impl StatusStore for BrokenStore {
        fn get_session_meta(&self, _id: &str) -> Result<Option<SessionMeta>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn set_status(&self, _: &str, _: SessionStatus, _: Option<u32>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn set_field(&self, _: &str, _: MetaPatch) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[test]
    fn helpers_swallow_store_failures() {
        report_status(&BrokenStore, "s1", SessionStatus::Error, None);
        report_field(&BrokenStore, "s1", MetaPatch::LastActive(Utc::now()));
        assert!(saved_options(&BrokenStore, "s1").is_none());
    }

    #[test]
    fn log_notifier_accepts_every_level() {
        let notifier = LogNotifier;
        for n in [
            Notification::info("a", "b"),
            Notification::warning("a", "b"),
            Notification::error("a", "b"),
        ] {
            assert!(notifier.notify(&n).is_ok());
        }
    }
}
