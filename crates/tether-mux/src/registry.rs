//! The table of sessions, keyed by caller-assigned id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tether_pty::SpawnOptions;
use tokio::sync::RwLock;

use crate::context::MuxContext;
use crate::error::MuxError;
use crate::hooks::{self, MetaPatch, SessionStatus};
use crate::session::Session;

/// One row of [`SessionRegistry::list`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub pid: Option<u32>,
    pub alive: bool,
    pub client_count: usize,
    pub created_at: DateTime<Utc>,
    pub exit_code: Option<i32>,
}

/// Owns every session from first spawn until it is killed.
pub struct SessionRegistry {
    ctx: Arc<MuxContext>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(ctx: MuxContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<MuxContext> {
        &self.ctx
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub(crate) async fn get_live(&self, id: &str) -> Option<Arc<Session>> {
        self.get(id).await.filter(|s| s.is_alive())
    }

    /// Return the live session `id`, spawning (or respawning) it if needed.
    pub async fn get_or_spawn(
        &self,
        id: &str,
        options: &SpawnOptions,
    ) -> Result<Arc<Session>, MuxError> {
        if let Some(existing) = self.get(id).await {
            if existing.is_alive() {
                return Ok(existing);
            }
            return self.respawn(existing, options).await;
        }

        let plan = match self.ctx.planner.plan(options) {
            Ok(plan) => plan,
            Err(e) => return Err(self.spawn_failed(id, e.into())),
        };
        let spawned = match self.ctx.spawner.spawn(&plan) {
            Ok(spawned) => spawned,
            Err(e) => return Err(self.spawn_failed(id, e.into())),
        };
        let started_at = SystemTime::now();

        let session = {
            let mut sessions = self.sessions.write().await;
            if let Some(existing) = sessions.get(id) {
                // Lost a race with a concurrent spawn of the same id.
                tracing::debug!(session = %id, "concurrent spawn, discarding duplicate process");
                spawned.control.kill(None);
                return Ok(Arc::clone(existing));
            }
            let session = Session::start(
                id.to_string(),
                Arc::clone(&self.ctx),
                spawned,
                plan.params,
                options.clone(),
            );
            sessions.insert(id.to_string(), Arc::clone(&session));
            session
        };

        tracing::info!(
            session = %id,
            pid = ?session.pid(),
            command = ?plan.command_line,
            "session spawned"
        );
        self.spawn_succeeded(&session, options, started_at);
        Ok(session)
    }

    /// Start a new process for a registered session whose process is gone.
    /// Scrollback, viewers and `created_at` carry over.
    async fn respawn(
        &self,
        session: Arc<Session>,
        options: &SpawnOptions,
    ) -> Result<Arc<Session>, MuxError> {
        let _lifecycle = session.lifecycle.lock().await;
        if session.is_alive() {
            return Ok(Arc::clone(&session));
        }
        if session.is_killed() {
            return Err(MuxError::NotFound(session.id().to_string()));
        }

        let id = session.id().to_string();
        let plan = self
            .ctx
            .planner
            .plan(options)
            .map_err(|e| self.spawn_failed(&id, e.into()))?;
        let spawned = self
            .ctx
            .spawner
            .spawn(&plan)
            .map_err(|e| self.spawn_failed(&id, e.into()))?;
        let started_at = SystemTime::now();

        session.install(spawned, plan.params);
        session.set_options(options.clone());
        tracing::info!(session = %id, pid = ?session.pid(), "session respawned");
        self.spawn_succeeded(&session, options, started_at);
        Ok(Arc::clone(&session))
    }

    fn spawn_failed(&self, id: &str, err: MuxError) -> MuxError {
        tracing::warn!(session = %id, error = %err, "spawn failed");
        hooks::report_status(self.ctx.store.as_ref(), id, SessionStatus::Error, None);
        err
    }

    fn spawn_succeeded(&self, session: &Arc<Session>, options: &SpawnOptions, started_at: SystemTime) {
        let store = self.ctx.store.as_ref();
        hooks::report_status(store, session.id(), SessionStatus::Running, session.pid());
        hooks::report_field(store, session.id(), MetaPatch::Options(options.clone()));
        self.schedule_resume_backfill(session, options, started_at);
    }

    /// After a delay, look for the resume id of an agent session that was
    /// started fresh and record it. Skipped if the session is gone by then.
    fn schedule_resume_backfill(
        &self,
        session: &Arc<Session>,
        options: &SpawnOptions,
        started_at: SystemTime,
    ) {
        let Some(locator) = self.ctx.resume.clone() else {
            return;
        };
        let has_command = options.command.as_deref().is_some_and(|c| !c.trim().is_empty());
        if !has_command || options.resume_id.is_some() {
            return;
        }

        let weak = Arc::downgrade(session);
        let store = Arc::clone(&self.ctx.store);
        let delay = self.ctx.settings.resume_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = weak.upgrade() else {
                return;
            };
            if session.is_killed() || !session.is_alive() {
                return;
            }
            let cwd = session.spawn_params().cwd;
            let found =
                tokio::task::spawn_blocking(move || locator.locate(&cwd, started_at)).await;
            match found {
                Ok(Some(resume_id)) => {
                    if session.is_killed() {
                        return;
                    }
                    tracing::info!(session = %session.id(), %resume_id, "resume id found");
                    let mut options = session.options();
                    options.resume_id = Some(resume_id.clone());
                    session.set_options(options);
                    hooks::report_field(store.as_ref(), session.id(), MetaPatch::ResumeId(resume_id));
                }
                Ok(None) => tracing::debug!(session = %session.id(), "no resume id found"),
                Err(e) => tracing::debug!(session = %session.id(), error = %e, "resume scan failed"),
            }
        });
    }

    /// Kill `id`: close its viewers, stop its timers, end its process and
    /// forget it. Returns `false` if no such session is registered.
    pub async fn kill(&self, id: &str) -> bool {
        let Some(session) = self.get(id).await else {
            return false;
        };
        {
            let _lifecycle = session.lifecycle.lock().await;
            session.terminate();
        }
        let removed = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(id) {
                Some(current) if Arc::ptr_eq(current, &session) => sessions.remove(id).is_some(),
                _ => false,
            }
        };
        tracing::info!(session = %id, "session killed");
        hooks::report_status(self.ctx.store.as_ref(), id, SessionStatus::Stopped, None);
        removed
    }

    /// Replace the process of `id` with a bare shell.
    pub async fn restart(&self, id: &str) -> Result<(), MuxError> {
        let session = self
            .get(id)
            .await
            .ok_or_else(|| MuxError::NotFound(id.to_string()))?;
        session.force_restart_as_shell().await;
        Ok(())
    }

    /// Every registered session, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut rows: Vec<SessionSummary> = sessions
            .values()
            .map(|s| {
                let state = s.state();
                SessionSummary {
                    id: s.id().to_string(),
                    pid: state.pid,
                    alive: state.alive,
                    client_count: state.clients.len(),
                    created_at: s.created_at(),
                    exit_code: state.exit_code,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Kill every session.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for id in ids {
            self.kill(&id).await;
        }
        tracing::info!("all sessions stopped");
    }
}
