//! Replacing a session's process with a bare shell, viewers untouched.

use std::sync::Arc;

use tether_pty::SpawnPlan;

use crate::broadcast;
use crate::hooks::{self, SessionStatus};
use crate::session::Session;
use crate::transport::ControlMessage;

impl Session {
    /// Kill the current process and start an interactive login shell with
    /// the same shell, cwd, size and environment. No-op if not alive.
    ///
    /// The old process's exit is absorbed: viewers see no exit message and
    /// keep receiving output from the new shell.
    pub async fn force_restart_as_shell(self: &Arc<Self>) {
        let _lifecycle = self.lifecycle.lock().await;
        let (old, params) = {
            let mut state = self.state();
            if !state.alive || state.killed {
                return;
            }
            state.restarting = true;
            state.generation += 1;
            (state.process.take(), state.params.clone())
        };
        if let Some(old) = old {
            old.kill(None);
        }

        let plan = SpawnPlan::bare_shell(&params);
        match self.ctx.spawner.spawn(&plan) {
            Ok(spawned) => {
                self.install(spawned, plan.params);
                let pid = self.pid();
                tracing::info!(session = %self.id(), pid = ?pid, shell = %plan.program, "restarted as shell");
                hooks::report_status(self.ctx.store.as_ref(), self.id(), SessionStatus::Running, pid);
            }
            Err(e) => {
                tracing::warn!(session = %self.id(), error = %e, "restart failed");
                {
                    let mut state = self.state();
                    state.alive = false;
                    state.restarting = false;
                    state.exit_code = None;
                    broadcast::send_control(
                        &mut state.clients,
                        &ControlMessage::Error {
                            message: format!("restart failed: {e}"),
                        },
                    );
                }
                hooks::report_status(self.ctx.store.as_ref(), self.id(), SessionStatus::Error, None);
            }
        }
    }
}
