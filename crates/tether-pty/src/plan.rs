//! Turning caller-supplied spawn options into a concrete launch plan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cwd::{resolve_cwd, CwdRecovery, DefaultCwdRecovery};
use crate::env::{build_env, EnvSnapshot};
use crate::error::SpawnError;
use crate::shell::{resolve_shell, shell_args};
use crate::validate::{validate_command, validate_model, validate_resume_id};
use crate::{clamp_size, DEFAULT_COLS, DEFAULT_ROWS};

/// Spawn request as received from a viewer or the status store.
///
/// Every free-text field is untrusted until [`SpawnPlanner::plan`] has
/// validated it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnOptions {
    /// Primary command. `None` or blank launches a bare login shell.
    pub command: Option<String>,
    pub cwd: Option<String>,
    /// Requested size, clamped when planned. Out-of-range values from a
    /// viewer are accepted here rather than failing the whole hello.
    pub cols: Option<i64>,
    pub rows: Option<i64>,
    /// Append the configured permission-bypass flag to the command.
    pub bypass: bool,
    pub resume_id: Option<String>,
    pub model: Option<String>,
    /// Requested shell binary; must be on the allow-list.
    pub shell: Option<String>,
}

impl SpawnOptions {
    /// Fill every unset field from `fallback`.
    pub fn or(mut self, fallback: &SpawnOptions) -> Self {
        self.command = self.command.or_else(|| fallback.command.clone());
        self.cwd = self.cwd.or_else(|| fallback.cwd.clone());
        self.cols = self.cols.or(fallback.cols);
        self.rows = self.rows.or(fallback.rows);
        self.bypass |= fallback.bypass;
        self.resume_id = self.resume_id.or_else(|| fallback.resume_id.clone());
        self.model = self.model.or_else(|| fallback.model.clone());
        self.shell = self.shell.or_else(|| fallback.shell.clone());
        self
    }

    fn has_command(&self) -> bool {
        self.command.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// How options are framed and which environment adjustments apply.
#[derive(Debug, Clone)]
pub struct SpawnPolicy {
    pub bypass_flag: String,
    pub resume_flag: String,
    pub model_flag: String,
    pub strip_env: Vec<String>,
    pub extra_env: BTreeMap<String, String>,
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for SpawnPolicy {
    fn default() -> Self {
        Self {
            bypass_flag: "--dangerously-skip-permissions".into(),
            resume_flag: "--resume".into(),
            model_flag: "--model".into(),
            strip_env: Vec::new(),
            extra_env: BTreeMap::new(),
            default_cols: DEFAULT_COLS,
            default_rows: DEFAULT_ROWS,
        }
    }
}

/// Parameters a session keeps for its whole life so it can relaunch a
/// shell without re-deriving them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnParams {
    pub shell: String,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub env: EnvSnapshot,
}

/// A fully resolved launch: program, argv and retained parameters.
#[derive(Debug, Clone)]
pub struct SpawnPlan {
    pub program: String,
    pub args: Vec<String>,
    /// The framed primary command, if one runs before the shell.
    pub command_line: Option<String>,
    pub params: SpawnParams,
}

impl SpawnPlan {
    /// A bare interactive login shell with the given parameters.
    pub fn bare_shell(params: &SpawnParams) -> Self {
        Self {
            program: params.shell.clone(),
            args: shell_args(&params.shell, None),
            command_line: None,
            params: params.clone(),
        }
    }
}

/// Validates [`SpawnOptions`] and resolves them into a [`SpawnPlan`].
pub struct SpawnPlanner {
    policy: SpawnPolicy,
    recovery: Box<dyn CwdRecovery>,
}

impl SpawnPlanner {
    pub fn new(policy: SpawnPolicy) -> Self {
        Self::with_recovery(policy, Box::new(DefaultCwdRecovery))
    }

    pub fn with_recovery(policy: SpawnPolicy, recovery: Box<dyn CwdRecovery>) -> Self {
        Self { policy, recovery }
    }

    pub fn policy(&self) -> &SpawnPolicy {
        &self.policy
    }

    /// Validate every untrusted field, then resolve shell, cwd, size and env.
    pub fn plan(&self, options: &SpawnOptions) -> Result<SpawnPlan, SpawnError> {
        if let Some(command) = &options.command {
            validate_command(command)?;
        }
        if let Some(resume_id) = &options.resume_id {
            validate_resume_id(resume_id)?;
        }
        if let Some(model) = &options.model {
            validate_model(model)?;
        }

        let command_line = self.command_line(options);
        let shell = resolve_shell(options.shell.as_deref());
        let cwd = resolve_cwd(
            options.cwd.as_deref().map(Path::new),
            self.recovery.as_ref(),
        );
        let (cols, rows) = clamp_size(
            options.cols.unwrap_or(i64::from(self.policy.default_cols)),
            options.rows.unwrap_or(i64::from(self.policy.default_rows)),
        );
        let env = build_env(
            std::env::vars(),
            &shell,
            &self.policy.strip_env,
            &self.policy.extra_env,
        );

        Ok(SpawnPlan {
            program: shell.clone(),
            args: shell_args(&shell, command_line.as_deref()),
            command_line,
            params: SpawnParams {
                shell,
                cwd,
                cols,
                rows,
                env,
            },
        })
    }

    /// `<command> [bypass] [resume <id>] [model <name>]`, for validated input.
    fn command_line(&self, options: &SpawnOptions) -> Option<String> {
        if !options.has_command() {
            return None;
        }
        let mut parts = vec![options.command.as_deref()?.trim().to_string()];
        if options.bypass && !self.policy.bypass_flag.is_empty() {
            parts.push(self.policy.bypass_flag.clone());
        }
        if let Some(resume_id) = &options.resume_id {
            parts.push(self.policy.resume_flag.clone());
            parts.push(resume_id.clone());
        }
        if let Some(model) = &options.model {
            parts.push(self.policy.model_flag.clone());
            parts.push(model.clone());
        }
        Some(parts.join(" "))
    }
}

impl Default for SpawnPlanner {
    fn default() -> Self {
        Self::new(SpawnPolicy::default())
    }
}
