//! Everything a session needs from the outside world, passed in explicitly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tether_config::TetherConfig;
use tether_pty::{ProcessSpawner, SpawnPlanner, SpawnPolicy};

use crate::approval::ApprovalDetector;
use crate::broadcast::DEFAULT_BACKPRESSURE_THRESHOLD;
use crate::error::MuxError;
use crate::hooks::{Notifier, StatusStore};
use crate::resume::ResumeLocator;
use crate::scrollback::DEFAULT_SCROLLBACK_CAP;

/// Tunables for every session in a registry.
#[derive(Debug, Clone)]
pub struct MuxSettings {
    pub scrollback_cap: usize,
    pub backpressure_threshold: usize,
    pub keepalive_interval: Duration,
    pub activity_debounce: Duration,
    pub resume_delay: Duration,
}

impl Default for MuxSettings {
    fn default() -> Self {
        Self {
            scrollback_cap: DEFAULT_SCROLLBACK_CAP,
            backpressure_threshold: DEFAULT_BACKPRESSURE_THRESHOLD,
            keepalive_interval: Duration::from_secs(30),
            activity_debounce: Duration::from_secs(30),
            resume_delay: Duration::from_secs(8),
        }
    }
}

impl MuxSettings {
    pub fn from_config(config: &TetherConfig) -> Self {
        let sessions = &config.sessions;
        Self {
            scrollback_cap: sessions.scrollback_cap_bytes as usize,
            backpressure_threshold: sessions.backpressure_threshold_bytes as usize,
            keepalive_interval: Duration::from_secs(u64::from(sessions.keepalive_interval_secs)),
            activity_debounce: Duration::from_secs(u64::from(sessions.activity_debounce_secs)),
            resume_delay: Duration::from_secs(u64::from(config.resume.delay_secs)),
        }
    }
}

/// Build the spawn policy described by `config`.
pub fn spawn_policy(config: &TetherConfig) -> SpawnPolicy {
    SpawnPolicy {
        bypass_flag: config.spawn.bypass_flag.clone(),
        resume_flag: config.spawn.resume_flag.clone(),
        model_flag: config.spawn.model_flag.clone(),
        strip_env: config.spawn.strip_env.clone(),
        extra_env: config
            .spawn
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        default_cols: config.sessions.default_cols,
        default_rows: config.sessions.default_rows,
    }
}

/// Injected collaborators and settings shared by all sessions.
pub struct MuxContext {
    pub spawner: Arc<dyn ProcessSpawner>,
    pub planner: SpawnPlanner,
    pub store: Arc<dyn StatusStore>,
    pub notifier: Arc<dyn Notifier>,
    pub approval: ApprovalDetector,
    /// `None` disables resume-id backfill.
    pub resume: Option<ResumeLocator>,
    pub settings: MuxSettings,
}

impl MuxContext {
    /// Wire a context from configuration.
    pub fn from_config(
        config: &TetherConfig,
        spawner: Arc<dyn ProcessSpawner>,
        store: Arc<dyn StatusStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MuxError> {
        let approval = if config.notifications.enabled {
            ApprovalDetector::new(&config.notifications.approval_patterns)
        } else {
            ApprovalDetector::disabled()
        }
        .map_err(|e| MuxError::Config(format!("approval pattern: {e}")))?;

        let resume = if config.resume.enabled {
            config
                .resume
                .log_root
                .as_ref()
                .map(PathBuf::from)
                .or_else(ResumeLocator::default_root)
                .map(ResumeLocator::new)
        } else {
            None
        };

        Ok(Self {
            spawner,
            planner: SpawnPlanner::new(spawn_policy(config)),
            store,
            notifier,
            approval,
            resume,
            settings: MuxSettings::from_config(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{LogNotifier, MemoryStore};
    use crate::test_support::FakeSpawner;

    #[test]
    fn settings_follow_config() {
        let mut config = TetherConfig::default();
        config.sessions.scrollback_cap_bytes = 4096;
        config.sessions.keepalive_interval_secs = 5;
        config.resume.delay_secs = 3;
        let settings = MuxSettings::from_config(&config);
        assert_eq!(settings.scrollback_cap, 4096);
        assert_eq!(settings.keepalive_interval, Duration::from_secs(5));
        assert_eq!(settings.resume_delay, Duration::from_secs(3));
    }

    #[test]
    fn default_config_matches_default_settings() {
        let from_config = MuxSettings::from_config(&TetherConfig::default());
        let defaults = MuxSettings::default();
        assert_eq!(from_config.scrollback_cap, defaults.scrollback_cap);
        assert_eq!(from_config.backpressure_threshold, defaults.backpressure_threshold);
        assert_eq!(from_config.activity_debounce, defaults.activity_debounce);
    }

    #[test]
    fn context_from_config() {
        let mut config = TetherConfig::default();
        config.resume.log_root = Some("/var/tmp/tether-logs".into());
        config.spawn.env.insert("FOO".into(), "bar".into());
        let ctx = MuxContext::from_config(
            &config,
            FakeSpawner::new(),
            Arc::new(MemoryStore::new()),
            Arc::new(LogNotifier),
        )
        .unwrap();
        assert_eq!(
            ctx.resume.as_ref().unwrap().log_root(),
            std::path::Path::new("/var/tmp/tether-logs")
        );
        assert_eq!(ctx.planner.policy().extra_env.get("FOO").unwrap(), "bar");
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        let mut config = TetherConfig::default();
        config.notifications.approval_patterns = vec!["(".into()];
        let err = MuxContext::from_config(
            &config,
            FakeSpawner::new(),
            Arc::new(MemoryStore::new()),
            Arc::new(LogNotifier),
        )
        .err()
        .unwrap();
        assert!(matches!(err, MuxError::Config(_)));
    }

    #[test]
    fn resume_can_be_disabled() {
        let mut config = TetherConfig::default();
        config.resume.enabled = false;
        let ctx = MuxContext::from_config(
            &config,
            FakeSpawner::new(),
            Arc::new(MemoryStore::new()),
            Arc::new(LogNotifier),
        )
        .unwrap();
        assert!(ctx.resume.is_none());
    }
}
