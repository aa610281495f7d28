//! TOML config file loading and creation.

use crate::schema::TetherConfig;
use crate::validation;
use std::path::{Path, PathBuf};
use tether_common::ConfigError;
use tracing::{info, warn};

/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields.
/// If validation fails, a warning is logged and the default config is
/// returned.
pub fn load_from_path(path: &Path) -> Result<TetherConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: TetherConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(TetherConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// If the file does not exist, creates a default config file and returns
/// defaults.
pub fn load_default() -> Result<TetherConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, creating default", path.display());
        create_default_config(&path)?;
        return Ok(TetherConfig::default());
    }

    load_from_path(&path)
}

/// Get the platform-specific default config file path.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::ParseError("could not determine config directory".into())
    })?;
    Ok(config_dir.join("tether").join("config.toml"))
}

/// Create a default TOML config file with documentation comments.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    std::fs::write(path, default_config_toml()).map_err(|e| {
        ConfigError::ParseError(format!(
            "failed to write default config to {}: {e}",
            path.display()
        ))
    })?;

    info!("created default config at {}", path.display());
    Ok(())
}

/// Generate the default TOML config content with comments.
fn default_config_toml() -> String {
    r##"# Tether Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# bind = "127.0.0.1"
# port = 7681
# hello_timeout_secs = 10        # 1-120

[sessions]
# scrollback_cap_bytes = 102400  # 1024-16777216
# backpressure_threshold_bytes = 65536
# keepalive_interval_secs = 30   # 1-600
# activity_debounce_secs = 30    # 1-3600
# default_cols = 80              # 1-500
# default_rows = 24              # 1-200

[spawn]
# bypass_flag = "--dangerously-skip-permissions"
# resume_flag = "--resume"
# model_flag = "--model"
# strip_env = ["CLAUDECODE", "TETHER_SESSION"]

[spawn.env]
# EDITOR = "nvim"

[resume]
# enabled = true
# delay_secs = 8                 # 1-300
# log_root = "~/.claude/projects"

[notifications]
# enabled = true
# approval_patterns = ['\(y/n\)']

[logging]
# level = "INFO"                 # TRACE, DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
