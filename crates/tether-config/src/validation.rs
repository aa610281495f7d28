//! Full configuration validation.
//!
//! Validates numeric ranges and regex syntax, collecting every problem.

use crate::schema::TetherConfig;
use tether_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TetherConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(
        &mut errors,
        "server.hello_timeout_secs",
        config.server.hello_timeout_secs,
        1,
        120,
    );

    let sessions = &config.sessions;
    validate_range(
        &mut errors,
        "sessions.scrollback_cap_bytes",
        sessions.scrollback_cap_bytes,
        1024,
        16 * 1024 * 1024,
    );
    validate_range(
        &mut errors,
        "sessions.backpressure_threshold_bytes",
        sessions.backpressure_threshold_bytes,
        1024,
        16 * 1024 * 1024,
    );
    validate_range(
        &mut errors,
        "sessions.keepalive_interval_secs",
        sessions.keepalive_interval_secs,
        1,
        600,
    );
    validate_range(
        &mut errors,
        "sessions.activity_debounce_secs",
        sessions.activity_debounce_secs,
        1,
        3600,
    );
    validate_range(
        &mut errors,
        "sessions.default_cols",
        u32::from(sessions.default_cols),
        1,
        500,
    );
    validate_range(
        &mut errors,
        "sessions.default_rows",
        u32::from(sessions.default_rows),
        1,
        200,
    );

    validate_range(&mut errors, "resume.delay_secs", config.resume.delay_secs, 1, 300);

    for (i, pattern) in config.notifications.approval_patterns.iter().enumerate() {
        if let Err(e) = regex::Regex::new(pattern) {
            errors.push(format!("notifications.approval_patterns[{i}] is invalid: {e}"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = TetherConfig::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = TetherConfig::default();
        config.sessions.keepalive_interval_secs = 0;
        config.sessions.default_cols = 900;
        config.resume.delay_secs = 1000;

        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("sessions.keepalive_interval_secs"));
        assert!(err.contains("sessions.default_cols"));
        assert!(err.contains("resume.delay_secs"));
    }

    #[test]
    fn rejects_bad_regex() {
        let mut config = TetherConfig::default();
        config.notifications.approval_patterns = vec!["(unclosed".into()];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("approval_patterns[0]"));
    }

    #[test]
    fn boundary_values_pass() {
        let mut config = TetherConfig::default();
        config.sessions.default_cols = 500;
        config.sessions.default_rows = 1;
        config.sessions.scrollback_cap_bytes = 1024;
        assert!(validate(&config).is_ok());
    }
}
