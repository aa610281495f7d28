//! Tether configuration system.
//!
//! TOML-based configuration for the session multiplexer and its server.
//! All sections use serde defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tether_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{TetherConfig, CONFIG_SCHEMA_VERSION};

use std::path::Path;

use tether_common::ConfigError;

/// Load config from an explicit path, or from the platform default path.
///
/// The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<TetherConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };

    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TetherConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
