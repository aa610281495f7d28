//! Configuration schema types for Tether.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod notifications;
mod resume;
mod server;
mod sessions;
mod spawn;
mod system;

pub use notifications::*;
pub use resume::*;
pub use server::*;
pub use sessions::*;
pub use spawn::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Tether.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TetherConfig {
    pub server: ServerConfig,
    pub sessions: SessionsConfig,
    pub spawn: SpawnConfig,
    pub resume: ResumeConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}
