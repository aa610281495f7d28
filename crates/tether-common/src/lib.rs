pub mod errors;
pub mod id;
pub mod notifications;

pub use errors::{ConfigError, TetherError};
pub use id::{new_id, ClientId};
pub use notifications::{Notification, NotificationLevel};

pub type Result<T> = std::result::Result<T, TetherError>;
