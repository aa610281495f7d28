//! Session multiplexer: keeps PTY-backed processes alive independently of
//! the viewers watching them.
//!
//! A [`SessionRegistry`] owns every [`Session`]. Viewers come and go through
//! [`SessionRegistry::attach`], which replays scrollback before switching the
//! viewer onto the live stream. Output fans out to all attached viewers
//! without ever blocking the reader; a viewer whose transport backlog is too
//! large simply misses live chunks until it catches up or reconnects.

pub mod activity;
pub mod approval;
pub mod attach;
pub mod broadcast;
pub mod context;
pub mod error;
pub mod hooks;
pub mod keepalive;
pub mod registry;
pub mod restart;
pub mod resume;
pub mod scrollback;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use attach::Attachment;
pub use context::{MuxContext, MuxSettings};
pub use error::{MuxError, NotifyError, StoreError, TransportError};
pub use hooks::{
    LogNotifier, MemoryStore, MetaPatch, Notifier, SessionMeta, SessionStatus, StatusStore,
};
pub use registry::{SessionRegistry, SessionSummary};
pub use scrollback::ScrollbackBuffer;
pub use session::Session;
pub use transport::{ControlMessage, ViewerFrame, ViewerTransport};
