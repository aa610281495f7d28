//! PTY error types.

/// Why a spawn attempt produced no process.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// A command, resume id or model failed validation. Nothing was launched.
    #[error("unsafe input rejected: {0}")]
    UnsafeInput(String),

    /// The OS refused to create the PTY or the child process.
    #[error("failed to spawn process: {0}")]
    Failed(String),
}

/// Errors from operating on a running process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to resize PTY: {0}")]
    ResizeFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_display() {
        let err = SpawnError::UnsafeInput("command contains ';'".into());
        assert_eq!(err.to_string(), "unsafe input rejected: command contains ';'");

        let err = SpawnError::Failed("openpty: ENOSPC".into());
        assert_eq!(err.to_string(), "failed to spawn process: openpty: ENOSPC");
    }

    #[test]
    fn process_error_from_io() {
        let err: ProcessError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert!(matches!(err, ProcessError::Io(_)));
        assert!(err.to_string().contains("pipe closed"));
    }
}
