//! Errors from spawning a command or dropping privileges.

use alpamon_core::AgentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("privilege drop failed: {0}")]
    PrivilegeDrop(String),

    #[error("failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("command timed out")]
    Timeout,

    #[error("pty error: {0}")]
    Pty(String),
}

impl From<ShellError> for AgentError {
    fn from(err: ShellError) -> Self {
        match err {
            ShellError::Timeout => AgentError::Timeout { layer: "runcmd" },
            ShellError::PrivilegeDrop(msg) | ShellError::UnknownUser(msg) | ShellError::UnknownGroup(msg) => {
                AgentError::PrivilegeDrop(msg)
            }
            ShellError::Spawn(e) => AgentError::Application(e.to_string()),
            ShellError::Pty(msg) => AgentError::Application(msg),
        }
    }
}
