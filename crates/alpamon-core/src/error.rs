//! Common error type for the alpamon agent runtime.
//!
//! Every component in the agent (the authenticated HTTP client, the
//! priority queue, the command dispatcher, the shell/PTY runtime, ...)
//! eventually needs to report failure through the same channel: the
//! `fin` record sent back to the controller, or a log line. [`AgentError`]
//! gives them one error type to return so call sites don't need manual
//! `From` impls for every layer they pass through.
//!
//! # Example
//!
//! ```
//! use alpamon_core::AgentError;
//!
//! fn handle(err: AgentError) {
//!     if err.is_timeout() {
//!         eprintln!("timed out");
//!     } else if err.is_application() {
//!         eprintln!("application error: {}", err.application_error().unwrap());
//!     }
//! }
//! # handle(AgentError::Timeout { layer: "http" });
//! ```

use std::fmt;
use std::time::Duration;

/// A unified error type for the agent's resilience-sensitive components.
#[derive(Debug, Clone)]
pub enum AgentError {
    /// A caller-supplied timeout elapsed (HTTP client, `runcmd`, PTY spawn).
    Timeout {
        /// The layer that timed out, e.g. `"http"`, `"runcmd"`.
        layer: &'static str,
    },

    /// The priority queue was at capacity when `enqueue` was called.
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// A queued request's absolute expiry passed before it was dequeued.
    Expired,

    /// The retry budget for a queued request was exhausted.
    RetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Configuration was missing, malformed, or failed validation.
    Config(String),

    /// A privilege-drop operation (`setuid`/`setgid`) failed.
    PrivilegeDrop(String),

    /// A named PTY session was not present in the registry.
    UnknownSession {
        /// The session id that was looked up.
        session_id: String,
    },

    /// The platform family could not be mapped to a package manager.
    UnsupportedPlatform,

    /// A transport-level failure from the HTTP client or backhaul socket.
    Transport(String),

    /// An application-specific error surfaced from a wrapped operation.
    Application(String),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Timeout { layer } => write!(f, "timeout in {layer}"),
            AgentError::QueueFull { capacity } => {
                write!(f, "queue full (capacity {capacity})")
            }
            AgentError::Expired => write!(f, "request expired before delivery"),
            AgentError::RetriesExhausted { attempts } => {
                write!(f, "retries exhausted after {attempts} attempts")
            }
            AgentError::Config(msg) => write!(f, "configuration error: {msg}"),
            AgentError::PrivilegeDrop(msg) => write!(f, "privilege drop failed: {msg}"),
            AgentError::UnknownSession { session_id } => {
                write!(f, "unknown pty session: {session_id}")
            }
            AgentError::UnsupportedPlatform => write!(f, "unsupported platform"),
            AgentError::Transport(msg) => write!(f, "transport error: {msg}"),
            AgentError::Application(msg) => write!(f, "application error: {msg}"),
        }
    }
}

impl std::error::Error for AgentError {}

impl AgentError {
    /// Returns `true` if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Timeout { .. })
    }

    /// Returns `true` if this is a queue-full rejection.
    pub fn is_queue_full(&self) -> bool {
        matches!(self, AgentError::QueueFull { .. })
    }

    /// Returns `true` if this is an application-level error.
    pub fn is_application(&self) -> bool {
        matches!(self, AgentError::Application(_))
    }

    /// Extracts the application error message, if this is an `Application` variant.
    pub fn application_error(&self) -> Option<&str> {
        match self {
            AgentError::Application(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    /// Builds an [`AgentError::Timeout`] tagging the layer that elapsed, also
    /// logging the configured duration for context.
    pub fn timeout(layer: &'static str, after: Duration) -> Self {
        tracing_timeout(layer, after);
        AgentError::Timeout { layer }
    }
}

#[cfg(feature = "tracing")]
fn tracing_timeout(layer: &'static str, after: Duration) {
    tracing::debug!(layer, ?after, "operation timed out");
}

#[cfg(not(feature = "tracing"))]
fn tracing_timeout(_layer: &'static str, _after: Duration) {}

/// Configuration-loading error, kept distinct from [`AgentError`] because
/// startup failures ("fatal, process exits non-zero") are handled by
/// `main` rather than propagated through the runtime's resilience paths.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration file found at /etc/alpamon/alpamon.conf or ~/.alpamon.conf")]
    NotFound,

    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ini::Error,
    },

    #[error("missing required key [{section}] {key}")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },

    #[error("server url must start with http:// or https://, got {0:?}")]
    InvalidUrl(String),
}

impl From<ConfigError> for AgentError {
    fn from(err: ConfigError) -> Self {
        AgentError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = AgentError::QueueFull { capacity: 36_000 };
        assert!(err.to_string().contains("36000") || err.to_string().contains("36_000"));
    }

    #[test]
    fn application_helpers_roundtrip() {
        let err = AgentError::Application("boom".to_string());
        assert!(err.is_application());
        assert_eq!(err.application_error(), Some("boom"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn config_error_converts_to_agent_error() {
        let cfg_err = ConfigError::MissingKey {
            section: "server",
            key: "url",
        };
        let agent_err: AgentError = cfg_err.into();
        assert!(matches!(agent_err, AgentError::Config(_)));
    }
}
