//! Log fan-in server (component G).
//!
//! A raw `tokio::net::TcpListener` on `127.0.0.1:<LOG_PORT>` — not HTTP,
//! since the wire format is a bespoke 4-byte length-prefixed frame.
//! Co-resident processes (the shell runtime's logger, systemd units) open a
//! connection and stream framed records; each decoded record becomes a
//! priority-90 POST to `/api/history/logs/` through the shared priority
//! queue.

mod error;
mod record;
mod server;

pub use error::LogSinkError;
pub use record::{LogEntry, LogRecord};
pub use server::LogServer;

/// `logging.handlers.DEFAULT_TCP_LOGGING_PORT` in the reference agent;
/// kept as the default so existing log-forwarding configuration doesn't
/// need to change.
pub const DEFAULT_LOG_PORT: u16 = 9020;
