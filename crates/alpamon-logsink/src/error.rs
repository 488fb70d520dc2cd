//! Errors from a single log-fan-in connection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("i/o error reading framed log record: {0}")]
    Io(#[from] std::io::Error),

    #[error("log record payload was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
