//! The framed log record and its translation to the outbound POST shape.
//!
//! Each frame's payload is a JSON object rather than a pickled
//! `logging.LogRecord` — every other wire format in this agent is JSON, and
//! pickle has no safe equivalent to reach for here, so co-resident senders
//! serialize the same field set as JSON instead.

use serde::{Deserialize, Serialize};

/// A single log record as received over the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    /// Unix timestamp (seconds, fractional) the record was created at.
    pub created: f64,
    pub levelno: i32,
    pub name: String,
    pub pathname: String,
    pub lineno: u32,
    pub process: u32,
    pub thread: u64,
    #[serde(rename = "processName")]
    pub process_name: String,
    #[serde(rename = "threadName")]
    pub thread_name: String,
    pub msg: String,
    #[serde(default)]
    pub program: String,
}

/// The `/api/history/logs/` POST body shape.
#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub date: String,
    pub level: i32,
    pub program: String,
    pub name: String,
    pub path: String,
    pub lineno: u32,
    pub pid: u32,
    pub tid: u64,
    pub process: String,
    pub thread: String,
    pub msg: String,
}

impl From<LogRecord> for LogEntry {
    fn from(r: LogRecord) -> Self {
        let secs = r.created.trunc() as i64;
        let nanos = (r.created.fract() * 1_000_000_000.0).round() as u32;
        let date = chrono::DateTime::from_timestamp(secs, nanos)
            .unwrap_or_else(|| chrono::DateTime::from_timestamp(0, 0).unwrap())
            .format("%Y-%m-%dT%H:%M:%S%.fZ")
            .to_string();

        LogEntry {
            date,
            level: r.levelno,
            program: r.program,
            name: r.name,
            path: r.pathname,
            lineno: r.lineno,
            pid: r.process,
            tid: r.thread,
            process: r.process_name,
            thread: r.thread_name,
            msg: r.msg,
        }
    }
}
