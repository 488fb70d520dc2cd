//! Parses the inbound command record carried inside a `command` query.

use serde_json::Value;
use std::collections::HashMap;

/// Which interpreter runs [`CommandRecord::line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    /// A verb recognized by [`crate::verb::InternalVerb`].
    Internal,
    /// A literal shell line, chained on `&&`/`||`/`;`.
    System,
    /// SQL input to the host's fact-query tool, line-formatted output.
    Osquery,
}

/// One inbound command, already ack'd on the control channel.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub id: Option<String>,
    pub shell: ShellKind,
    pub line: String,
    pub username: String,
    pub groupname: String,
    pub env: Option<HashMap<String, String>>,
    pub data: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
    #[error("unrecognized shell kind: {0}")]
    UnknownShell(String),
}

impl TryFrom<Value> for CommandRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let shell_str = value
            .get("shell")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingField("shell"))?;

        let shell = match shell_str {
            "internal" => ShellKind::Internal,
            "system" => ShellKind::System,
            "osquery" => ShellKind::Osquery,
            other => return Err(RecordError::UnknownShell(other.to_string())),
        };

        let line = value
            .get("line")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingField("line"))?
            .to_string();

        let id = value.get("id").and_then(Value::as_str).map(str::to_string);

        let username = value
            .get("user")
            .and_then(Value::as_str)
            .unwrap_or("root")
            .to_string();
        let groupname = value
            .get("group")
            .and_then(Value::as_str)
            .unwrap_or(username.as_str())
            .to_string();

        let env = value.get("env").and_then(Value::as_object).map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        });

        let data = value.get("data").cloned();

        Ok(CommandRecord {
            id,
            shell,
            line,
            username,
            groupname,
            env,
            data,
        })
    }
}
