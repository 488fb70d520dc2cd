//! The closed set of internal verbs, parsed from the first
//! whitespace/quote-separated token of a `line` under `shell: internal`.

use alpamon_core::{PackageRequest, PackageSource};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalVerb {
    PyPackage { request: PackageRequest, source: PackageSource, name: String },
    PyPackageUninstall { name: String },
    Package { request: PackageRequest, source: PackageSource, name: String },
    PackageUninstall { name: String },
    Upgrade { package_name: String },
    Commit,
    Sync,
    AddUser,
    AddGroup,
    DelUser,
    DelGroup,
    Ping,
    Debug,
    Download { name: String },
    Upload { name: String },
    OpenPty,
    ResizePty,
    Restart,
    Quit,
    Reboot,
    Shutdown,
    Update,
    Help,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerbError {
    #[error("empty command line")]
    Empty,
    #[error("invalid command: {0}")]
    Invalid(String),
}

impl InternalVerb {
    /// Mirrors the original's `shlex.split(command)` dispatch: `args[0]`
    /// selects the verb, the rest are its own sub-arguments.
    pub fn parse(args: &[String]) -> Result<InternalVerb, VerbError> {
        let Some(verb) = args.first().map(String::as_str) else {
            return Err(VerbError::Empty);
        };

        let arg = |i: usize| -> Result<&str, VerbError> {
            args.get(i).map(String::as_str).ok_or_else(|| VerbError::Invalid(verb.to_string()))
        };

        Ok(match verb {
            "pypackage" => match arg(1)? {
                "pip-install" => InternalVerb::PyPackage {
                    request: PackageRequest::Install,
                    source: PackageSource::Internet,
                    name: arg(2)?.to_string(),
                },
                "file-install" => InternalVerb::PyPackage {
                    request: PackageRequest::Install,
                    source: PackageSource::File,
                    name: arg(2)?.to_string(),
                },
                "uninstall" => InternalVerb::PyPackageUninstall { name: arg(2)?.to_string() },
                other => return Err(VerbError::Invalid(format!("pypackage {other}"))),
            },
            "package" => match arg(1)? {
                "install" => InternalVerb::Package {
                    request: PackageRequest::Install,
                    source: PackageSource::Internet,
                    name: arg(2)?.to_string(),
                },
                "file-install" => InternalVerb::Package {
                    request: PackageRequest::Install,
                    source: PackageSource::File,
                    name: arg(2)?.to_string(),
                },
                "uninstall" => InternalVerb::PackageUninstall { name: arg(2)?.to_string() },
                other => return Err(VerbError::Invalid(format!("package {other}"))),
            },
            "upgrade" => InternalVerb::Upgrade {
                package_name: args.get(1).cloned().unwrap_or_else(|| "alpamon".to_string()),
            },
            "commit" => InternalVerb::Commit,
            "sync" => InternalVerb::Sync,
            "adduser" => InternalVerb::AddUser,
            "addgroup" => InternalVerb::AddGroup,
            "deluser" => InternalVerb::DelUser,
            "delgroup" => InternalVerb::DelGroup,
            "ping" => InternalVerb::Ping,
            "debug" => InternalVerb::Debug,
            "download" => InternalVerb::Download { name: arg(1)?.to_string() },
            "upload" => InternalVerb::Upload { name: arg(1)?.to_string() },
            "openpty" => InternalVerb::OpenPty,
            "resizepty" => InternalVerb::ResizePty,
            "restart" => InternalVerb::Restart,
            "quit" => InternalVerb::Quit,
            "reboot" => InternalVerb::Reboot,
            "shutdown" => InternalVerb::Shutdown,
            "update" => InternalVerb::Update,
            "help" => InternalVerb::Help,
            other => return Err(VerbError::Invalid(other.to_string())),
        })
    }
}

/// Extracts a required string field from the command's `data` payload.
pub fn require_str<'a>(data: &'a Value, field: &'static str) -> Result<&'a str, VerbError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| VerbError::Invalid(format!("missing data field: {field}")))
}

/// Extracts a required integer field from the command's `data` payload.
pub fn require_i64(data: &Value, field: &'static str) -> Result<i64, VerbError> {
    data.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| VerbError::Invalid(format!("missing data field: {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ping() {
        assert_eq!(InternalVerb::parse(&["ping".to_string()]).unwrap(), InternalVerb::Ping);
    }

    #[test]
    fn parses_package_install() {
        let args = vec!["package".to_string(), "install".to_string(), "htop".to_string()];
        assert_eq!(
            InternalVerb::parse(&args).unwrap(),
            InternalVerb::Package {
                request: PackageRequest::Install,
                source: PackageSource::Internet,
                name: "htop".to_string(),
            }
        );
    }

    #[test]
    fn upgrade_defaults_to_alpamon() {
        assert_eq!(
            InternalVerb::parse(&["upgrade".to_string()]).unwrap(),
            InternalVerb::Upgrade { package_name: "alpamon".to_string() }
        );
    }

    #[test]
    fn rejects_empty_line() {
        assert_eq!(InternalVerb::parse(&[]).unwrap_err(), VerbError::Empty);
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(matches!(InternalVerb::parse(&["frobnicate".to_string()]), Err(VerbError::Invalid(_))));
    }
}
