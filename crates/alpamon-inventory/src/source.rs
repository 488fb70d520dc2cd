//! Fact sources: `query(sql, format) →
//! (exitcode, rows|text)` abstracted behind a trait object so the real
//! fact-query tool and an in-process fallback share one interface and the
//! reconciler never branches on which one answered a given key.

use crate::model::FactKey;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FactSourceError {
    #[error("fact-query tool exited {exit_code}: {output}")]
    ToolFailed { exit_code: i32, output: String },

    #[error("fact-query tool output was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no fact source on this host can answer {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Shell(#[from] alpamon_shell::ShellError),
}

/// A source of inventory facts for one or more logical keys.
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Whether this source can answer `key` at all (not whether it would
    /// succeed right now).
    fn supports(&self, key: FactKey) -> bool;

    /// Runs the key's query and returns its rows, always as a list even
    /// for singleton keys — the caller takes the first row when `multirow`
    /// is false.
    async fn collect(&self, key: FactKey, platform: alpamon_core::Platform) -> Result<Vec<Value>, FactSourceError>;
}

/// Runs queries against the real fact-query tool binary (`osqueryi`),
/// grounded in `queryman.py`'s `query()`.
pub struct OsqueryFactSource;

#[async_trait]
impl FactSource for OsqueryFactSource {
    fn supports(&self, key: FactKey) -> bool {
        !matches!(key, FactKey::PyPackages) && alpamon_core::fact_tool_present()
    }

    async fn collect(&self, key: FactKey, platform: alpamon_core::Platform) -> Result<Vec<Value>, FactSourceError> {
        let sql = match key {
            FactKey::Packages => crate::model::packages_sql(platform).ok_or(FactSourceError::Unsupported("packages"))?,
            FactKey::PyPackages => return Err(FactSourceError::Unsupported("pypackages")),
            FactKey::Server => return Err(FactSourceError::Unsupported("server")),
            other => other.def().sql.ok_or(FactSourceError::Unsupported(other.as_str()))?,
        };
        self.query(sql).await
    }
}

impl OsqueryFactSource {
    /// Runs one SQL query and parses its JSON output, matching
    /// `queryman.py::query`'s `--json` branch.
    pub async fn query(&self, sql: &str) -> Result<Vec<Value>, FactSourceError> {
        let args = vec![
            alpamon_core::FACT_TOOL_PATH.to_string(),
            "--json".to_string(),
            sql.to_string(),
        ];
        let outcome = alpamon_shell::runcmd(&args, None, None, None, Duration::from_secs(30)).await?;
        if outcome.exit_code != 0 {
            return Err(FactSourceError::ToolFailed { exit_code: outcome.exit_code, output: outcome.output });
        }
        if outcome.output.trim_start().starts_with("Error:") {
            return Err(FactSourceError::ToolFailed { exit_code: -1, output: outcome.output });
        }
        Ok(serde_json::from_str(&outcome.output)?)
    }
}

/// Falls back to `sysinfo` for `os`/`time`/`info` when the fact-query tool
/// is absent — an in-process source that never shells out, so the startup
/// sequence's "fact tool not yet installed" window still produces a
/// snapshot for the keys that don't strictly need it.
pub struct SysinfoFactSource;

#[async_trait]
impl FactSource for SysinfoFactSource {
    fn supports(&self, key: FactKey) -> bool {
        matches!(key, FactKey::Os | FactKey::Time | FactKey::Info)
    }

    async fn collect(&self, key: FactKey, _platform: alpamon_core::Platform) -> Result<Vec<Value>, FactSourceError> {
        let mut system = sysinfo::System::new();
        system.refresh_all();

        let row = match key {
            FactKey::Os => serde_json::json!({
                "name": sysinfo::System::name().unwrap_or_default(),
                "version": sysinfo::System::os_version().unwrap_or_default(),
                "major": 0,
                "minor": 0,
                "patch": 0,
                "build": sysinfo::System::kernel_version().unwrap_or_default(),
                "platform": std::env::consts::OS,
                "platform_like": std::env::consts::OS,
            }),
            FactKey::Time => serde_json::json!({
                "datetime": chrono::Utc::now().to_rfc3339(),
                "timezone": "UTC",
                "uptime": sysinfo::System::uptime(),
            }),
            FactKey::Info => serde_json::json!({
                "uuid": uuid::Uuid::new_v4().to_string(),
                "cpu_type": "",
                "cpu_subtype": "",
                "cpu_brand": system.cpus().first().map(|c| c.brand().to_string()).unwrap_or_default(),
                "cpu_physical_cores": sysinfo::System::physical_core_count().unwrap_or(0),
                "cpu_logical_cores": system.cpus().len(),
                "physical_memory": system.total_memory(),
                "hardware_vendor": "",
                "hardware_model": "",
                "hardware_version": "",
                "hardware_serial": "",
                "computer_name": sysinfo::System::host_name().unwrap_or_default(),
                "hostname": sysinfo::System::host_name().unwrap_or_default(),
                "local_hostname": sysinfo::System::host_name().unwrap_or_default(),
            }),
            other => return Err(FactSourceError::Unsupported(other.as_str())),
        };
        Ok(vec![row])
    }
}

/// Lists installed Python packages via `pip3 list --format json`, grounded
/// in `packager/python.py`'s `PythonPackageManager.list_packages`.
pub struct PipFactSource;

#[async_trait]
impl FactSource for PipFactSource {
    fn supports(&self, key: FactKey) -> bool {
        matches!(key, FactKey::PyPackages)
    }

    async fn collect(&self, key: FactKey, _platform: alpamon_core::Platform) -> Result<Vec<Value>, FactSourceError> {
        if !matches!(key, FactKey::PyPackages) {
            return Err(FactSourceError::Unsupported(key.as_str()));
        }

        let outcome = alpamon_shell::runcmd(
            &[
                "pip3".to_string(),
                "list".to_string(),
                "--format".to_string(),
                "json".to_string(),
                "--disable-pip-version-check".to_string(),
            ],
            None,
            None,
            None,
            Duration::from_secs(30),
        )
        .await?;

        if outcome.exit_code != 0 || outcome.output.trim_start().starts_with("Error:") {
            // pip3 missing or broken on this host: no python packages to report,
            // matching the original's `list_packages` returning `None` on failure.
            return Ok(Vec::new());
        }

        let raw: Vec<Value> = serde_json::from_str(&outcome.output)?;
        let mut seen = std::collections::HashSet::new();
        let mut rows = Vec::new();
        for pkg in raw {
            let (Some(name), Some(version)) = (pkg.get("name").and_then(Value::as_str), pkg.get("version").and_then(Value::as_str)) else {
                continue;
            };
            if seen.insert((name.to_string(), version.to_string())) {
                rows.push(serde_json::json!({ "name": name, "version": version }));
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sysinfo_source_supports_only_os_time_info() {
        let source = SysinfoFactSource;
        assert!(source.supports(FactKey::Os));
        assert!(source.supports(FactKey::Time));
        assert!(source.supports(FactKey::Info));
        assert!(!source.supports(FactKey::Users));
    }

    #[tokio::test]
    async fn sysinfo_source_collects_a_time_row() {
        let source = SysinfoFactSource;
        let rows = source.collect(FactKey::Time, alpamon_core::Platform::Debian).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("uptime").is_some());
    }

    #[test]
    fn pip_source_supports_only_pypackages() {
        let source = PipFactSource;
        assert!(source.supports(FactKey::PyPackages));
        assert!(!source.supports(FactKey::Packages));
        assert!(!source.supports(FactKey::Os));
    }
}
