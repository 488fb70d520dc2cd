//! Python package management (`pypackage`/`upgrade` internal verbs),
//! grounded in `packager/python.py`'s `PythonPackageManager` and
//! `packager/utils.py`'s `get_python_package`: shell out to `pip3` for
//! install/uninstall, and for a self-upgrade, fetch the named artifact from
//! the control plane's python package index before installing it the same
//! way.

use alpamon_shell::{runcmd, CommandOutcome, ShellError, DEFAULT_TIMEOUT};
use alpamon_transport::SharedClient;
use std::time::Duration;

const PIP: &str = "pip3";

/// Installs (or upgrades) `name` from the configured pip index.
pub async fn install_from_pip(name: &str) -> Result<CommandOutcome, ShellError> {
    runcmd(
        &[PIP.to_string(), "install".to_string(), "-U".to_string(), name.to_string()],
        Some("root"),
        Some("root"),
        None,
        DEFAULT_TIMEOUT,
    )
    .await
}

/// Writes `content` to `name` as a wheel file, installs it with `pip3`, then
/// removes the file regardless of outcome, matching the original's
/// write-then-always-clean-up shape.
pub async fn install_from_wheel(name: &str, content: &[u8]) -> Result<CommandOutcome, String> {
    tokio::fs::write(name, content)
        .await
        .map_err(|e| format!("failed to write {name}: {e}"))?;

    let result = runcmd(
        &[PIP.to_string(), "install".to_string(), "-U".to_string(), name.to_string()],
        Some("root"),
        Some("root"),
        None,
        DEFAULT_TIMEOUT,
    )
    .await;
    let _ = tokio::fs::remove_file(name).await;
    result.map_err(|e| e.to_string())
}

pub async fn uninstall(name: &str) -> Result<CommandOutcome, ShellError> {
    runcmd(
        &[PIP.to_string(), "uninstall".to_string(), "-y".to_string(), name.to_string()],
        Some("root"),
        Some("root"),
        None,
        DEFAULT_TIMEOUT,
    )
    .await
}

/// Looks up `name` in the control plane's python package index and
/// downloads its artifact, returning the artifact's own name (which may
/// differ from the query name) and bytes.
pub async fn fetch_package(client: &SharedClient, name: &str) -> Result<(String, Vec<u8>), String> {
    let entries_path = format!("/api/packages/python/entries/?package__name={name}&target=py3");
    let response = client
        .request(reqwest::Method::GET, &entries_path, None, Duration::from_secs(5))
        .await
        .map_err(|e| e.to_string())?;

    if !response.is_success() {
        return Err(format!("server responded {}", response.status));
    }

    let entry = response
        .body
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| format!("package not found: ({name}, py3)"))?;

    let artifact_name = entry
        .get("name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| "package entry missing name".to_string())?
        .to_string();
    let download_url = entry
        .get("download_url")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| "package entry missing download_url".to_string())?;

    let bytes = client
        .download(download_url, Duration::from_secs(600))
        .await
        .map_err(|e| e.to_string())?;

    Ok((artifact_name, bytes.to_vec()))
}
