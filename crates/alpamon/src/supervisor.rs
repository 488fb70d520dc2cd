//! The supervisor's startup sequence and main loop (component I).
//!
//! This is the composition root: the only place in the crate that
//! constructs every component and wires them together, mirroring the
//! original's `main()` in shape (probe, start reporters, post `started`,
//! start the log server, install the fact tool if missing, commit or sync,
//! enter the reconnect loop) if not in language.

use crate::handlers::{AgentHandlers, InventoryAdapter};
use crate::pidfile::PidFile;
use alpamon_core::{fact_tool_present, AgentError, PackageRequest, PackageSource, Platform, Settings};
use alpamon_healthcheck::{await_commissioned, ProbeOutcome};
use alpamon_inventory::Reconciler;
use alpamon_logsink::{LogServer, DEFAULT_LOG_PORT};
use alpamon_queue::{priority, Method, PriorityQueue, QueuedRequest, ReporterPool};
use alpamon_shell::{runcmd, PtyRegistry, DEFAULT_TIMEOUT};
use alpamon_transport::{AgentHandle, AuthenticatedClient, ControlChannelClient, SupervisorSignal};
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Runs the agent until a `Quit` or `Restart` signal is observed, returning
/// whether the process should re-exec itself with the original argv: on
/// `restart_requested` it re-execs, otherwise it terminates immediately.
pub async fn run() -> Result<bool, AgentError> {
    let settings = Settings::load()?;

    tracing::info!(server = %settings.server_url, "loaded configuration");

    let _pidfile = PidFile::acquire().map_err(|e| AgentError::Config(e.to_string()))?;

    let platform = Platform::detect()?;
    let client = Arc::new(AuthenticatedClient::new(&settings)?);
    let queue = PriorityQueue::new();
    let (handle, mut signals) = AgentHandle::channel(16);

    let commissioned = probe_until_commissioned(&client, &settings).await;

    let pool = Arc::new(ReporterPool::new(queue.clone(), client.clone()));
    let reporter_handles = pool.spawn(settings.http_workers);

    announce_started(&queue).await;

    let log_server = LogServer::bind(
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_LOG_PORT),
        queue.clone(),
        Handle::current(),
    )
    .await
    .map_err(|e| AgentError::Transport(e.to_string()))?;

    if !fact_tool_present() {
        if let Err(e) = install_fact_tool(&client, &platform).await {
            tracing::error!(error = %e, "failed to install fact-query tool");
        }
    }

    let reconciler = Arc::new(Reconciler::new(queue.clone(), client.clone(), platform));
    if commissioned {
        reconciler.commit(Vec::new()).await;
    } else {
        reconciler.sync(Vec::new()).await;
    }

    let inventory = Arc::new(InventoryAdapter(Arc::clone(&reconciler)));
    let dispatcher = Arc::new(alpamon_commands::CommandDispatcher::new(
        queue.clone(),
        platform,
        PtyRegistry::new(),
        inventory,
        handle.clone(),
        pool.counters(),
        client.clone(),
    ));

    let control_handlers = AgentHandlers {
        dispatcher,
        reconciler,
        executor: Handle::current(),
    };
    let control = Arc::new(ControlChannelClient::new(
        settings.clone(),
        queue.clone(),
        control_handlers,
        handle.clone(),
    ));

    let control_loop = control.clone();
    let control_task = tokio::spawn(async move { control_loop.run().await });

    let restart_requested = wait_for_shutdown(&mut signals).await;

    log_server.quit();
    control_task.abort();
    for h in reporter_handles {
        h.abort();
    }

    Ok(restart_requested)
}

/// Probe with bounded exponential backoff until 200, capturing
/// `commissioned`.
async fn probe_until_commissioned(client: &Arc<AuthenticatedClient>, settings: &Settings) -> bool {
    let timeout = settings.http_timeout();
    await_commissioned(move || {
        let client = Arc::clone(client);
        async move {
            match client
                .request(reqwest::Method::GET, "/api/servers/servers/-/", None, timeout)
                .await
            {
                Ok(response) if response.is_success() => {
                    let commissioned = response
                        .body
                        .get("commissioned")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(false);
                    ProbeOutcome::Ready { commissioned }
                }
                _ => ProbeOutcome::NotReady,
            }
        }
    })
    .await
}

/// `{reporter: "alpamon", record: "started", description:...}`
/// at priority 10.
async fn announce_started(queue: &PriorityQueue) {
    let body = json!({
        "reporter": "alpamon",
        "record": "started",
        "description": format!("alpamon {} started", env!("CARGO_PKG_VERSION")),
    });
    let request = QueuedRequest::new(priority::COMMAND, Method::Post, "/api/events/events/", body);
    queue.enqueue(request).await;
}

/// Fetches the platform's fact-query tool package from the
/// control plane's package index and installs it, grounded in the
/// original's `install_osquery`.
async fn install_fact_tool(client: &AuthenticatedClient, platform: &Platform) -> Result<(), AgentError> {
    let arch = arch_for(*platform);
    let entries_path = format!(
        "/api/packages/system/entries/?package__name=osquery&platform={platform}&arch={arch}",
    );
    let response = client
        .request(reqwest::Method::GET, &entries_path, None, Duration::from_secs(30))
        .await?;

    let entry = response
        .body
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| AgentError::Application("no osquery package available for this platform".into()))?;

    let download_url = entry
        .get("download_url")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| AgentError::Application("package entry missing download_url".into()))?;

    let bytes = client.download(download_url, Duration::from_secs(300)).await?;

    let tmp_path = std::env::temp_dir().join("alpamon-osquery-pkg");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| AgentError::Application(format!("writing package to {}: {e}", tmp_path.display())))?;

    let argv = platform
        .package_command(PackageRequest::Install, PackageSource::File, &tmp_path.to_string_lossy())
        .ok_or(AgentError::UnsupportedPlatform)?;

    let outcome = runcmd(&argv, None, None, None, DEFAULT_TIMEOUT)
        .await
        .map_err(|e| AgentError::Application(e.to_string()))?;

    let _ = tokio::fs::remove_file(&tmp_path).await;

    if outcome.exit_code != 0 {
        return Err(AgentError::Application(format!(
            "fact-tool install exited {}: {}",
            outcome.exit_code, outcome.output
        )));
    }
    Ok(())
}

/// Maps `uname -m` to the package index's architecture vocabulary, per the
/// original's `get_system_package`: `x86_64` is `amd64` on Debian-family
/// hosts, `aarch64` is always `arm64`.
fn arch_for(platform: Platform) -> String {
    let machine = std::env::consts::ARCH;
    match (platform, machine) {
        (Platform::Debian, "x86_64") => "amd64".to_string(),
        (_, "aarch64") => "arm64".to_string(),
        (_, other) => other.to_string(),
    }
}

/// Blocks until a signal that ends the process arrives, returning whether a
/// restart (vs. a plain quit) was requested. `Reconnect` and `SendHello`
/// have no `InternalVerb` routed to them yet — `AgentHandle` reserves
/// both for the control channel's own use, which currently handles its
/// `reconnect` query directly by closing the session rather than through
/// this channel); they are logged and otherwise ignored here.
async fn wait_for_shutdown(signals: &mut tokio::sync::mpsc::Receiver<SupervisorSignal>) -> bool {
    loop {
        match signals.recv().await {
            Some(SupervisorSignal::Quit) => return false,
            Some(SupervisorSignal::Restart) => return true,
            Some(SupervisorSignal::Reconnect) | Some(SupervisorSignal::SendHello) => {
                tracing::debug!("signal has no supervisor-level handler yet, ignoring");
                continue;
            }
            None => return false,
        }
    }
}
