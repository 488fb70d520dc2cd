//! Dispatches one inbound command and posts its result back to the
//! controller, mirroring the original's `CommandRunner.run`.

use crate::inventory::InventoryHandle;
use crate::record::{CommandRecord, ShellKind};
use crate::verb::{require_i64, require_str, InternalVerb, VerbError};
use alpamon_core::{fact_tool_present, PackageRequest, PackageSource, Platform, FACT_TOOL_PATH};
use alpamon_queue::{priority, Method, PriorityQueue, QueuedRequest, ReporterCounters};
use alpamon_shell::{run_shell_line_with_timeout, runcmd, tokenize, PtyRegistry, DEFAULT_TIMEOUT};
use alpamon_transport::{AgentHandle, SharedClient};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Outcome of running a command, before it is serialized into a `fin` post.
struct Outcome {
    success: bool,
    result: String,
}

impl Outcome {
    fn ok(result: impl Into<String>) -> Self {
        Self { success: true, result: result.into() }
    }

    fn err(result: impl Into<String>) -> Self {
        Self { success: false, result: result.into() }
    }
}

pub struct CommandDispatcher {
    queue: PriorityQueue,
    platform: Platform,
    pty: PtyRegistry,
    inventory: Arc<dyn InventoryHandle>,
    handle: AgentHandle,
    counters: Arc<ReporterCounters>,
    client: SharedClient,
    /// Names of commands currently executing, for the `debug` verb's task
    /// listing - mirrors the original's `list(map(lambda t: t.name,
    /// threading.enumerate()))`, scoped to dispatcher-run tasks rather than
    /// every OS thread.
    tasks: Arc<Mutex<HashSet<String>>>,
}

/// Drops a task's name from the live-task set when the command it names
/// finishes, however it finishes.
struct TaskGuard {
    tasks: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tasks.lock().expect("task registry lock poisoned").remove(&self.name);
    }
}

impl CommandDispatcher {
    pub fn new(
        queue: PriorityQueue,
        platform: Platform,
        pty: PtyRegistry,
        inventory: Arc<dyn InventoryHandle>,
        handle: AgentHandle,
        counters: Arc<ReporterCounters>,
        client: SharedClient,
    ) -> Self {
        Self { queue, platform, pty, inventory, handle, counters, client, tasks: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Runs one command end to end, then - if it carried an `id` - posts the
    /// `fin` record at priority 10.
    pub async fn run(&self, command: Value) {
        let id = command.get("id").and_then(Value::as_str).map(str::to_string);
        let started = Instant::now();

        let task_name = match &id {
            Some(id) => format!("CommandRunner-{}", id.rsplit('-').next().unwrap_or(id)),
            None => "CommandRunner".to_string(),
        };
        self.tasks.lock().expect("task registry lock poisoned").insert(task_name.clone());
        let _guard = TaskGuard { tasks: Arc::clone(&self.tasks), name: task_name };

        let outcome = match CommandRecord::try_from(command) {
            Ok(record) => self.run_record(record).await,
            Err(e) => Outcome::err(e.to_string()),
        };

        let elapsed = started.elapsed();
        if let Some(id) = id {
            let path = format!("/api/events/commands/{id}/fin/");
            let body = json!({
                "success": outcome.success,
                "result": outcome.result,
                "elapsed_time": elapsed.as_secs_f64(),
            });
            self.queue.enqueue(QueuedRequest::new(priority::COMMAND, Method::Post, path, body)).await;
        }
    }

    async fn run_record(&self, record: CommandRecord) -> Outcome {
        match record.shell {
            ShellKind::Internal => self.run_internal(&record).await,
            ShellKind::System => {
                match run_shell_line_with_timeout(&record.line, &record.username, &record.groupname, record.env.clone(), DEFAULT_TIMEOUT)
                    .await
                {
                    Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
                    Ok(o) => Outcome::err(o.output),
                    Err(e) => Outcome::err(e.to_string()),
                }
            }
            ShellKind::Osquery => self.run_osquery(&record.line).await,
        }
    }

    async fn run_osquery(&self, line: &str) -> Outcome {
        if !fact_tool_present() {
            return Outcome::err("fact-query tool not installed".to_string());
        }
        match runcmd(
            &[FACT_TOOL_PATH.to_string(), "--line".to_string(), line.to_string()],
            Some("root"),
            Some("root"),
            None,
            DEFAULT_TIMEOUT,
        )
        .await
        {
            Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
            Ok(o) => Outcome::err(o.output),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    async fn run_internal(&self, record: &CommandRecord) -> Outcome {
        let args = tokenize(&record.line);
        let verb = match InternalVerb::parse(&args) {
            Ok(v) => v,
            Err(e) => return Outcome::err(e.to_string()),
        };
        let data = record.data.clone().unwrap_or(Value::Null);

        match verb {
            InternalVerb::PyPackage { source, name, .. } => {
                let result = match source {
                    PackageSource::Internet => self.run_pypackage_pip_install(&name).await,
                    PackageSource::File => self.run_pypackage_file_install(&name, &data).await,
                };
                self.inventory.sync(vec!["pypackages".to_string()]).await;
                result
            }
            InternalVerb::PyPackageUninstall { name } => {
                let result = self.run_pypackage_uninstall(&name).await;
                self.inventory.sync(vec!["pypackages".to_string()]).await;
                result
            }
            InternalVerb::Package { request, source, name } => {
                let result = self.run_platform_command(request, source, &name).await;
                self.inventory.sync(vec!["packages".to_string()]).await;
                result
            }
            InternalVerb::PackageUninstall { name } => {
                let result = self.run_platform_command(PackageRequest::Uninstall, PackageSource::Internet, &name).await;
                self.inventory.sync(vec!["packages".to_string()]).await;
                result
            }
            InternalVerb::Upgrade { package_name } => self.run_upgrade(&package_name).await,
            InternalVerb::Commit => {
                let keys = data.get("keys").and_then(Value::as_array).map(|a| {
                    a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
                }).unwrap_or_default();
                self.inventory.commit(keys).await;
                Outcome::ok("committed system information")
            }
            InternalVerb::Sync => {
                let keys = data.get("keys").and_then(Value::as_array).map(|a| {
                    a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
                }).unwrap_or_default();
                self.inventory.sync(keys).await;
                Outcome::ok("synchronized system information")
            }
            InternalVerb::AddUser => self.run_user_group_command(&data, UserGroupOp::AddUser).await,
            InternalVerb::AddGroup => self.run_user_group_command(&data, UserGroupOp::AddGroup).await,
            InternalVerb::DelUser => self.run_user_group_command(&data, UserGroupOp::DelUser).await,
            InternalVerb::DelGroup => self.run_user_group_command(&data, UserGroupOp::DelGroup).await,
            InternalVerb::Ping => Outcome::ok(chrono::Utc::now().to_rfc3339()),
            InternalVerb::Debug => self.run_debug().await,
            InternalVerb::Download { name } => self.run_download(&name, &data).await,
            InternalVerb::Upload { name } => self.run_upload(&name, &data).await,
            InternalVerb::OpenPty => self.run_openpty(&data),
            InternalVerb::ResizePty => self.run_resizepty(&data),
            InternalVerb::Restart => {
                self.handle.restart().await;
                Outcome::ok("alpamon will restart shortly")
            }
            InternalVerb::Quit => {
                self.handle.quit().await;
                Outcome::ok("alpamon will quit shortly")
            }
            InternalVerb::Reboot => self.run_system_verb("reboot").await,
            InternalVerb::Shutdown => self.run_system_verb("shutdown").await,
            InternalVerb::Update => self.run_system_verb("update").await,
            InternalVerb::Help => Outcome::ok(HELP_TEXT),
        }
    }

    async fn run_pypackage_pip_install(&self, name: &str) -> Outcome {
        match crate::pypackage::install_from_pip(name).await {
            Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
            Ok(o) => Outcome::err(o.output),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    async fn run_pypackage_file_install(&self, name: &str, data: &Value) -> Outcome {
        let content = match fetch_file_content(data).await {
            Ok(c) => c,
            Err(e) => return Outcome::err(e),
        };
        match crate::pypackage::install_from_wheel(name, &content).await {
            Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
            Ok(o) => Outcome::err(o.output),
            Err(e) => Outcome::err(e),
        }
    }

    async fn run_pypackage_uninstall(&self, name: &str) -> Outcome {
        match crate::pypackage::uninstall(name).await {
            Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
            Ok(o) => Outcome::err(o.output),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Fetches `package_name`'s wheel from the control plane's python
    /// package index and installs it, then syncs the keys affected:
    /// `alpamon` itself also touches `server` (its own version string),
    /// any other python package only touches `pypackages`.
    async fn run_upgrade(&self, package_name: &str) -> Outcome {
        let (artifact_name, content) = match crate::pypackage::fetch_package(&self.client, package_name).await {
            Ok(pkg) => pkg,
            Err(e) => return Outcome::err(e),
        };

        let outcome = match crate::pypackage::install_from_wheel(&artifact_name, &content).await {
            Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
            Ok(o) => Outcome::err(o.output),
            Err(e) => Outcome::err(e),
        };

        let keys = if package_name == "alpamon" {
            vec!["server".to_string(), "pypackages".to_string()]
        } else {
            vec!["pypackages".to_string()]
        };
        self.inventory.sync(keys).await;
        outcome
    }

    async fn run_platform_command(&self, request: PackageRequest, source: PackageSource, name: &str) -> Outcome {
        let Some(argv) = self.platform.package_command(request, source, name) else {
            return Outcome::err(format!("no package command mapping for {:?}/{:?} on {}", request, source, self.platform));
        };
        self.run_argv(&argv, "root", "root").await
    }

    async fn run_system_verb(&self, verb: &str) -> Outcome {
        let Some(argv) = self.platform.system_command(verb) else {
            return Outcome::err(format!("{verb} is not supported on {}", self.platform));
        };
        let line = argv.join(" ");
        match run_shell_line_with_timeout(&line, "root", "root", None, DEFAULT_TIMEOUT).await {
            Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
            Ok(o) => Outcome::err(o.output),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    async fn run_argv(&self, argv: &[String], username: &str, groupname: &str) -> Outcome {
        match runcmd(argv, Some(username), Some(groupname), None, DEFAULT_TIMEOUT).await {
            Ok(o) if o.exit_code == 0 => Outcome::ok(o.output),
            Ok(o) => Outcome::err(o.output),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    async fn run_user_group_command(&self, data: &Value, op: UserGroupOp) -> Outcome {
        let argv = match self.user_group_argv(data, op) {
            Ok(argv) => argv,
            Err(e) => return Outcome::err(e.to_string()),
        };
        let result = self.run_argv(&argv, "root", "root").await;
        if result.success {
            self.inventory.sync(vec!["groups".to_string(), "users".to_string()]).await;
        }
        result
    }

    fn user_group_argv(&self, data: &Value, op: UserGroupOp) -> Result<Vec<String>, VerbError> {
        use Platform::*;
        use UserGroupOp::*;

        let s = |field| require_str(data, field).map(str::to_string);

        Ok(match (self.platform, op) {
            (Debian, AddUser) => vec![
                "/usr/sbin/adduser".to_string(),
                "--home".to_string(), s("home_directory")?,
                "--shell".to_string(), s("shell")?,
                "--uid".to_string(), require_i64(data, "uid")?.to_string(),
                "--gid".to_string(), require_i64(data, "gid")?.to_string(),
                "--gecos".to_string(), s("comment")?,
                "--disabled-password".to_string(),
                s("username")?,
            ],
            (Rhel, AddUser) => vec![
                "/usr/sbin/useradd".to_string(),
                "--home-dir".to_string(), s("home_directory")?,
                "--shell".to_string(), s("shell")?,
                "--uid".to_string(), require_i64(data, "uid")?.to_string(),
                "--gid".to_string(), require_i64(data, "gid")?.to_string(),
                "--comment".to_string(), s("comment")?,
                s("username")?,
            ],
            (Debian, AddGroup) => vec![
                "/usr/sbin/addgroup".to_string(),
                "--gid".to_string(), require_i64(data, "gid")?.to_string(),
                s("groupname")?,
            ],
            (Rhel, AddGroup) => vec![
                "/usr/sbin/groupadd".to_string(),
                "--gid".to_string(), require_i64(data, "gid")?.to_string(),
                s("groupname")?,
            ],
            (Debian, DelUser) => vec!["/usr/sbin/deluser".to_string(), s("username")?],
            (Rhel, DelUser) => vec!["/usr/sbin/userdel".to_string(), s("username")?],
            (Debian, DelGroup) => vec!["/usr/sbin/delgroup".to_string(), s("groupname")?],
            (Rhel, DelGroup) => vec!["/usr/sbin/groupdel".to_string(), s("groupname")?],
            _ => return Err(VerbError::Invalid(format!("{op:?} not supported on {}", self.platform))),
        })
    }

    async fn run_debug(&self) -> Outcome {
        let tasks: Vec<String> = self.tasks.lock().expect("task registry lock poisoned").iter().cloned().collect();
        Outcome::ok(
            json!({
                "now": chrono::Utc::now().to_rfc3339(),
                "queue": {
                    "len": self.queue.len().await,
                    "full": self.queue.is_full().await,
                    "ignored": self.queue.ignored_count(),
                },
                "tasks": tasks,
                "stats": {
                    "success": self.counters.success.load(std::sync::atomic::Ordering::Relaxed),
                    "failure": self.counters.failure.load(std::sync::atomic::Ordering::Relaxed),
                    "ignored": self.counters.ignored.load(std::sync::atomic::Ordering::Relaxed),
                    "delay_millis": self.counters.delay_millis().await,
                    "latency_millis": self.counters.latency_millis().await,
                },
            })
            .to_string(),
        )
    }

    async fn run_download(&self, path: &str, data: &Value) -> Outcome {
        let username = require_str(data, "username").unwrap_or("root");
        let groupname = require_str(data, "groupname").unwrap_or(username);
        let content = match fetch_file_content(data).await {
            Ok(c) => c,
            Err(e) => return Outcome::err(e),
        };
        match crate::transfer::write_as(path, &content, username, groupname).await {
            Ok(()) => Outcome::ok(format!("successfully downloaded {path}")),
            Err(e) => Outcome::err(e),
        }
    }

    async fn run_upload(&self, path: &str, data: &Value) -> Outcome {
        let username = require_str(data, "username").unwrap_or("root");
        let groupname = require_str(data, "groupname").unwrap_or(username);
        let destination = match require_str(data, "content") {
            Ok(url) => url,
            Err(e) => return Outcome::err(e.to_string()),
        };
        match crate::transfer::upload_as(path, destination, username, groupname).await {
            Ok(()) => Outcome::ok(format!("successfully uploaded {path}")),
            Err(e) => Outcome::err(e),
        }
    }

    fn run_openpty(&self, data: &Value) -> Outcome {
        let session_id = match require_str(data, "session_id") {
            Ok(s) => s,
            Err(e) => return Outcome::err(e.to_string()),
        };
        let username = require_str(data, "username").unwrap_or("root");
        let groupname = require_str(data, "groupname").unwrap_or(username);
        let rows = require_i64(data, "rows").unwrap_or(24) as u16;
        let cols = require_i64(data, "cols").unwrap_or(80) as u16;

        match self.pty.open(session_id, username, groupname, rows, cols) {
            Ok(_) => Outcome::ok("spawned a pty terminal"),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    fn run_resizepty(&self, data: &Value) -> Outcome {
        let session_id = match require_str(data, "session_id") {
            Ok(s) => s,
            Err(e) => return Outcome::err(e.to_string()),
        };
        let rows = require_i64(data, "rows").unwrap_or(24) as u16;
        let cols = require_i64(data, "cols").unwrap_or(80) as u16;
        match self.pty.resize(session_id, rows, cols) {
            Ok(()) => Outcome::ok(format!("resized pty terminal to {cols}x{rows}")),
            Err(e) => Outcome::err(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum UserGroupOp {
    AddUser,
    AddGroup,
    DelUser,
    DelGroup,
}

async fn fetch_file_content(data: &Value) -> Result<Vec<u8>, String> {
    let ty = require_str(data, "type").map_err(|e| e.to_string())?;
    let content = require_str(data, "content").map_err(|e| e.to_string())?;
    match ty {
        "text" => Ok(content.as_bytes().to_vec()),
        "base64" => STANDARD.decode(content).map_err(|e| e.to_string()),
        "url" => reqwest::get(content)
            .await
            .map_err(|e| e.to_string())?
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| e.to_string()),
        other => Err(format!("unknown file type: {other}")),
    }
}

const HELP_TEXT: &str = "Available commands:\n\n\
pypackage pip-install <package name>: install a python package from pip\n\
pypackage uninstall <package name>: remove a python package\n\
package install <package name>: install a system package\n\
package uninstall <package name>: remove a system package\n\
upgrade: upgrade alpamon\n\
restart: restart alpamon\n\
quit: stop alpamon\n\
update: update system\n\
reboot: reboot system\n\
shutdown: shutdown system\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::NoopInventory;

    fn test_dispatcher() -> CommandDispatcher {
        let settings = alpamon_core::Settings {
            server_url: "https://alpacon.example.com".to_string(),
            backhaul_url: String::new(),
            credential_id: "id".to_string(),
            credential_key: "key".to_string(),
            tls: alpamon_core::TlsPolicy { verify: true, ca_cert: None },
            debug: false,
            http_workers: 4,
        };
        let client = Arc::new(alpamon_transport::AuthenticatedClient::new(&settings).unwrap());
        let (handle, _rx) = AgentHandle::channel(4);
        CommandDispatcher::new(
            PriorityQueue::new(),
            Platform::Debian,
            PtyRegistry::new(),
            Arc::new(NoopInventory),
            handle,
            Arc::new(ReporterCounters::default()),
            client,
        )
    }

    #[test]
    fn base64_decodes_known_value() {
        assert_eq!(STANDARD.decode("aGVsbG8=").unwrap(), b"hello");
    }

    #[tokio::test]
    async fn pypackage_verb_invokes_pip_rather_than_the_old_unsupported_stub() {
        let dispatcher = test_dispatcher();
        let record = CommandRecord::try_from(json!({
            "shell": "internal",
            "line": "pypackage uninstall definitely-not-a-real-package",
        }))
        .unwrap();
        let outcome = dispatcher.run_record(record).await;
        assert!(!outcome.result.contains("not supported on this build"));
    }

    #[tokio::test]
    async fn upgrade_verb_invokes_package_lookup_rather_than_the_old_unsupported_stub() {
        let dispatcher = test_dispatcher();
        let record = CommandRecord::try_from(json!({
            "shell": "internal",
            "line": "upgrade",
        }))
        .unwrap();
        let outcome = dispatcher.run_record(record).await;
        assert!(!outcome.result.contains("not supported on this build"));
    }

    #[tokio::test]
    async fn debug_reports_queue_full_flag_and_live_task_names() {
        let dispatcher = test_dispatcher();
        let record = CommandRecord::try_from(json!({"shell": "internal", "line": "debug"})).unwrap();
        let outcome = dispatcher.run_record(record).await;
        let parsed: Value = serde_json::from_str(&outcome.result).unwrap();
        assert_eq!(parsed["queue"]["full"], false);
        assert!(parsed.get("tasks").and_then(Value::as_array).is_some());
    }

    #[tokio::test]
    async fn running_a_command_registers_and_then_clears_its_task_name() {
        let dispatcher = test_dispatcher();
        dispatcher.run(json!({"id": "cmd-42", "shell": "internal", "line": "ping"})).await;
        assert!(dispatcher.tasks.lock().unwrap().is_empty());
    }
}
