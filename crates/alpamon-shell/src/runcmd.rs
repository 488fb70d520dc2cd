//! `runcmd`: spawns one command, optionally dropping privileges to a
//! named user/group first, with a bounded timeout.

use crate::error::ShellError;
use alpamon_timelimiter::{TimeLimiterError, TimeLimiterLayer};
use nix::unistd::{initgroups, setresgid, setresuid, Gid, Uid, User};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tower::{service_fn, Layer, Service, ServiceExt};

/// Default wall-clock budget for a single command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Exit code and combined stdout+stderr of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub output: String,
}

/// Looks up `username`/`groupname` and resolves the uid/gid/supplementary
/// groups needed to demote a child process before exec, matching the
/// original's `demote()`: root stays root, everyone else drops to the
/// target identity.
fn resolve_identity(username: &str, groupname: &str) -> Result<(Uid, Gid), ShellError> {
    let user = User::from_name(username)
        .map_err(|e| ShellError::PrivilegeDrop(e.to_string()))?
        .ok_or_else(|| ShellError::UnknownUser(username.to_string()))?;
    let group = nix::unistd::Group::from_name(groupname)
        .map_err(|e| ShellError::PrivilegeDrop(e.to_string()))?
        .ok_or_else(|| ShellError::UnknownGroup(groupname.to_string()))?;
    Ok((user.uid, group.gid))
}

/// Runs `args[0]` with `args[1..]`, dropping privileges to `username`/
/// `groupname` first unless `username` is `"root"` ("root stays
/// root; any other identity is applied with `setresgid`/`setresuid`/
/// `initgroups` before `execve`").
pub async fn runcmd(
    args: &[String],
    username: Option<&str>,
    groupname: Option<&str>,
    env: Option<HashMap<String, String>>,
    timeout: Duration,
) -> Result<CommandOutcome, ShellError> {
    if args.is_empty() {
        return Ok(CommandOutcome { exit_code: 0, output: String::new() });
    }

    let mut command = Command::new(&args[0]);
    command.args(&args[1..]).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    if let Some(env) = env {
        command.envs(env);
    }

    if let (Some(user), Some(group)) = (username, groupname) {
        if user != "root" {
            let (uid, gid) = resolve_identity(user, group)?;
            let user_cstr = CString::new(user).map_err(|e| ShellError::PrivilegeDrop(e.to_string()))?;
            // Safety: pre_exec runs in the forked child before exec, single-threaded
            // and async-signal-safe: only libc syscalls, no allocation beyond what
            // nix's safe wrappers already perform.
            unsafe {
                command.pre_exec(move || {
                    initgroups(&user_cstr, gid).map_err(std::io::Error::from)?;
                    setresgid(gid, gid, gid).map_err(std::io::Error::from)?;
                    setresuid(uid, uid, uid).map_err(std::io::Error::from)?;
                    Ok(())
                });
            }
        }
    }

    let limiter = TimeLimiterLayer::<()>::builder().timeout_duration(timeout).build();
    let mut child = Some(command);
    let mut limited = limiter.layer(service_fn(move |_: ()| {
        let mut command = child.take().expect("service called once");
        async move { command.output().await }
    }));

    let output = limited.ready().await.unwrap().call(()).await;

    match output {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            let exit_code = output.status.code().unwrap_or_else(|| output.status.signal().unwrap_or(-1));
            Ok(CommandOutcome { exit_code, output: combined })
        }
        Err(TimeLimiterError::Timeout) => Err(ShellError::Timeout),
        Err(TimeLimiterError::Inner(e)) => Err(ShellError::Spawn(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_argument_back_as_root() {
        let outcome = runcmd(
            &["/bin/echo".to_string(), "hi".to_string()],
            Some("root"),
            Some("root"),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.output.trim(), "hi");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_errored() {
        let outcome = runcmd(
            &["/bin/false".to_string()],
            Some("root"),
            Some("root"),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_ne!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let result = runcmd(
            &["/bin/sleep".to_string(), "5".to_string()],
            Some("root"),
            Some("root"),
            None,
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(result, Err(ShellError::Timeout)));
    }
}
