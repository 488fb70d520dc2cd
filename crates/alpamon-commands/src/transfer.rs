//! File download/upload (the `download`/`upload` internal verbs), grounded
//! in the original's `run_filedown_bg`/`run_fileupload_bg`: a forked child drops
//! privileges to the requested identity before touching the filesystem, so
//! the write/read happens with the target user's permissions rather than
//! the agent's own (usually root).

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};
use std::io::Write;

async fn drop_privileges_and<F>(username: &str, groupname: &str, op: F) -> Result<(), String>
where
    F: FnOnce() -> std::io::Result<()> + Send + 'static,
{
    let username = username.to_string();
    let groupname = groupname.to_string();
    tokio::task::spawn_blocking(move || fork_and_run(&username, &groupname, op))
        .await
        .map_err(|e| e.to_string())?
}

fn fork_and_run<F>(username: &str, groupname: &str, op: F) -> Result<(), String>
where
    F: FnOnce() -> std::io::Result<()>,
{
    // Safety: the forked child only calls privilege-drop syscalls and the
    // caller-supplied closure before exiting; it never returns to the
    // parent's call stack.
    match unsafe { fork() }.map_err(|e| e.to_string())? {
        ForkResult::Child => {
            if nix::unistd::getuid().is_root() && username != "root" {
                if let (Ok(Some(user)), Ok(Some(group))) =
                    (nix::unistd::User::from_name(username), nix::unistd::Group::from_name(groupname))
                {
                    let _ = nix::unistd::setgid(group.gid);
                    let _ = nix::unistd::setuid(user.uid);
                }
            }
            let code = if op().is_ok() { 0 } else { 1 };
            std::process::exit(code);
        }
        ForkResult::Parent { child } => match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, 0)) => Ok(()),
            Ok(_) => Err("child process failed".to_string()),
            Err(e) => Err(e.to_string()),
        },
    }
}

/// Writes `content` to `path` as `username`/`groupname`.
pub async fn write_as(path: &str, content: &[u8], username: &str, groupname: &str) -> Result<(), String> {
    let path = path.to_string();
    let content = content.to_vec();
    drop_privileges_and(username, groupname, move || {
        let mut file = std::fs::File::create(&path)?;
        file.write_all(&content)
    })
    .await
}

/// Reads `path` as `username`/`groupname` and posts it to `destination`.
pub async fn upload_as(path: &str, destination: &str, username: &str, groupname: &str) -> Result<(), String> {
    let source = path.to_string();
    let content = read_as(&source, username, groupname).await?;

    let client = reqwest::Client::new();
    let form =
        reqwest::multipart::Form::new().part("content", reqwest::multipart::Part::bytes(content).file_name(source));
    client
        .post(destination)
        .multipart(form)
        .timeout(std::time::Duration::from_secs(600))
        .send()
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Reads `path`'s contents as `username`/`groupname`, piping the bytes back
/// from the privilege-dropped child to the parent.
async fn read_as(path: &str, username: &str, groupname: &str) -> Result<Vec<u8>, String> {
    let username = username.to_string();
    let groupname = groupname.to_string();
    let path = path.to_string();
    tokio::task::spawn_blocking(move || fork_and_read(&path, &username, &groupname))
        .await
        .map_err(|e| e.to_string())?
}

fn fork_and_read(path: &str, username: &str, groupname: &str) -> Result<Vec<u8>, String> {
    use std::io::Read;
    use std::os::fd::{FromRawFd, IntoRawFd};

    let (read_fd, write_fd) = nix::unistd::pipe().map_err(|e| e.to_string())?;

    // Safety: same as `fork_and_run` - the child only drops privileges,
    // writes to the pipe, and exits.
    match unsafe { fork() }.map_err(|e| e.to_string())? {
        ForkResult::Child => {
            drop(read_fd);
            if nix::unistd::getuid().is_root() && username != "root" {
                if let (Ok(Some(user)), Ok(Some(group))) =
                    (nix::unistd::User::from_name(username), nix::unistd::Group::from_name(groupname))
                {
                    let _ = nix::unistd::setgid(group.gid);
                    let _ = nix::unistd::setuid(user.uid);
                }
            }
            let code = match std::fs::read(path) {
                Ok(bytes) => {
                    let mut file = unsafe { std::fs::File::from_raw_fd(write_fd.into_raw_fd()) };
                    if file.write_all(&bytes).is_ok() {
                        0
                    } else {
                        1
                    }
                }
                Err(_) => 1,
            };
            std::process::exit(code);
        }
        ForkResult::Parent { child } => {
            drop(write_fd);
            let mut file = unsafe { std::fs::File::from_raw_fd(read_fd.into_raw_fd()) };
            let mut buf = Vec::new();
            let _ = file.read_to_end(&mut buf);
            match waitpid(child, None) {
                Ok(WaitStatus::Exited(_, 0)) => Ok(buf),
                Ok(_) => Err("child process failed".to_string()),
                Err(e) => Err(e.to_string()),
            }
        }
    }
}
