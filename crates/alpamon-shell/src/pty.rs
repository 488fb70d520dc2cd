//! PTY bridge (component F): one forked child per open terminal
//! session, registered by session id, with resize and teardown.
//!
//! Grounded in the original's `PtyClient`: `forkpty()`, drop privileges in
//! the child, `execve` an interactive shell, and let the parent bridge the
//! master fd to whatever transport carries the session's bytes. Framing
//! and transport live in the caller; this module only owns the fd and the
//! child's lifecycle.

use crate::error::ShellError;
use nix::libc::{self, winsize, TIOCSWINSZ};
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{initgroups, setresgid, setresuid, Pid, User};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use tokio::io::unix::AsyncFd;

/// A single open terminal: the child's pid and its master side fd.
pub struct PtySession {
    pid: Pid,
    master: Arc<AsyncFd<OwnedFd>>,
}

impl PtySession {
    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Reads whatever the shell has written since the last read.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, ShellError> {
        loop {
            let mut guard = self.master.readable().await.map_err(|e| ShellError::Pty(e.to_string()))?;
            match guard.try_io(|inner| nix::unistd::read(inner.get_ref().as_raw_fd(), buf).map_err(std::io::Error::from)) {
                Ok(result) => return result.map_err(|e| ShellError::Pty(e.to_string())),
                Err(_would_block) => continue,
            }
        }
    }

    /// Writes client keystrokes/input to the shell.
    pub async fn write(&self, data: &[u8]) -> Result<(), ShellError> {
        loop {
            let mut guard = self.master.writable().await.map_err(|e| ShellError::Pty(e.to_string()))?;
            match guard.try_io(|inner| nix::unistd::write(inner.get_ref(), data).map_err(std::io::Error::from)) {
                Ok(result) => {
                    result.map_err(|e| ShellError::Pty(e.to_string()))?;
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Applies a new terminal size via `TIOCSWINSZ`. nix has no safe
    /// wrapper for this ioctl, so it goes through `libc` directly.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ShellError> {
        let ws = winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let ret = unsafe { libc::ioctl(self.master_fd(), TIOCSWINSZ, &ws) };
        if ret != 0 {
            return Err(ShellError::Pty(std::io::Error::last_os_error().to_string()));
        }
        Ok(())
    }

    fn kill(&self) {
        let _ = kill(self.pid, Signal::SIGKILL);
    }
}

/// Registry of open terminal sessions, keyed by the session id the control
/// plane assigned when it requested `openpty`.
#[derive(Clone, Default)]
pub struct PtyRegistry {
    sessions: Arc<Mutex<HashMap<String, Arc<PtySession>>>>,
}

impl PtyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forks a child running `command` (default `/bin/bash -i`) under
    /// `username`/`groupname`'s identity, with the given initial size, and
    /// registers it under `session_id`.
    pub fn open(
        &self,
        session_id: &str,
        username: &str,
        groupname: &str,
        rows: u16,
        cols: u16,
    ) -> Result<Arc<PtySession>, ShellError> {
        let ids: Option<(nix::unistd::Uid, nix::unistd::Gid)> = if username != "root" {
            let user = User::from_name(username)
                .map_err(|e| ShellError::PrivilegeDrop(e.to_string()))?
                .ok_or_else(|| ShellError::UnknownUser(username.to_string()))?;
            let group = nix::unistd::Group::from_name(groupname)
                .map_err(|e| ShellError::PrivilegeDrop(e.to_string()))?
                .ok_or_else(|| ShellError::UnknownGroup(groupname.to_string()))?;
            Some((user.uid, group.gid))
        } else {
            None
        };

        let winsize = Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // Safety: forkpty's child runs only the async-signal-safe operations
        // below before execve - no allocation, no locking, no tokio calls.
        let result = unsafe { forkpty(Some(&winsize), None) }.map_err(|e| ShellError::Pty(e.to_string()))?;

        match result {
            ForkptyResult::Parent { child, master } => {
                let master = Arc::new(AsyncFd::new(master).map_err(|e| ShellError::Pty(e.to_string()))?);
                let session = Arc::new(PtySession { pid: child, master });
                self.sessions
                    .lock()
                    .expect("pty registry lock poisoned")
                    .insert(session_id.to_string(), Arc::clone(&session));
                Ok(session)
            }
            ForkptyResult::Child => {
                if let Some((uid, gid)) = ids {
                    let user_cstr = CString::new(username).unwrap_or_else(|_| CString::new("").unwrap());
                    let _ = initgroups(&user_cstr, gid);
                    let _ = setresgid(gid, gid, gid);
                    let _ = setresuid(uid, uid, uid);
                }
                let shell = CString::new("/bin/bash").unwrap();
                let args = [CString::new("/bin/bash").unwrap(), CString::new("-i").unwrap()];
                let _ = nix::unistd::execv(&shell, &args);
                // execv only returns on failure.
                std::process::exit(127);
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<PtySession>> {
        self.sessions.lock().expect("pty registry lock poisoned").get(session_id).cloned()
    }

    /// Kills the child and drops the session from the registry.
    pub fn close(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().expect("pty registry lock poisoned").remove(session_id) {
            session.kill();
        }
    }

    pub fn resize(&self, session_id: &str, rows: u16, cols: u16) -> Result<(), ShellError> {
        let session = self.get(session_id).ok_or_else(|| ShellError::Pty(format!("no such session: {session_id}")))?;
        session.resize(rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_close_a_session() {
        let registry = PtyRegistry::new();
        let session = registry.open("test-session", "root", "root", 24, 80).unwrap();
        assert!(session.master_fd() >= 0);
        assert!(registry.get("test-session").is_some());
        registry.close("test-session");
        assert!(registry.get("test-session").is_none());
    }

    #[test]
    fn resize_unknown_session_errors() {
        let registry = PtyRegistry::new();
        assert!(registry.resize("nope", 24, 80).is_err());
    }
}
