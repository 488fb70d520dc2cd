//! Command execution, shell grammar, and PTY bridge (components E/F).
//!
//! [`runcmd`] spawns one process, optionally dropping root to a named
//! user/group first, bounded by [`alpamon_timelimiter`]'s timeout layer.
//! [`grammar`] chains `&&`/`||`/`;`-joined command lines through it the way
//! the control plane's `system` commands expect. [`pty`] forks an
//! interactive shell per open terminal session for the `openpty`/
//! `resizepty` internal verbs.

pub mod error;
pub mod grammar;
pub mod pty;
pub mod runcmd;

pub use error::ShellError;
pub use grammar::{run_shell_line, run_shell_line_with_timeout, tokenize};
pub use pty::{PtyRegistry, PtySession};
pub use runcmd::{runcmd, CommandOutcome, DEFAULT_TIMEOUT};
