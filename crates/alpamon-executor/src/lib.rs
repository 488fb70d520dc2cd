//! Executor abstraction behind the command dispatcher and the log fan-in
//! server: both need to spawn work onto a runtime without hard-coding
//! `tokio::spawn`, so tests can drive them against a `CurrentRuntime` while
//! production wires in whatever `tokio::runtime::Handle` the supervisor is
//! running on.
//!
//! # Use Cases
//!
//! - **Command dispatch**: each inbound `command` query gets its own task
//!   (`AgentHandlers::on_command`) so a slow shell doesn't block the
//!   control-channel read loop
//! - **Log fan-in**: each accepted TCP connection on the local log socket
//!   gets its own task (`LogServer::bind`'s `accept_loop`)
//! - **Blocking operations**: `BlockingExecutor` offloads `nix` fork/exec
//!   calls to a dedicated handle rather than the connection's own task
//!
//! # Example
//!
//! ```rust
//! use alpamon_executor::{CurrentRuntime, Executor};
//!
//! # async fn example() {
//! let executor = CurrentRuntime::new();
//! let handle = executor.spawn(async { 1 + 1 });
//! assert_eq!(handle.await.unwrap(), 2);
//! # }
//! ```

mod executor;

pub use executor::{BlockingExecutor, CurrentRuntime, Executor};
