//! The authenticated HTTP client (component A) and control-channel backhaul
//! client (component D), per and.
//!
//! `alpamon-transport` is the only crate that speaks HTTP or WebSocket to
//! the control plane. It implements `alpamon-queue`'s `RequestSink` trait
//! so the reporter pool can deliver queued requests without this crate's
//! callers needing to know about the queue's internals, and it calls back
//! into inventory/command handling through a caller-supplied
//! [`ControlChannelHandlers`] so it has no dependency on those crates.

mod client;
mod control;
mod handle;
mod sink;

pub use client::{AuthenticatedClient, HttpResponse, SharedClient};
pub use control::{ControlChannelClient, ControlChannelHandlers};
pub use handle::{AgentHandle, SupervisorSignal};
