//! Core infrastructure for the alpamon host agent.
//!
//! This crate provides shared functionality used across every other
//! alpamon crate:
//! - [`Settings`], loaded once at startup and passed by reference
//! - [`AgentError`], a unified error type for resilience-sensitive components
//! - [`Platform`], OS-family detection and package-manager command mapping
//! - An event system for observability, shared with the queue and reconnect crates

pub mod error;
pub mod events;
pub mod facts;
pub mod platform;
pub mod settings;

pub use error::{AgentError, ConfigError};
pub use events::{AgentEvent, EventListener, EventListeners, FnListener};
pub use facts::{fact_tool_present, FACT_TOOL_PATH};
pub use platform::{PackageRequest, PackageSource, Platform};
pub use settings::{Settings, TlsPolicy};
