//! Internal/system/osquery command dispatch (component E).
//!
//! [`CommandDispatcher`] turns one parsed [`CommandRecord`] into an
//! [`InternalVerb`] match, a shell-grammar run, or a fact-query-tool
//! invocation, then posts the `fin` result back through the priority
//! queue. It reaches the inventory reconciler only through the
//! [`InventoryHandle`] seam, so this crate has no dependency on
//! `alpamon-inventory`.

mod dispatcher;
mod inventory;
mod pypackage;
mod record;
mod transfer;
mod verb;

pub use dispatcher::CommandDispatcher;
pub use inventory::{InventoryHandle, NoopInventory};
pub use record::{CommandRecord, RecordError, ShellKind};
pub use verb::{InternalVerb, VerbError};
