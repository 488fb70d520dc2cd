//! Seam to the inventory reconciler (component H), kept as a trait so this
//! crate has no dependency on `alpamon-inventory` — mirroring how
//! `alpamon-transport::ControlChannelHandlers` decouples the control
//! channel from both this crate and the reconciler.

use async_trait::async_trait;

#[async_trait]
pub trait InventoryHandle: Send + Sync {
    /// Pushes the named keys (or every key, if empty) to the server without
    /// re-collecting facts first.
    async fn commit(&self, keys: Vec<String>);

    /// Re-collects facts for the named keys (or every key) and pushes any
    /// that changed.
    async fn sync(&self, keys: Vec<String>);
}

/// An [`InventoryHandle`] that does nothing, for dispatchers wired up
/// without an inventory reconciler (e.g. in tests).
pub struct NoopInventory;

#[async_trait]
impl InventoryHandle for NoopInventory {
    async fn commit(&self, _keys: Vec<String>) {}
    async fn sync(&self, _keys: Vec<String>) {}
}
