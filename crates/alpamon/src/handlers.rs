//! Wires the control channel (D) to the command dispatcher (E) and the
//! inventory reconciler (H), the two seams both crates expose precisely so
//! this composition root is the only place that needs to know about all
//! three at once.

use alpamon_commands::{CommandDispatcher, InventoryHandle};
use alpamon_executor::Executor;
use alpamon_inventory::Reconciler;
use alpamon_transport::ControlChannelHandlers;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Delegates `alpamon-commands`' inventory seam straight to the reconciler;
/// kept as a thin wrapper rather than a blanket impl so `alpamon-inventory`
/// stays free of a dependency on `alpamon-commands` ( "shared
/// control-channel reference in tasks" applies the same way to this seam).
pub struct InventoryAdapter(pub Arc<Reconciler>);

#[async_trait]
impl InventoryHandle for InventoryAdapter {
    async fn commit(&self, keys: Vec<String>) {
        self.0.commit(keys).await;
    }

    async fn sync(&self, keys: Vec<String>) {
        self.0.sync(keys).await;
    }
}

/// Implements the control channel's callback trait by spawning each inbound
/// command onto its own task and routing `commit` queries to the
/// reconciler.
pub struct AgentHandlers<E: Executor> {
    pub dispatcher: Arc<CommandDispatcher>,
    pub reconciler: Arc<Reconciler>,
    pub executor: E,
}

#[async_trait]
impl<E: Executor> ControlChannelHandlers for AgentHandlers<E> {
    async fn on_command(&self, command: Value) {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.executor.spawn(async move { dispatcher.run(command).await });
    }

    async fn on_commit(&self) {
        // The startup sequence already chose commit-vs-sync based on
        // `commissioned`; every later trigger over the live
        // channel is necessarily post-commissioning, so it's always a sync.
        let reconciler = Arc::clone(&self.reconciler);
        self.executor.spawn(async move { reconciler.sync(Vec::new()).await });
    }

    fn has_fact_tool(&self) -> bool {
        self.reconciler.has_fact_tool()
    }
}
