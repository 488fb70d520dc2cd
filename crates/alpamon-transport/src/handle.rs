//! The supervisor control surface.
//!
//! Dispatcher and PTY tasks never hold a reference to the live control
//! channel session; they hold an [`AgentHandle`] instead, decoupling task
//! lifetime from session lifetime — a session can be torn down and
//! recreated by the supervisor while tasks spawned under the old one are
//! still running.

use tokio::sync::mpsc;

/// A request routed to the supervisor's main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorSignal {
    /// Reconnect the control channel only; the current session stays alive
    /// until the new one is established.
    Reconnect,
    /// Restart the whole agent process.
    Restart,
    /// Initiate graceful shutdown.
    Quit,
    /// Send `{"query": "hello"}` on the current control-channel session.
    SendHello,
}

/// Cheap, cloneable handle to the supervisor, backed by an mpsc channel.
#[derive(Clone)]
pub struct AgentHandle {
    sender: mpsc::Sender<SupervisorSignal>,
}

impl AgentHandle {
    pub fn new(sender: mpsc::Sender<SupervisorSignal>) -> Self {
        Self { sender }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SupervisorSignal>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    async fn signal(&self, signal: SupervisorSignal) {
        if self.sender.send(signal).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(?signal, "supervisor channel closed, signal dropped");
        }
    }

    pub async fn restart(&self) {
        self.signal(SupervisorSignal::Restart).await
    }

    pub async fn quit(&self) {
        self.signal(SupervisorSignal::Quit).await
    }

    pub async fn reconnect(&self) {
        self.signal(SupervisorSignal::Reconnect).await
    }

    pub async fn send_hello(&self) {
        self.signal(SupervisorSignal::SendHello).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signals_are_received_in_order() {
        let (handle, mut rx) = AgentHandle::channel(4);
        handle.reconnect().await;
        handle.quit().await;

        assert_eq!(rx.recv().await, Some(SupervisorSignal::Reconnect));
        assert_eq!(rx.recv().await, Some(SupervisorSignal::Quit));
    }
}
