//! The control-channel backhaul client (component D).

use crate::handle::AgentHandle;
use alpamon_core::{AgentError, Settings};
use alpamon_queue::{priority, Method, PriorityQueue, QueuedRequest};
use alpamon_reconnect::{ConnectionState, ReconnectPolicy, ReconnectState};
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Called back by the control channel to hand off `commit` and `command`
/// queries, kept as a trait so this crate has no dependency on
/// `alpamon-inventory`/`alpamon-commands` (which themselves enqueue through
/// `alpamon-queue`, a dependency of this crate).
#[async_trait]
pub trait ControlChannelHandlers: Send + Sync {
    /// Dispatches a recognized `command` query onto its own task.
    async fn on_command(&self, command: Value);

    /// Schedules an inventory commit/sync task.
    async fn on_commit(&self);

    /// Whether the fact-query tool is present on this host. The supervisor
    /// checks this at startup before the control channel ever
    /// connects; steady state no longer branches on it.
    fn has_fact_tool(&self) -> bool;
}

/// A single bidirectional message session to the backhaul endpoint.
pub struct ControlChannelClient<H: ControlChannelHandlers> {
    settings: Settings,
    queue: PriorityQueue,
    handlers: H,
    handle: AgentHandle,
    reconnect_policy: ReconnectPolicy,
    reconnect_state: ReconnectState,
}

impl<H: ControlChannelHandlers> ControlChannelClient<H> {
    pub fn new(settings: Settings, queue: PriorityQueue, handlers: H, handle: AgentHandle) -> Self {
        Self {
            settings,
            queue,
            handlers,
            handle,
            reconnect_policy: ReconnectPolicy::default(),
            reconnect_state: ReconnectState::new(),
        }
    }

    /// Runs forever: connect, process messages until the session drops or a
    /// `reconnect`/`quit` query arrives, then reconnect with backoff.
    pub async fn run(&self) {
        let mut attempt = 0usize;
        loop {
            self.reconnect_state.mark_reconnecting();
            match self.connect_and_serve().await {
                Ok(()) => {
                    attempt = 0;
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "control channel session ended");
                }
            }
            self.reconnect_state.mark_disconnected();

            if let Some(delay) = self.reconnect_policy.delay_for_attempt(attempt) {
                tokio::time::sleep(delay).await;
                attempt += 1;
            } else {
                return;
            }
        }
    }

    async fn connect_and_serve(&self) -> Result<(), AgentError> {
        let mut request = self
            .settings
            .backhaul_url
            .as_str()
            .into_client_request()
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&self.settings.authorization_header())
                .map_err(|e| AgentError::Transport(e.to_string()))?,
        );

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        self.reconnect_state.mark_connected();
        let (mut write, mut read) = stream.split();

        let mut processed_any = false;
        while let Some(message) = read.next().await {
            let message = message.map_err(|e| AgentError::Transport(e.to_string()))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match self.handle_frame(&text, &mut write).await {
                FrameOutcome::Continue => processed_any = true,
                FrameOutcome::CloseSession => break,
            }

            if processed_any {
                self.reconnect_state.reset_attempts();
            }
        }

        Ok(())
    }

    async fn handle_frame(&self, text: &str, write: &mut WsSink) -> FrameOutcome {
        let content: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::error!(frame = text, "inappropriate message");
                return FrameOutcome::Continue;
            }
        };

        let Some(query) = content.get("query").and_then(Value::as_str) else {
            #[cfg(feature = "tracing")]
            tracing::error!(frame = text, "inappropriate message");
            return FrameOutcome::Continue;
        };

        let ack = serde_json::to_string(&json!({"query": "hello"})).unwrap();
        let _ = write.send(Message::Text(ack)).await;

        match query {
            "commit" => {
                // The fact tool's absence is a startup-time failure (the
                // startup sequence installs it before the control channel
                // ever connects), so steady state just schedules the
                // reconciliation unconditionally.
                self.handlers.on_commit().await;
                FrameOutcome::Continue
            }
            "command" => {
                if let Some(command) = content.get("command").cloned() {
                    if let Some(id) = command.get("id") {
                        self.ack_command(id).await;
                    }
                    let recognized = command
                        .get("shell")
                        .and_then(Value::as_str)
                        .is_some_and(|s| matches!(s, "internal" | "system" | "osquery"));
                    if recognized {
                        self.handlers.on_command(command).await;
                    } else {
                        #[cfg(feature = "tracing")]
                        tracing::error!(?command, "invalid command shell");
                    }
                }
                FrameOutcome::Continue
            }
            "quit" => {
                self.handle.quit().await;
                FrameOutcome::CloseSession
            }
            "reconnect" => FrameOutcome::CloseSession,
            other => {
                #[cfg(feature = "tracing")]
                tracing::warn!(query = other, "not implemented");
                FrameOutcome::Continue
            }
        }
    }

    async fn ack_command(&self, id: &Value) {
        let path = format!("/api/events/commands/{}/ack/", id);
        let request = QueuedRequest::new(priority::COMMAND, Method::Post, path, json!({}));
        self.queue.enqueue(request).await;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.reconnect_state.state()
    }
}

enum FrameOutcome {
    Continue,
    CloseSession,
}
