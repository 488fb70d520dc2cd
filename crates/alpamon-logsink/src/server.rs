//! The log fan-in acceptor and per-connection framing loop.
//!
//! One task accepts connections; each accepted connection gets its own task
//! so a slow or stalled sender never blocks the others, spawned through the
//! same [`alpamon_executor::Executor`] seam the command dispatcher and PTY
//! bridge use.

use crate::error::LogSinkError;
use crate::record::{LogEntry, LogRecord};
use alpamon_executor::Executor;
use alpamon_queue::{priority, Method, PriorityQueue, QueuedRequest};
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// A running log fan-in server. Dropping or calling [`LogServer::quit`]
/// stops the acceptor; in-flight connection tasks drain and exit on their
/// own when the peer closes the socket.
pub struct LogServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<()>,
}

impl LogServer {
    /// Binds to `addr` and starts accepting connections on `executor`.
    pub async fn bind<E: Executor>(
        addr: SocketAddr,
        queue: PriorityQueue,
        executor: E,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let loop_executor = executor.clone();
        executor.spawn(accept_loop(listener, queue, loop_executor, shutdown_rx));

        Ok(Self {
            local_addr,
            shutdown: shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Requests a clean shutdown; the bound socket closes, unblocking the
    /// pending `accept`.
    pub fn quit(&self) {
        let _ = self.shutdown.send(());
    }
}

async fn accept_loop<E: Executor>(
    listener: TcpListener,
    queue: PriorityQueue,
    executor: E,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let queue = queue.clone();
                        executor.spawn(handle_connection(stream, queue));
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, queue: PriorityQueue) {
    loop {
        match read_frame(&mut stream).await {
            Ok(Some(payload)) => {
                if let Ok(record) = serde_json::from_slice::<LogRecord>(&payload) {
                    let entry: LogEntry = record.into();
                    let body = serde_json::to_value(&entry).unwrap_or(serde_json::Value::Null);
                    let request = QueuedRequest::new(priority::LOG, Method::Post, "/api/history/logs/", body);
                    queue.enqueue(request).await;
                }
                // a frame whose payload doesn't parse is dropped; the
                // connection stays open so one bad record doesn't cost the
                // rest of the stream.
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
}

/// Reads one frame: a 4-byte big-endian length prefix followed by exactly
/// that many bytes. Returns `Ok(None)` on a clean EOF between frames.
async fn read_frame(stream: &mut TcpStream) -> Result<Option<Vec<u8>>, LogSinkError> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
