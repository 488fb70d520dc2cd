//! Cross-crate end-to-end coverage: a command runs through
//! `alpamon-commands`, its `fin` lands on `alpamon-queue`'s priority queue,
//! and a real `alpamon-queue::ReporterPool` worker delivers it through
//! `alpamon-transport`'s `AuthenticatedClient` to an actual HTTP server.
//! No single crate's own test suite exercises this full chain.

use alpamon_commands::{CommandDispatcher, NoopInventory};
use alpamon_core::{Platform, Settings, TlsPolicy};
use alpamon_queue::{PriorityQueue, ReporterCounters, ReporterPool};
use alpamon_shell::PtyRegistry;
use alpamon_transport::{AgentHandle, AuthenticatedClient};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn ping_command_is_dispatched_queued_and_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events/commands/integration-1/fin/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let settings = Settings {
        server_url: server.uri(),
        backhaul_url: String::new(),
        credential_id: "id".to_string(),
        credential_key: "key".to_string(),
        tls: TlsPolicy { verify: true, ca_cert: None },
        debug: false,
        http_workers: 1,
    };
    let client = Arc::new(AuthenticatedClient::new(&settings).unwrap());

    let queue = PriorityQueue::new();
    let pool = Arc::new(ReporterPool::new(queue.clone(), client.clone()));
    let workers = pool.spawn(1);

    let (handle, _signals) = AgentHandle::channel(4);
    let dispatcher = CommandDispatcher::new(
        queue.clone(),
        Platform::Debian,
        PtyRegistry::new(),
        Arc::new(NoopInventory),
        handle,
        pool.counters(),
        client.clone(),
    );

    dispatcher
        .run(json!({"id": "integration-1", "shell": "internal", "line": "ping"}))
        .await;

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pool.counters().success.load(std::sync::atomic::Ordering::SeqCst) >= 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert!(delivered.is_ok(), "the fin post should reach the mock server and count as a success");

    for w in workers {
        w.abort();
    }
}
