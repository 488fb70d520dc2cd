//! Cross-crate coverage for the commit path: `alpamon-inventory`'s
//! `Reconciler::commit` enqueues a snapshot PUT and a `committed` event
//! POST, and a real `ReporterPool` worker delivers both through
//! `alpamon-transport` to an actual HTTP server.

use alpamon_core::{Platform, Settings, TlsPolicy};
use alpamon_inventory::Reconciler;
use alpamon_queue::{PriorityQueue, ReporterPool};
use alpamon_transport::AuthenticatedClient;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn commit_reaches_the_server_through_a_real_reporter_pool() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/servers/servers/-/commit/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/events/events/"))
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
    let workers = pool.spawn(2);

    let reconciler = Reconciler::new(queue.clone(), client.clone(), Platform::Debian);
    reconciler.commit(vec!["server".to_string()]).await;

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pool.counters().success.load(Ordering::SeqCst) >= 2 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert!(delivered.is_ok(), "both the commit PUT and the committed event POST should succeed");

    for w in workers {
        w.abort();
    }
}
