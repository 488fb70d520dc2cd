//! Drives [`await_commissioned`] against a real `wiremock` server the way
//! the supervisor will: a `StartupChecker` closure that makes an actual
//! HTTP call to `/api/servers/servers/-/` and translates the response into
//! a [`ProbeOutcome`].

use alpamon_healthcheck::{await_commissioned, ProbeOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn probe(client: &reqwest::Client, base_url: &str) -> ProbeOutcome {
    match client
        .get(format!("{base_url}/api/servers/servers/-/"))
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let commissioned = body.get("commissioned").and_then(|v| v.as_bool()).unwrap_or(false);
            ProbeOutcome::Ready { commissioned }
        }
        _ => ProbeOutcome::NotReady,
    }
}

#[tokio::test]
async fn returns_commissioned_flag_on_first_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/servers/servers/-/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"commissioned": true})))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let uri = server.uri();
    let commissioned = await_commissioned(|| probe(&client, &uri)).await;

    assert!(commissioned);
}

#[tokio::test(start_paused = true)]
async fn retries_through_5xx_then_returns_once_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/servers/servers/-/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/servers/servers/-/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"commissioned": false})))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let uri = server.uri();
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);

    let commissioned = await_commissioned(|| {
        a.fetch_add(1, Ordering::SeqCst);
        probe(&client, &uri)
    })
    .await;

    assert!(!commissioned);
    assert!(attempts.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn treats_connection_failure_as_not_ready() {
    // Nothing listening on this port; the probe closure should see a
    // connection error and report NotReady rather than panicking.
    let client = reqwest::Client::new();
    let dead_url = "http://127.0.0.1:1".to_string();
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);

    let fut = await_commissioned(move || {
        let client = client.clone();
        let url = dead_url.clone();
        let a = Arc::clone(&a);
        async move {
            a.fetch_add(1, Ordering::SeqCst);
            probe(&client, &url).await
        }
    });

    // Bound the wait: we only care that a couple of attempts happened and
    // none of them panicked on the connection error.
    let _ = tokio::time::timeout(std::time::Duration::from_millis(100), fut).await;
    assert!(attempts.load(Ordering::SeqCst) >= 1);
}
