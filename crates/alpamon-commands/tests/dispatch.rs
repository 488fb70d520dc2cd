//! End-to-end command dispatch: a `command` query in, a `fin` POST
//! at priority 10 out, with internal verbs exercising the inventory and
//! supervisor-handle seams along the way.

use alpamon_commands::{CommandDispatcher, NoopInventory};
use alpamon_core::{Platform, Settings, TlsPolicy};
use alpamon_queue::{PriorityQueue, ReporterCounters};
use alpamon_shell::PtyRegistry;
use alpamon_transport::{AgentHandle, AuthenticatedClient, SupervisorSignal};
use serde_json::json;
use std::sync::Arc;

fn test_client() -> Arc<AuthenticatedClient> {
    let settings = Settings {
        server_url: "https://alpacon.example.com".to_string(),
        backhaul_url: String::new(),
        credential_id: "id".to_string(),
        credential_key: "key".to_string(),
        tls: TlsPolicy { verify: true, ca_cert: None },
        debug: false,
        http_workers: 4,
    };
    Arc::new(AuthenticatedClient::new(&settings).unwrap())
}

fn dispatcher(handle: AgentHandle) -> CommandDispatcher {
    CommandDispatcher::new(
        PriorityQueue::new(),
        Platform::Debian,
        PtyRegistry::new(),
        Arc::new(NoopInventory),
        handle,
        Arc::new(ReporterCounters::default()),
        test_client(),
    )
}

fn dispatcher_with_queue(queue: PriorityQueue, handle: AgentHandle) -> CommandDispatcher {
    CommandDispatcher::new(
        queue,
        Platform::Debian,
        PtyRegistry::new(),
        Arc::new(NoopInventory),
        handle,
        Arc::new(ReporterCounters::default()),
        test_client(),
    )
}

#[tokio::test]
async fn ping_posts_a_successful_fin() {
    let queue = PriorityQueue::new();
    let (handle, _rx) = AgentHandle::channel(1);
    let dispatcher = dispatcher_with_queue(queue.clone(), handle);

    dispatcher
        .run(json!({"id": "cmd-1", "shell": "internal", "line": "ping"}))
        .await;

    let fin = queue.dequeue().await;
    assert_eq!(fin.path, "/api/events/commands/cmd-1/fin/");
    assert_eq!(fin.body["success"], json!(true));
}

#[tokio::test]
async fn unrecognized_internal_verb_posts_a_failing_fin() {
    let queue = PriorityQueue::new();
    let (handle, _rx) = AgentHandle::channel(1);
    let dispatcher = dispatcher_with_queue(queue.clone(), handle);

    dispatcher
        .run(json!({"id": "cmd-2", "shell": "internal", "line": "not-a-real-verb"}))
        .await;

    let fin = queue.dequeue().await;
    assert_eq!(fin.body["success"], json!(false));
}

#[tokio::test]
async fn system_shell_line_runs_and_reports_output() {
    let queue = PriorityQueue::new();
    let (handle, _rx) = AgentHandle::channel(1);
    let dispatcher = dispatcher_with_queue(queue.clone(), handle);

    dispatcher
        .run(json!({
            "id": "cmd-3",
            "shell": "system",
            "line": "echo hello-from-test",
            "username": "root",
            "groupname": "root",
        }))
        .await;

    let fin = queue.dequeue().await;
    assert_eq!(fin.body["success"], json!(true));
    assert!(fin.body["result"].as_str().unwrap().contains("hello-from-test"));
}

#[tokio::test]
async fn commands_without_an_id_post_nothing() {
    let queue = PriorityQueue::new();
    let (handle, _rx) = AgentHandle::channel(1);
    let dispatcher = dispatcher_with_queue(queue.clone(), handle);

    dispatcher.run(json!({"shell": "internal", "line": "ping"})).await;

    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn restart_verb_signals_the_agent_handle() {
    let (handle, mut signals) = AgentHandle::channel(1);
    let dispatcher = dispatcher(handle);

    dispatcher
        .run(json!({"id": "cmd-4", "shell": "internal", "line": "restart"}))
        .await;

    assert_eq!(signals.recv().await, Some(SupervisorSignal::Restart));
}

#[tokio::test]
async fn commit_verb_succeeds_against_a_noop_inventory() {
    let (handle, _rx) = AgentHandle::channel(1);
    let queue = PriorityQueue::new();
    let dispatcher = dispatcher_with_queue(queue.clone(), handle);

    dispatcher
        .run(json!({"id": "cmd-5", "shell": "internal", "line": "commit"}))
        .await;

    let fin = queue.dequeue().await;
    assert_eq!(fin.body["success"], json!(true));
}
