//! Integration coverage the crate's own unit tests don't reach: multiple
//! independent TCP connections served concurrently, and `LogServer::quit`'s
//! effect on new connection attempts versus an already-open one.

use alpamon_executor::CurrentRuntime;
use alpamon_logsink::LogServer;
use alpamon_queue::PriorityQueue;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn send_frame(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
    stream.write_all(payload).await.unwrap();
}

fn record(msg: &str, name: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "created": 1700000000.0,
        "levelno": 30,
        "name": name,
        "pathname": "runner.py",
        "lineno": 7,
        "process": 42,
        "thread": 7,
        "processName": "MainProcess",
        "threadName": "MainThread",
        "msg": msg,
        "program": "alpamon",
    }))
    .unwrap()
}

#[tokio::test]
async fn two_independent_connections_both_land_on_the_queue() {
    let queue = PriorityQueue::new();
    let server = LogServer::bind("127.0.0.1:0".parse().unwrap(), queue.clone(), CurrentRuntime::new())
        .await
        .unwrap();

    let mut client_a = TcpStream::connect(server.local_addr()).await.unwrap();
    let mut client_b = TcpStream::connect(server.local_addr()).await.unwrap();

    send_frame(&mut client_a, &record("from-a", "agent.a")).await;
    send_frame(&mut client_b, &record("from-b", "agent.b")).await;
    drop(client_a);
    drop(client_b);

    let mut seen_msgs = Vec::new();
    for _ in 0..2 {
        let req = tokio::time::timeout(Duration::from_secs(1), queue.dequeue()).await.unwrap();
        seen_msgs.push(req.body["msg"].as_str().unwrap().to_string());
    }
    seen_msgs.sort();
    assert_eq!(seen_msgs, vec!["from-a".to_string(), "from-b".to_string()]);

    server.quit();
}

#[tokio::test]
async fn quit_stops_accepting_new_connections_but_not_an_open_one() {
    let queue = PriorityQueue::new();
    let server = LogServer::bind("127.0.0.1:0".parse().unwrap(), queue.clone(), CurrentRuntime::new())
        .await
        .unwrap();
    let addr = server.local_addr();

    let mut already_open = TcpStream::connect(addr).await.unwrap();
    // let the accept loop register this connection before shutdown is requested
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.quit();
    tokio::time::sleep(Duration::from_millis(50)).await;

    send_frame(&mut already_open, &record("still-flowing", "agent.c")).await;
    let req = tokio::time::timeout(Duration::from_secs(1), queue.dequeue())
        .await
        .expect("a connection open before quit() should still drain its frames");
    assert_eq!(req.body["msg"], json!("still-flowing"));

    let refused = TcpStream::connect(addr).await;
    // the listener is dropped once the acceptor task sees the shutdown signal;
    // a fresh connect should either fail outright or the peer should close
    // immediately without ever reading a frame.
    if let Ok(mut stream) = refused {
        send_frame(&mut stream, &record("should-not-count", "agent.d")).await;
        let mut probe = [0u8; 1];
        let closed_or_idle = tokio::time::timeout(Duration::from_millis(200), stream.read(&mut probe)).await;
        assert!(closed_or_idle.is_err() || matches!(closed_or_idle, Ok(Ok(0))));
    }
}
