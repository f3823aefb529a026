use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use upcheck_engine::{
    EngineConfig, EngineEvent, RequestOutcome, SharedState, Task, TaskQueue, start_engine,
};

/// Minimal HTTP/1.1 server answering every connection with a fixed response.
async fn spawn_http_server(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut seen = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let Ok(n) = socket.read(&mut buf).await else {
                        return;
                    };
                    if n == 0 {
                        return;
                    }
                    seen.extend_from_slice(&buf[..n]);
                    if seen.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

fn test_config(threads: usize) -> EngineConfig {
    EngineConfig {
        threads,
        delay: Duration::ZERO,
        timeout: Duration::from_secs(5),
        insecure: false,
    }
}

async fn drain(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<RequestOutcome> {
    let mut outcomes = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::RequestFinished { outcome } => outcomes.push(outcome),
            EngineEvent::Stopped => break,
        }
    }
    outcomes
}

#[tokio::test]
async fn successful_requests_update_every_counter() {
    let base = spawn_http_server("200 OK", "hello").await;
    let state = Arc::new(SharedState::new(2));
    let queue = TaskQueue::new();
    queue.append(Task::get(format!("{base}/a")), 3, &state);
    assert_eq!(state.total(), 3);

    let (engine, mut events) = start_engine(test_config(2), queue, state.clone()).unwrap();
    let outcomes = drain(&mut events).await;
    engine.wait().await.unwrap();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(state.success(), 3);
    assert_eq!(state.failed(), 0);
    assert_eq!(state.latency_count(), 3);
    assert!(state.latency_median().is_some());

    assert!(outcomes.iter().all(|o| o.ok));
    assert!(
        outcomes
            .iter()
            .all(|o| o.status.map(|s| s.as_u16()) == Some(200))
    );
    assert!(outcomes.iter().all(|o| o.size == "hello".len() as u64));
    assert!(outcomes.iter().all(|o| o.error.is_none()));
}

#[tokio::test]
async fn request_ids_are_unique_and_dense() {
    let base = spawn_http_server("200 OK", "ok").await;
    let state = Arc::new(SharedState::new(4));
    let queue = TaskQueue::new();
    queue.append(Task::get(format!("{base}/a")), 4, &state);
    queue.append(Task::get(format!("{base}/b")), 4, &state);

    let (engine, mut events) = start_engine(test_config(4), queue, state.clone()).unwrap();
    let outcomes = drain(&mut events).await;
    engine.wait().await.unwrap();

    let mut ids: Vec<u64> = outcomes.iter().map(|o| o.request_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
}

#[tokio::test]
async fn refused_connection_counts_as_failure() {
    // Bind a port, then free it so the connection is refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let state = Arc::new(SharedState::new(1));
    let queue = TaskQueue::new();
    queue.append(Task::get(format!("http://{addr}/")), 1, &state);

    let (engine, mut events) = start_engine(test_config(1), queue, state.clone()).unwrap();
    let outcomes = drain(&mut events).await;
    engine.wait().await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(state.success(), 0);
    assert_eq!(state.failed(), 1);
    assert_eq!(state.latency_count(), 0);

    let outcome = &outcomes[0];
    assert!(!outcome.ok);
    assert!(outcome.status.is_none());
    let error = outcome.error.as_ref().expect("transport error expected");
    assert!(!error.kind.is_empty());
    assert!(!error.message.is_empty());
}

#[tokio::test]
async fn non_success_status_is_a_failure_with_a_status() {
    let base = spawn_http_server("404 Not Found", "missing").await;
    let state = Arc::new(SharedState::new(1));
    let queue = TaskQueue::new();
    queue.append(Task::get(format!("{base}/gone")), 1, &state);

    let (engine, mut events) = start_engine(test_config(1), queue, state.clone()).unwrap();
    let outcomes = drain(&mut events).await;
    engine.wait().await.unwrap();

    assert_eq!(state.failed(), 1);
    assert_eq!(state.success(), 0);
    // A response was received, so its latency still counts.
    assert_eq!(state.latency_count(), 1);

    let outcome = &outcomes[0];
    assert!(!outcome.ok);
    assert_eq!(outcome.status.map(|s| s.as_u16()), Some(404));
    assert!(outcome.error.is_none());
    assert_eq!(outcome.size, "missing".len() as u64);
}

#[tokio::test]
async fn headers_and_body_are_sent_with_the_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut seen = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut buf).await else {
                return;
            };
            if n == 0 {
                break;
            }
            seen.extend_from_slice(&buf[..n]);
            if seen.ends_with(b"{\"key\": \"val\"}") {
                break;
            }
        }
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
        let _ = socket.shutdown().await;
        let _ = seen_tx.send(seen);
    });

    let state = Arc::new(SharedState::new(1));
    let queue = TaskQueue::new();
    let tasks = upcheck_engine::parse_tasks(
        "t",
        &format!(
            "POST http://{addr}/submit\nContent-Type: application/json\n\n{{\"key\": \"val\"}}\n"
        ),
    )
    .unwrap();
    for task in tasks {
        queue.append(task, 1, &state);
    }

    let (engine, mut events) = start_engine(test_config(1), queue, state.clone()).unwrap();
    let outcomes = drain(&mut events).await;
    engine.wait().await.unwrap();

    assert_eq!(state.success(), 1);
    assert_eq!(outcomes[0].method, "POST");

    let seen = seen_rx.recv().await.expect("request bytes captured");
    let seen = String::from_utf8_lossy(&seen);
    assert!(seen.starts_with("POST /submit HTTP/1.1\r\n"));
    assert!(seen.to_lowercase().contains("content-type: application/json"));
    assert!(seen.ends_with("{\"key\": \"val\"}"));
}

#[tokio::test]
async fn shutdown_flag_stops_workers_before_draining() {
    let base = spawn_http_server("200 OK", "ok").await;
    let state = Arc::new(SharedState::new(2));
    let queue = TaskQueue::new();
    queue.append(Task::get(format!("{base}/a")), 4, &state);

    state.trigger_shutdown();

    let (engine, mut events) = start_engine(test_config(2), queue, state.clone()).unwrap();
    let outcomes = drain(&mut events).await;
    engine.wait().await.unwrap();

    // Workers observed the flag at their first iteration boundary; the aborted
    // tasks stay accounted in the total but in neither outcome counter.
    assert!(outcomes.is_empty());
    assert_eq!(state.total(), 4);
    assert_eq!(state.success(), 0);
    assert_eq!(state.failed(), 0);
}

#[tokio::test]
async fn single_worker_processes_tasks_in_queue_order() {
    let base = spawn_http_server("200 OK", "ok").await;
    let state = Arc::new(SharedState::new(1));
    let queue = TaskQueue::new();
    for path in ["first", "second", "third"] {
        queue.append(Task::get(format!("{base}/{path}")), 1, &state);
    }

    let (engine, mut events) = start_engine(test_config(1), queue, state.clone()).unwrap();
    let outcomes = drain(&mut events).await;
    engine.wait().await.unwrap();

    let urls: Vec<&str> = outcomes
        .iter()
        .map(|o| o.url.rsplit('/').next().unwrap())
        .collect();
    assert_eq!(urls, ["first", "second", "third"]);
    let ids: Vec<u64> = outcomes.iter().map(|o| o.request_id).collect();
    assert_eq!(ids, [1, 2, 3]);
}
