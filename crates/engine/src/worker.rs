use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::api::{EngineEvent, RequestError, RequestOutcome, Task};
use crate::queue::TaskQueue;
use crate::state::{SharedState, WorkerPhase};

const DELAY_SLICE: Duration = Duration::from_secs(1);
const BODY_DUMP_LIMIT: usize = 4096;

/// Drain the queue until it is empty or shutdown is requested, performing one
/// request per task and reporting every outcome over `events`.
pub(crate) async fn run_worker(
    idx: usize,
    delay: Duration,
    client: reqwest::Client,
    queue: Arc<TaskQueue>,
    state: Arc<SharedState>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    loop {
        if state.is_shutdown() {
            state.set_phase(idx, WorkerPhase::Dead);
            return;
        }

        let Some(task) = queue.pop() else {
            debug!("worker #{idx}: empty queue, terminating");
            state.set_phase(idx, WorkerPhase::Dead);
            return;
        };

        if !delay.is_zero() {
            state.set_phase(idx, WorkerPhase::Waiting);
            let mut remaining = delay;
            while !remaining.is_zero() {
                if state.is_shutdown() {
                    state.set_phase(idx, WorkerPhase::Dead);
                    return;
                }
                let slice = remaining.min(DELAY_SLICE);
                tokio::time::sleep(slice).await;
                remaining = remaining.saturating_sub(slice);
            }
        }

        let request_id = state.next_request_id();
        info!(
            "performing request #{request_id}: {} {}",
            task.method, task.url
        );

        state.set_phase(idx, WorkerPhase::Requesting);
        let started = Instant::now();
        let outcome = match dispatch(&client, &task).await {
            Ok(response) => {
                let elapsed = started.elapsed();
                let status = response.status();
                let ok = status.is_informational() || status.is_success();
                if ok {
                    state.add_success();
                } else {
                    state.add_failed();
                }
                state.push_latency(elapsed.as_secs_f64());
                info!(
                    "response #{request_id}: {status} {:?}",
                    response.headers()
                );
                let size = match response.bytes().await {
                    Ok(bytes) => {
                        dump_body(request_id, &bytes);
                        bytes.len() as u64
                    }
                    Err(err) => {
                        debug!("response #{request_id}: body read failed: {err}");
                        0
                    }
                };
                RequestOutcome {
                    request_id,
                    method: task.method.clone(),
                    url: task.url.clone(),
                    status: Some(status),
                    ok,
                    size,
                    elapsed,
                    error: None,
                }
            }
            Err(error) => {
                let elapsed = started.elapsed();
                state.add_failed();
                info!(
                    "no response for #{request_id}: {} ({})",
                    error.kind, error.message
                );
                RequestOutcome {
                    request_id,
                    method: task.method.clone(),
                    url: task.url.clone(),
                    status: None,
                    ok: false,
                    size: 0,
                    elapsed,
                    error: Some(error),
                }
            }
        };

        let _ = events.send(EngineEvent::RequestFinished { outcome });
    }
}

async fn dispatch(client: &reqwest::Client, task: &Task) -> Result<reqwest::Response, RequestError> {
    let method = Method::from_bytes(task.method.as_bytes()).map_err(|err| RequestError {
        kind: "Method",
        message: err.to_string(),
    })?;

    let mut request = client
        .request(method, task.url.as_str())
        .headers(task.headers.clone());
    if let Some(body) = &task.body {
        request = request.body(body.clone());
    }

    request.send().await.map_err(|err| RequestError {
        kind: classify(&err),
        message: root_cause(&err),
    })
}

fn classify(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "Timeout"
    } else if err.is_connect() {
        "Connect"
    } else if err.is_redirect() {
        "Redirect"
    } else if err.is_builder() {
        "Request"
    } else if err.is_body() || err.is_decode() {
        "Body"
    } else {
        "Error"
    }
}

/// Innermost message of the error chain; transport errors wrap the useful
/// cause (the OS-level message) several layers deep.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

fn dump_body(request_id: u64, bytes: &[u8]) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    let prefix = &bytes[..bytes.len().min(BODY_DUMP_LIMIT)];
    trace!(
        "response #{request_id} content ({} bytes):\n{}",
        bytes.len(),
        String::from_utf8_lossy(prefix)
    );
}
