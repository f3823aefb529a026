//! Public API types for the in-process `upcheck` engine.

use std::sync::Arc;
use std::time::Duration;

pub use reqwest::StatusCode;
pub use reqwest::header::HeaderMap;
use tokio::sync::mpsc;

use crate::queue::TaskQueue;
use crate::state::SharedState;

/// Configuration for the request engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of workers draining the task queue concurrently.
    pub threads: usize,

    /// Pause observed by a worker before every request it makes, including
    /// its first one. Slept in one-second slices so shutdown stays responsive.
    pub delay: Duration,

    /// Total request timeout, split equally between connect and read.
    pub timeout: Duration,

    /// Skip TLS certificate verification.
    pub insecure: bool,
}

/// One HTTP request to issue.
///
/// Tasks are immutable value objects; seeding enqueues as many copies as the
/// configured repetition count.
#[derive(Debug, Clone)]
pub struct Task {
    /// Target URL.
    pub url: String,
    /// HTTP method token (uppercase).
    pub method: String,
    /// Request headers (case-insensitive).
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<String>,
}

impl Task {
    /// A `GET` task for `url` with no headers and no body.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Transport-level failure details for a request that produced no response.
#[derive(Debug, Clone)]
pub struct RequestError {
    /// Short failure class (`Timeout`, `Connect`, ...), shown in the status column.
    pub kind: &'static str,
    /// Innermost cause message of the error chain.
    pub message: String,
}

/// Result of one executed request, success or failure.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// Unique id assigned when a worker claimed the request.
    pub request_id: u64,
    /// HTTP method of the task.
    pub method: String,
    /// Target URL of the task.
    pub url: String,
    /// Response status, when a response was received at all.
    pub status: Option<StatusCode>,
    /// Whether the outcome counts as a success (1xx/2xx status).
    pub ok: bool,
    /// Response body size in bytes.
    pub size: u64,
    /// Time between dispatch and response headers (or failure).
    pub elapsed: Duration,
    /// Transport failure details, when no response was received.
    pub error: Option<RequestError>,
}

/// Engine event stream payload.
#[derive(Debug)]
pub enum EngineEvent {
    /// A worker finished one request.
    RequestFinished {
        /// The request outcome.
        outcome: RequestOutcome,
    },
    /// All workers terminated; no further events follow.
    Stopped,
}

/// Fatal configuration problems detected before any worker starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Input files were given but produced no tasks.
    #[error("no valid tasks found in the provided input files")]
    NoValidTasks,
    /// Neither input files nor URL arguments produced any task.
    #[error("no endpoint URLs provided")]
    NoUrlsProvided,
}

/// Handle to a running engine instance.
pub struct EngineHandle {
    pub(crate) join: tokio::task::JoinHandle<()>,
}

impl EngineHandle {
    /// Wait for every worker to terminate.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.join
            .await
            .map_err(|err| anyhow::anyhow!("engine task join error: {err}"))
    }
}

/// Start the engine: builds the shared HTTP client and spawns the worker pool
/// draining `queue`.
///
/// The engine emits one [`EngineEvent::RequestFinished`] per executed request
/// and a final [`EngineEvent::Stopped`] after the last worker exits. The queue
/// must be fully seeded before this call; nothing enqueues afterwards.
pub fn start_engine(
    config: EngineConfig,
    queue: TaskQueue,
    state: Arc<SharedState>,
) -> anyhow::Result<(EngineHandle, mpsc::UnboundedReceiver<EngineEvent>)> {
    crate::engine::start_engine(config, queue, state)
}
