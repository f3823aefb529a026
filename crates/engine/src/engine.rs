use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::api::{EngineConfig, EngineEvent, EngineHandle};
use crate::queue::TaskQueue;
use crate::state::SharedState;

pub(crate) fn start_engine(
    config: EngineConfig,
    queue: TaskQueue,
    state: Arc<SharedState>,
) -> anyhow::Result<(EngineHandle, mpsc::UnboundedReceiver<EngineEvent>)> {
    let client = build_client(&config)?;
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_engine(config, client, Arc::new(queue), state, event_tx));
    Ok((EngineHandle { join }, event_rx))
}

fn build_client(config: &EngineConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.timeout / 2)
        .read_timeout(config.timeout / 2)
        .danger_accept_invalid_certs(config.insecure)
        .user_agent(concat!("upcheck/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")
}

async fn run_engine(
    config: EngineConfig,
    client: reqwest::Client,
    queue: Arc<TaskQueue>,
    state: Arc<SharedState>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
) {
    let threads = config.threads.max(1);
    debug!("starting {threads} workers for {} requests", state.total());

    let mut workers = JoinSet::new();
    for idx in 0..threads {
        workers.spawn(crate::worker::run_worker(
            idx,
            config.delay,
            client.clone(),
            queue.clone(),
            state.clone(),
            event_tx.clone(),
        ));
    }

    while workers.join_next().await.is_some() {}
    let _ = event_tx.send(EngineEvent::Stopped);
}
