mod cli;
mod format;
mod printer;
mod shutdown;

use std::io::{IsTerminal, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

use upcheck_engine::{
    ConfigError, EngineConfig, EngineEvent, SharedState, Task, TaskQueue, parse_tasks,
    start_engine,
};

use crate::cli::Cli;
use crate::printer::{Printer, PrinterOptions};
use crate::shutdown::{ShutdownController, ShutdownEvent, spawn_signal_handler};

fn init_logging(verbose: u8) {
    let level = match verbose.min(3) {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_input(path: &str) -> anyhow::Result<(String, String)> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read standard input")?;
        Ok(("<stdin>".to_string(), text))
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read request file {path:?}"))?;
        Ok((path.to_string(), text))
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Gather tasks from input files first, then from positional URL arguments.
fn collect_tasks(cli: &Cli) -> anyhow::Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for path in &cli.file {
        let (name, text) = read_input(path)?;
        tasks.extend(parse_tasks(&name, &text)?);
    }
    if !cli.file.is_empty() && tasks.is_empty() {
        return Err(ConfigError::NoValidTasks.into());
    }
    for url in &cli.endpoint_url {
        tasks.push(Task::get(normalize_url(url)));
    }
    if tasks.is_empty() {
        return Err(ConfigError::NoUrlsProvided.into());
    }
    Ok(tasks)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let tasks = collect_tasks(&cli)?;

    let state = Arc::new(SharedState::new(cli.threads));
    let queue = TaskQueue::new();
    for task in tasks {
        queue.append(task, cli.amount, &state);
    }
    debug!(
        "seeded {} requests across {} workers",
        state.total(),
        cli.threads
    );

    let is_tty = std::io::stdout().is_terminal();
    let mut printer = Printer::new(
        PrinterOptions {
            color: cli.color_mode().unwrap_or(is_tty),
            footer: is_tty,
            show_id: cli.show_id,
            show_error: cli.show_error,
        },
        state.clone(),
    );

    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel::<ShutdownEvent>();
    spawn_signal_handler(shutdown, shutdown_tx);

    printer.print_prologue(cli.threads);

    let config = EngineConfig {
        threads: cli.threads,
        delay: Duration::from_secs_f64(cli.delay),
        timeout: Duration::from_secs_f64(cli.timeout),
        insecure: cli.insecure,
    };
    let started_at = Instant::now();
    let (engine, mut events) = start_engine(config, queue, state.clone())?;

    let mut signals_open = true;
    loop {
        tokio::select! {
            signal = shutdown_rx.recv(), if signals_open => match signal {
                Some(ShutdownEvent::Graceful) => {
                    state.trigger_shutdown();
                    printer.print_shutdown_warning();
                }
                Some(ShutdownEvent::Immediate) => std::process::exit(0),
                None => signals_open = false,
            },
            event = events.recv() => match event {
                Some(EngineEvent::RequestFinished { outcome }) => {
                    printer.print_finished(&outcome);
                }
                Some(EngineEvent::Stopped) | None => break,
            },
        }
    }

    engine.wait().await?;
    let wall = started_at.elapsed();
    printer.print_epilogue(wall);

    if cli.exit_code && state.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
