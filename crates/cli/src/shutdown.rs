use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

/// Counts termination signals so the second press can force an exit.
#[derive(Debug)]
pub struct ShutdownController {
    presses: AtomicU8,
}

#[derive(Debug, Clone, Copy)]
pub enum ShutdownEvent {
    Graceful,
    Immediate,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            presses: AtomicU8::new(0),
        }
    }

    pub fn bump(&self) -> u8 {
        self.presses.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Translate SIGINT/SIGTERM into the two-stage shutdown protocol: the first
/// signal asks workers to drain, the second forces the process down.
pub fn spawn_signal_handler(
    shutdown: Arc<ShutdownController>,
    shutdown_tx: mpsc::UnboundedSender<ShutdownEvent>,
) {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut terminate = {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(_) => return,
            }
        };

        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if res.is_err() {
                            return;
                        }
                    }
                    _ = terminate.recv() => {}
                }
            }
            #[cfg(not(unix))]
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }

            let n = shutdown.bump();
            if n == 1 {
                let _ = shutdown_tx.send(ShutdownEvent::Graceful);
            } else {
                let _ = shutdown_tx.send(ShutdownEvent::Immediate);
                return;
            }
        }
    });
}
