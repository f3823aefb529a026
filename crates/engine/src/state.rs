use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use tracing::debug;

/// Diagnostic phase of a worker. Observed by nothing but the debug log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Spawned, not yet picked a task.
    Initial,
    /// Sleeping off the configured inter-request delay.
    Waiting,
    /// Request in flight.
    Requesting,
    /// Terminated, either on empty queue or on shutdown.
    Dead,
}

impl WorkerPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => WorkerPhase::Waiting,
            2 => WorkerPhase::Requesting,
            3 => WorkerPhase::Dead,
            _ => WorkerPhase::Initial,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            WorkerPhase::Initial => "initial",
            WorkerPhase::Waiting => "waiting",
            WorkerPhase::Requesting => "requesting",
            WorkerPhase::Dead => "dead",
        }
    }
}

/// Process-wide record of counters, the latency log, per-worker phase slots
/// and the shutdown latch, shared by workers, printer and signal handling.
#[derive(Debug)]
pub struct SharedState {
    last_request_id: AtomicU64,
    requests_total: AtomicU64,
    requests_printed: AtomicU64,
    requests_success: AtomicU64,
    requests_failed: AtomicU64,
    latency: Mutex<Vec<f64>>,
    methods: Mutex<BTreeSet<String>>,
    worker_phases: Vec<AtomicU8>,
    shutdown: AtomicBool,
}

impl SharedState {
    /// Fresh state with one phase slot per worker.
    pub fn new(threads: usize) -> Self {
        Self {
            last_request_id: AtomicU64::new(0),
            requests_total: AtomicU64::new(0),
            requests_printed: AtomicU64::new(0),
            requests_success: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            latency: Mutex::new(Vec::new()),
            methods: Mutex::new(BTreeSet::new()),
            worker_phases: (0..threads).map(|_| AtomicU8::new(0)).collect(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Claim the next unique request id (1-based).
    pub fn next_request_id(&self) -> u64 {
        self.last_request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Account one more enqueued request. Called only during seeding.
    pub fn add_total(&self) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
    }

    /// Total number of requests to execute; fixed before workers start.
    pub fn total(&self) -> u64 {
        self.requests_total.load(Ordering::SeqCst)
    }

    /// Increment the printed-rows counter and return the new value.
    pub fn next_printed(&self) -> u64 {
        self.requests_printed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of result rows printed so far.
    pub fn printed(&self) -> u64 {
        self.requests_printed.load(Ordering::SeqCst)
    }

    /// Count one successful request.
    pub fn add_success(&self) {
        self.requests_success.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of successful requests.
    pub fn success(&self) -> u64 {
        self.requests_success.load(Ordering::SeqCst)
    }

    /// Count one failed request.
    pub fn add_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of failed requests.
    pub fn failed(&self) -> u64 {
        self.requests_failed.load(Ordering::SeqCst)
    }

    /// Append one latency sample, in seconds.
    pub fn push_latency(&self, seconds: f64) {
        self.latency
            .lock()
            .expect("latency log poisoned")
            .push(seconds);
    }

    /// Median of the recorded latencies, or `None` when nothing was recorded.
    ///
    /// Sorts the log in place; meant to be called once, after workers joined.
    pub fn latency_median(&self) -> Option<f64> {
        let mut samples = self.latency.lock().expect("latency log poisoned");
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(|a, b| a.total_cmp(b));
        let mid = samples.len() / 2;
        if samples.len() % 2 == 1 {
            Some(samples[mid])
        } else {
            Some((samples[mid - 1] + samples[mid]) / 2.0)
        }
    }

    /// Number of recorded latency samples.
    pub fn latency_count(&self) -> usize {
        self.latency.lock().expect("latency log poisoned").len()
    }

    /// Record a method string seen while seeding.
    pub fn record_method(&self, method: &str) {
        self.methods
            .lock()
            .expect("method set poisoned")
            .insert(method.to_string());
    }

    /// Width of the widest method seen while seeding.
    pub fn method_width(&self) -> usize {
        self.methods
            .lock()
            .expect("method set poisoned")
            .iter()
            .map(|m| m.len())
            .max()
            .unwrap_or(3)
    }

    /// Move a worker's diagnostic phase slot.
    pub fn set_phase(&self, worker: usize, phase: WorkerPhase) {
        if let Some(slot) = self.worker_phases.get(worker) {
            slot.store(phase as u8, Ordering::Relaxed);
        }
        debug!("worker #{worker} -> {}", phase.as_str());
    }

    /// Current diagnostic phase of a worker.
    pub fn phase(&self, worker: usize) -> WorkerPhase {
        self.worker_phases
            .get(worker)
            .map(|slot| WorkerPhase::from_u8(slot.load(Ordering::Relaxed)))
            .unwrap_or(WorkerPhase::Initial)
    }

    /// Latch the one-way shutdown flag.
    pub fn trigger_shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            debug!("shutdown flag set");
        }
    }

    /// Whether shutdown has been requested. Never clears once set.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
