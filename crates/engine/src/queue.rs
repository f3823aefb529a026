use std::collections::VecDeque;
use std::sync::Mutex;

use crate::api::Task;
use crate::state::SharedState;

/// FIFO of pending tasks.
///
/// Seeded entirely before workers start, then only drained; an empty pop is a
/// terminal condition for the caller, not a wait.
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the task's method and enqueue `copies` copies of it, bumping the
    /// shared total once per copy.
    pub fn append(&self, task: Task, copies: u64, state: &SharedState) {
        state.record_method(&task.method);
        let mut inner = self.inner.lock().expect("task queue poisoned");
        for _ in 0..copies {
            inner.push_back(task.clone());
            state.add_total();
        }
    }

    /// Non-blocking dequeue; `None` means the queue is drained.
    pub fn pop(&self) -> Option<Task> {
        self.inner.lock().expect("task queue poisoned").pop_front()
    }

    /// Number of tasks still enqueued.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("task queue poisoned").len()
    }

    /// Whether the queue holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
