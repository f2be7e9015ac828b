//! Closable FIFO work queue for the initialization worker pool.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct QueueState<T> {
    jobs: VecDeque<T>,
    closed: bool,
}

/// FIFO queue with a termination signal. `get` blocks until a job arrives
/// and returns `None` only once the queue has been closed *and* drained.
pub struct JobQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Enqueue a job and wake one waiting consumer.
    pub fn put(&self, job: T) {
        let mut state = self.state.lock().unwrap();
        state.jobs.push_back(job);
        self.not_empty.notify_one();
    }

    /// Dequeue the next job, blocking while the queue is empty and still
    /// open. Jobs enqueued before `ended` are always drained.
    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Close the queue and wake every waiting consumer.
    pub fn ended(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.not_empty.notify_all();
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
