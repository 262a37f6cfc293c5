use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Bounded FIFO of outbound messages, drained by one worker.
///
/// `push` never blocks: when full, the oldest pending message is evicted
/// and handed back to the caller.
#[derive(Debug)]
pub struct PublishQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<String>,
    stopping: bool,
}

impl PublishQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a message. Returns the evicted message on overflow.
    pub fn push(&self, message: String) -> Option<String> {
        let mut state = self.lock();
        let evicted = if state.messages.len() >= self.capacity {
            state.messages.pop_front()
        } else {
            None
        };
        state.messages.push_back(message);
        self.ready.notify_one();
        evicted
    }

    /// Block until a message is available or stop is requested.
    ///
    /// Returns `None` once stopping, even if messages are still pending.
    pub fn next(&self) -> Option<String> {
        let state = self.lock();
        let mut state = self
            .ready
            .wait_while(state, |s| s.messages.is_empty() && !s.stopping)
            .unwrap_or_else(PoisonError::into_inner);
        if state.stopping {
            return None;
        }
        state.messages.pop_front()
    }

    pub fn request_stop(&self) {
        self.lock().stopping = true;
        self.ready.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.lock().stopping
    }

    /// Accept work again after a stop.
    pub fn reset(&self) {
        self.lock().stopping = false;
    }

    /// Drop everything still pending. Returns how many were dropped.
    pub fn discard_pending(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.messages.len();
        state.messages.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
