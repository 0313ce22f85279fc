//! Thread-safe FIFO of truth records shared between the network tasks and
//! the main loop.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Deserialize;
use thiserror::Error;
use truth_proto::TruthRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("truth queue is closed")]
pub struct QueueClosed;

/// What a bounded queue does when a push finds it full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued record. The newest `capacity` records are
    /// always retained.
    #[default]
    DropOldest,
    /// Block the producer until the consumer drains or the queue closes.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    DroppedOldest,
}

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<TruthRecord>,
    closed: bool,
    dropped: u64,
}

#[derive(Debug)]
pub struct TruthQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
    policy: OverflowPolicy,
}

impl TruthQueue {
    pub fn unbounded() -> Self {
        Self::with_limits(None, OverflowPolicy::default())
    }

    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        Self::with_limits(Some(capacity.max(1)), policy)
    }

    pub fn with_limits(capacity: Option<usize>, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.map(|c| c.max(1)),
            policy,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn push(&self, record: TruthRecord) -> Result<PushOutcome, QueueClosed> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueClosed);
        }

        let mut outcome = PushOutcome::Queued;
        if let Some(capacity) = self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    while state.records.len() >= capacity {
                        state.records.pop_front();
                        state.dropped += 1;
                        outcome = PushOutcome::DroppedOldest;
                    }
                }
                OverflowPolicy::Block => {
                    while state.records.len() >= capacity && !state.closed {
                        self.not_full.wait(&mut state);
                    }
                    if state.closed {
                        return Err(QueueClosed);
                    }
                }
            }
        }

        state.records.push_back(record);
        drop(state);
        self.not_empty.notify_one();
        Ok(outcome)
    }

    /// Remove and return everything queued, oldest first.
    pub fn drain_all(&self) -> Vec<TruthRecord> {
        let mut state = self.state.lock();
        let drained: Vec<TruthRecord> = state.records.drain(..).collect();
        drop(state);
        if !drained.is_empty() {
            self.not_full.notify_all();
        }
        drained
    }

    /// Wait up to `timeout` for records, then drain. Returns `None` once the
    /// queue is closed and empty; an empty vector means the wait timed out.
    pub fn wait_drain(&self, timeout: Duration) -> Option<Vec<TruthRecord>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.records.is_empty() && !state.closed {
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        if state.records.is_empty() && state.closed {
            return None;
        }
        let drained: Vec<TruthRecord> = state.records.drain(..).collect();
        drop(state);
        if !drained.is_empty() {
            self.not_full.notify_all();
        }
        Some(drained)
    }

    /// Refuse further pushes and wake every waiter. Queued records stay
    /// available to `drain_all`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records discarded by the drop-oldest policy since creation.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

impl Default for TruthQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}
