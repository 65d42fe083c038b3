//! Delay timer: one thread firing cancelable actions at their deadlines.
//!
//! Entries live in a min-heap ordered by deadline (ties broken by insertion
//! order). The thread sleeps on a `parking_lot::Condvar` until the earliest
//! deadline or until a new, earlier entry arrives.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::core::error::SchedulerError;
use crate::core::handle::TaskHandle;

type TimerAction = Box<dyn FnOnce() + Send + 'static>;

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    handle: TaskHandle,
    action: TimerAction,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, the earliest deadline must pop first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct TimerState {
    entries: BinaryHeap<TimerEntry>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// Single-threaded delay timer.
pub struct DelayTimer {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DelayTimer {
    /// Spawn the timer thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ThreadSpawn`] if the OS refuses the thread.
    pub fn new(name: &str) -> Result<Self, SchedulerError> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            wake: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || timer_loop(&worker_shared))
            .map_err(|e| SchedulerError::ThreadSpawn {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Run `action` after `delay` unless `handle` is canceled first.
    ///
    /// Returns `false` if the timer has been shut down; the action is dropped.
    pub fn schedule<F>(&self, delay: Duration, handle: TaskHandle, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return false;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = Instant::now() + delay;
        let wakes_earlier = state
            .entries
            .peek()
            .is_none_or(|head| deadline < head.deadline);
        state.entries.push(TimerEntry {
            deadline,
            seq,
            handle,
            action: Box::new(action),
        });
        drop(state);
        if wakes_earlier {
            self.shared.wake.notify_one();
        }
        true
    }

    /// Number of entries not yet fired, canceled ones included.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Drop canceled entries whose deadline has not come yet.
    pub fn purge_canceled(&self) -> usize {
        let mut state = self.shared.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| !e.handle.is_canceled());
        before - state.entries.len()
    }

    /// Stop the thread, discarding pending entries.
    ///
    /// Joins the thread unless called from the timer thread itself.
    pub fn shutdown(&self) {
        let discarded = {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            std::mem::take(&mut state.entries)
        };
        self.shared.wake.notify_all();
        // Pending actions own tasks; drop them outside the lock.
        drop(discarded);

        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            debug!("delay timer shut down from its own thread; not joining");
            return;
        }
        if handle.join().is_err() {
            warn!("delay timer thread panicked");
        }
    }
}

impl Drop for DelayTimer {
    fn drop(&mut self) {
        // Signal only; joining here could block a worker that drops the last
        // scheduler reference.
        let discarded = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            std::mem::take(&mut state.entries)
        };
        self.shared.wake.notify_all();
        drop(discarded);
    }
}

fn timer_loop(shared: &TimerShared) {
    debug!("delay timer started");
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let now = Instant::now();
        match state.entries.peek().map(|e| e.deadline) {
            None => shared.wake.wait(&mut state),
            Some(deadline) if deadline > now => {
                shared.wake.wait_until(&mut state, deadline);
            }
            Some(_) => {
                let Some(entry) = state.entries.pop() else {
                    continue;
                };
                // Fire (or discard) without the lock: actions re-enter the scheduler.
                drop(state);
                if !entry.handle.is_canceled() {
                    (entry.action)();
                }
                state = shared.state.lock();
            }
        }
    }
    debug!("delay timer exiting");
}
