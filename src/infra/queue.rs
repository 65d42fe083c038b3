//! In-memory queue with one FIFO per priority tier.

use std::collections::VecDeque;

use crate::core::task::{Task, TaskPriority};

/// Buffer of tasks admitted while the scheduler is paused.
///
/// Each [`TaskPriority`] has its own FIFO, so draining is strictly
/// High → Normal → Low and first-in-first-out within a tier. Push is O(1).
#[derive(Debug, Default)]
pub struct TieredQueue {
    tiers: [VecDeque<Task>; 3],
}

impl TieredQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the tier of its configured priority.
    pub fn push(&mut self, task: Task) {
        let tier = task.config().priority.tier();
        self.tiers[tier].push_back(task);
    }

    /// Remove all tasks in drain order.
    pub fn drain_in_priority_order(&mut self) -> Vec<Task> {
        let mut out = Vec::with_capacity(self.len());
        for priority in TaskPriority::DRAIN_ORDER {
            out.extend(self.tiers[priority.tier()].drain(..));
        }
        out
    }

    /// Take every buffered task with this id out of the queue.
    pub fn remove(&mut self, id: &str) -> Vec<Task> {
        let mut removed = Vec::new();
        for tier in &mut self.tiers {
            let (matching, kept): (VecDeque<Task>, VecDeque<Task>) =
                tier.drain(..).partition(|t| t.id() == id);
            *tier = kept;
            removed.extend(matching);
        }
        removed
    }

    /// Drop all buffered tasks.
    pub fn clear(&mut self) {
        for tier in &mut self.tiers {
            tier.clear();
        }
    }

    /// Number of buffered tasks in one tier.
    #[must_use]
    pub fn tier_len(&self, priority: TaskPriority) -> usize {
        self.tiers[priority.tier()].len()
    }

    /// Total number of buffered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }
}
