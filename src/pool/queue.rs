//! Priority task queue.
//!
//! Highest priority first, FIFO among equal priorities. The queue itself is
//! not synchronised; it lives inside the pool state lock so enqueue and
//! batch dequeue are mutually exclusive.

use std::collections::VecDeque;

use super::task::{Task, TaskPriority};

#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
    total_submitted: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly submitted task. Counts toward `total_submitted`.
    pub fn enqueue(&mut self, task: Task) {
        self.total_submitted += 1;
        self.insert(task);
    }

    /// Put a task back (retry after reclaim). Not counted as a new submission.
    pub fn requeue(&mut self, task: Task) {
        self.insert(task);
    }

    /// Insert behind every task of equal or higher priority. Same order as
    /// appending and stable-sorting by descending priority.
    fn insert(&mut self, task: Task) {
        let pos = self
            .tasks
            .iter()
            .position(|queued| queued.priority < task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(pos, task);
    }

    /// Remove up to `n` tasks from the front.
    pub fn dequeue_batch(&mut self, n: usize) -> Vec<Task> {
        let n = n.min(self.tasks.len());
        self.tasks.drain(..n).collect()
    }

    /// Return tasks to the front, keeping their relative order.
    pub(crate) fn restore_front(&mut self, tasks: Vec<Task>) {
        for task in tasks.into_iter().rev() {
            self.tasks.push_front(task);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn total_submitted(&self) -> u64 {
        self.total_submitted
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.get(task_id).is_some()
    }

    pub fn count_by_priority(&self, priority: TaskPriority) -> usize {
        self.tasks.iter().filter(|t| t.priority == priority).count()
    }
}
