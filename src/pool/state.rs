//! Pool state — agents, queue, active set, and completed list.
//!
//! Every method here runs under the pool's single `RwLock`, so a task moves
//! between queued, active, and completed in one step and an agent's status
//! and current task always change together.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::agent::{Agent, AgentStatus, Lease};
use super::executor::ExecutionContext;
use super::queue::TaskQueue;
use super::report::{AgentReport, PoolStatistics, QueueSummary, StatusReport};
use super::selector::Selector;
use super::task::{Task, TaskOutcome, TaskPriority};
use crate::error::PoolError;

/// Where a task currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLocation {
    Queued,
    Active,
    Completed,
}

/// A task and where it was found.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub location: TaskLocation,
    pub task: Task,
}

/// A task handed to an agent by the dispatcher.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub agent_id: String,
    pub lease: Lease,
    pub context: ExecutionContext,
    pub task: Task,
}

/// What happened to a completion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDisposition {
    /// Task moved to completed; agent updated if it still held the lease.
    Recorded { succeeded: bool, agent_updated: bool },
    /// The lease was no longer active; nothing changed.
    Stale,
}

/// What happened to the task of a reclaimed agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimResolution {
    /// Back in the queue with this much retry budget left.
    Requeued { remaining_retries: u32 },
    /// Left active under its lease; a late completion still records it.
    Orphaned,
    /// The task was no longer active under that lease.
    Missing,
}

#[derive(Debug)]
struct ActiveTask {
    task: Task,
    lease_id: u64,
}

#[derive(Debug)]
pub struct PoolState {
    agents: HashMap<String, Agent>,
    /// Agent ids in roster order; selection and reports iterate this.
    agent_order: Vec<String>,
    queue: TaskQueue,
    active: HashMap<String, ActiveTask>,
    completed: Vec<Task>,
    next_lease: u64,
    succeeded: u64,
    failed: u64,
    started_at: DateTime<Utc>,
}

impl PoolState {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            agent_order: Vec::new(),
            queue: TaskQueue::new(),
            active: HashMap::new(),
            completed: Vec::new(),
            next_lease: 1,
            succeeded: 0,
            failed: 0,
            started_at: Utc::now(),
        }
    }

    // ── Agents ──────────────────────────────────────────────────────────

    pub fn add_agent(&mut self, agent: Agent) {
        if !self.agents.contains_key(&agent.id) {
            self.agent_order.push(agent.id.clone());
        }
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    /// Agents in roster order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agent_order.iter().filter_map(|id| self.agents.get(id))
    }

    pub(crate) fn agents_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    pub fn idle_agent_ids(&self) -> Vec<String> {
        self.agents()
            .filter(|a| a.is_idle())
            .map(|a| a.id.clone())
            .collect()
    }

    pub(crate) fn reset_clock(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
    }

    /// Take an agent out of rotation. Refused while it is running a task.
    pub fn set_offline(&mut self, agent_id: &str, now: DateTime<Utc>) -> Result<(), PoolError> {
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| PoolError::AgentNotFound {
                id: agent_id.to_string(),
            })?;

        if let Some(lease) = &agent.current_task {
            return Err(PoolError::AgentBusy {
                id: agent_id.to_string(),
                task_id: lease.task_id.clone(),
            });
        }
        agent.set_status(AgentStatus::Offline, now);
        Ok(())
    }

    /// Return an offline agent to IDLE. Other states are left alone.
    pub fn set_online(&mut self, agent_id: &str, now: DateTime<Utc>) -> Result<bool, PoolError> {
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| PoolError::AgentNotFound {
                id: agent_id.to_string(),
            })?;

        if agent.status != AgentStatus::Offline {
            return Ok(false);
        }
        agent.set_status(AgentStatus::Idle, now);
        Ok(true)
    }

    // ── Tasks ───────────────────────────────────────────────────────────

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    pub fn contains_task(&self, task_id: &str) -> bool {
        self.queue.contains(task_id)
            || self.active.contains_key(task_id)
            || self.completed.iter().any(|t| t.id == task_id)
    }

    /// Enqueue new tasks. All or nothing: a duplicate id rejects the whole batch.
    pub fn submit(&mut self, tasks: Vec<Task>) -> Result<(), PoolError> {
        for (i, task) in tasks.iter().enumerate() {
            let repeated_in_batch = tasks[..i].iter().any(|t| t.id == task.id);
            if repeated_in_batch || self.contains_task(&task.id) {
                return Err(PoolError::DuplicateTask {
                    id: task.id.clone(),
                });
            }
        }
        for task in tasks {
            self.queue.enqueue(task);
        }
        Ok(())
    }

    pub fn locate(&self, task_id: &str) -> Option<TaskSnapshot> {
        if let Some(task) = self.queue.get(task_id) {
            return Some(TaskSnapshot {
                location: TaskLocation::Queued,
                task: task.clone(),
            });
        }
        if let Some(active) = self.active.get(task_id) {
            return Some(TaskSnapshot {
                location: TaskLocation::Active,
                task: active.task.clone(),
            });
        }
        self.completed
            .iter()
            .find(|t| t.id == task_id)
            .map(|task| TaskSnapshot {
                location: TaskLocation::Completed,
                task: task.clone(),
            })
    }

    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.active.is_empty()
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Pair up to min(queue, idle agents) tasks with agents.
    ///
    /// Each chosen agent leaves the candidate set before the next task is
    /// matched, so no agent gets two tasks from one batch.
    pub fn assign_batch(&mut self, selector: &Selector, now: DateTime<Utc>) -> Vec<Dispatch> {
        let mut idle = self.idle_agent_ids();
        let k = self.queue.len().min(idle.len());
        if k == 0 {
            return Vec::new();
        }

        let mut batch = self.queue.dequeue_batch(k).into_iter();
        let mut dispatches = Vec::with_capacity(k);

        while let Some(task) = batch.next() {
            let chosen = {
                let candidates: Vec<&Agent> =
                    idle.iter().filter_map(|id| self.agents.get(id)).collect();
                selector.select(&task, &candidates)
            };
            let Some(agent_id) = chosen else {
                // Out of candidates: put this task and the rest back in order.
                let mut leftover = vec![task];
                leftover.extend(batch);
                self.queue.restore_front(leftover);
                break;
            };
            idle.retain(|id| *id != agent_id);
            dispatches.push(self.start_task(task, &agent_id, now));
        }

        dispatches
    }

    fn start_task(&mut self, mut task: Task, agent_id: &str, now: DateTime<Utc>) -> Dispatch {
        let lease = Lease {
            task_id: task.id.clone(),
            lease_id: self.next_lease,
        };
        self.next_lease += 1;

        let context = match self.agents.get_mut(agent_id) {
            Some(agent) => {
                agent.assign(lease.clone(), now);
                ExecutionContext {
                    agent_id: agent.id.clone(),
                    agent_name: agent.name.clone(),
                    capabilities: agent.capabilities.iter().cloned().collect(),
                }
            }
            None => ExecutionContext {
                agent_id: agent_id.to_string(),
                agent_name: String::new(),
                capabilities: Vec::new(),
            },
        };

        task.mark_started(agent_id, now);
        self.active.insert(
            task.id.clone(),
            ActiveTask {
                task: task.clone(),
                lease_id: lease.lease_id,
            },
        );

        Dispatch {
            agent_id: agent_id.to_string(),
            lease,
            context,
            task,
        }
    }

    // ── Completion ──────────────────────────────────────────────────────

    /// Apply an executor result.
    ///
    /// Only a completion whose lease is still active touches the task, and
    /// only an agent still holding that lease has its fields updated.
    pub fn complete(
        &mut self,
        agent_id: &str,
        lease: &Lease,
        outcome: TaskOutcome,
        elapsed: Duration,
        crashed: bool,
        now: DateTime<Utc>,
    ) -> CompletionDisposition {
        let lease_active = self
            .active
            .get(&lease.task_id)
            .is_some_and(|a| a.lease_id == lease.lease_id);
        if !lease_active {
            return CompletionDisposition::Stale;
        }
        let Some(ActiveTask { mut task, .. }) = self.active.remove(&lease.task_id) else {
            return CompletionDisposition::Stale;
        };

        let succeeded = outcome.is_success();
        task.mark_completed(outcome, now);
        self.completed.push(task);
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }

        let agent_updated = match self.agents.get_mut(agent_id) {
            Some(agent) if agent.holds(lease) => {
                agent.finish(succeeded, elapsed, crashed, now);
                true
            }
            _ => false,
        };

        CompletionDisposition::Recorded {
            succeeded,
            agent_updated,
        }
    }

    /// Decide the fate of the task a reclaimed agent was running.
    ///
    /// With `requeue` and retry budget left, the task goes back to the queue
    /// under a fresh lease later. Otherwise it stays active under the old
    /// lease until its executor reports.
    pub fn resolve_reclaimed(&mut self, lease: &Lease, requeue: bool) -> ReclaimResolution {
        let Some(active) = self.active.get(&lease.task_id) else {
            return ReclaimResolution::Missing;
        };
        if active.lease_id != lease.lease_id {
            return ReclaimResolution::Missing;
        }
        if !requeue || active.task.retry_count == 0 {
            return ReclaimResolution::Orphaned;
        }

        let Some(ActiveTask { mut task, .. }) = self.active.remove(&lease.task_id) else {
            return ReclaimResolution::Missing;
        };
        task.reset_for_retry();
        let remaining_retries = task.retry_count;
        self.queue.requeue(task);
        ReclaimResolution::Requeued { remaining_retries }
    }

    // ── Reporting ───────────────────────────────────────────────────────

    pub fn statistics(&self, now: DateTime<Utc>) -> PoolStatistics {
        let total_execution: Duration = self.agents.values().map(|a| a.total_execution_time).sum();
        let average_execution_time = if self.succeeded > 0 {
            total_execution.as_secs_f64() / self.succeeded as f64
        } else {
            0.0
        };

        let runtime_seconds = (now - self.started_at)
            .to_std()
            .unwrap_or_default()
            .as_secs_f64();
        let tasks_per_minute = self.succeeded as f64 / (runtime_seconds / 60.0).max(1.0);

        let total_tasks = self.queue.total_submitted();
        let success_rate = if total_tasks > 0 {
            self.succeeded as f64 / total_tasks as f64 * 100.0
        } else {
            0.0
        };

        PoolStatistics {
            total_tasks,
            completed_tasks: self.succeeded,
            failed_tasks: self.failed,
            average_execution_time,
            runtime_seconds,
            tasks_per_minute,
            success_rate,
            active_agents: self
                .agents
                .values()
                .filter(|a| a.status == AgentStatus::Busy)
                .count(),
            idle_agents: self.agents.values().filter(|a| a.is_idle()).count(),
        }
    }

    pub fn queue_summary(&self) -> QueueSummary {
        QueueSummary {
            pending_tasks: self.queue.len(),
            active_tasks: self.active.len(),
            completed_tasks: self.completed.len(),
            tasks_by_priority: TaskPriority::ALL
                .iter()
                .map(|p| (*p, self.queue.count_by_priority(*p)))
                .collect(),
        }
    }

    pub fn status_report(&self, now: DateTime<Utc>) -> StatusReport {
        StatusReport {
            agents: self.agents().map(AgentReport::from_agent).collect(),
            queue: self.queue_summary(),
            statistics: self.statistics(now),
            timestamp: now,
        }
    }
}

impl Default for PoolState {
    fn default() -> Self {
        Self::new()
    }
}
