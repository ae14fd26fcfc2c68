//! Executor boundary — what actually performs a task.
//!
//! The pool treats execution as an opaque async call. An executor reports
//! a task that ran and failed as `Ok(TaskOutcome::Failed { .. })`; returning
//! `Err` (or panicking) says the worker itself is unhealthy.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use tracing::info;

use super::task::{Task, TaskOutcome, TaskPriority};
use crate::error::ExecutorError;

/// Identity of the agent an execution runs on.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub agent_id: String,
    pub agent_name: String,
    pub capabilities: Vec<String>,
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `task` on behalf of the agent in `ctx`. `task.timeout_secs` is advisory.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        task: &Task,
    ) -> Result<TaskOutcome, ExecutorError>;
}

/// Stand-in executor that sleeps and succeeds most of the time.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    max_delay: Duration,
    success_rate: f64,
    critical_success_rate: f64,
}

impl SimulatedExecutor {
    pub fn new(max_delay: Duration) -> Self {
        Self {
            max_delay,
            success_rate: 0.9,
            critical_success_rate: 0.95,
        }
    }

    /// Override the success probabilities (clamped to `0.0..=1.0`).
    pub fn with_success_rates(mut self, normal: f64, critical: f64) -> Self {
        self.success_rate = normal.clamp(0.0, 1.0);
        self.critical_success_rate = critical.clamp(0.0, 1.0);
        self
    }

    fn delay_for(&self, task: &Task) -> Duration {
        Duration::from_secs(task.timeout_secs).min(self.max_delay)
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        task: &Task,
    ) -> Result<TaskOutcome, ExecutorError> {
        info!(agent_id = %ctx.agent_id, task = %task.name, "Executing task");

        let delay = self.delay_for(task);
        tokio::time::sleep(delay).await;

        let rate = if task.priority == TaskPriority::Critical {
            self.critical_success_rate
        } else {
            self.success_rate
        };
        let succeeded = rand::thread_rng().gen_bool(rate);

        if succeeded {
            let screenshots: Vec<String> = (0..2)
                .map(|i| format!("screenshot_{}_{}.png", task.id, i))
                .collect();
            Ok(TaskOutcome::success(json!({
                "execution_time": delay.as_secs_f64(),
                "actions_completed": task.actions.len(),
                "data": format!("Mock result for task {}", task.name),
                "screenshots": screenshots,
            })))
        } else {
            Ok(TaskOutcome::failure(format!(
                "Mock error in task {}",
                task.name
            )))
        }
    }
}
