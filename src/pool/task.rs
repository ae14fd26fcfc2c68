//! Task model — priority, lifecycle timestamps, and outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PoolError;

/// Task priority. Ordering follows urgency: `Low < Normal < High < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    /// All priorities, lowest first.
    pub const ALL: [TaskPriority; 4] = [Self::Low, Self::Normal, Self::High, Self::Critical];
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// Final outcome of a task. Exactly one of payload or error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded { payload: serde_json::Value },
    Failed { error: String },
}

impl TaskOutcome {
    pub fn success(payload: serde_json::Value) -> Self {
        Self::Succeeded { payload }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Caller-supplied description of a task, as accepted by `submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// What the executor works against, e.g. a URL.
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Advisory timeout in seconds; must be positive.
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry_count: u32,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            target: String::new(),
            actions: Vec::new(),
            priority: TaskPriority::Normal,
            timeout_secs: 30,
            retry_count: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// A unit of work tracked by the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub target: String,
    pub actions: Vec<String>,
    pub priority: TaskPriority,
    pub timeout_secs: u64,
    /// Remaining retry budget.
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub assigned_agent: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: Option<TaskOutcome>,
}

impl Task {
    /// Validate a spec and turn it into a fresh, unassigned task.
    pub fn from_spec(spec: TaskSpec) -> Result<Self, PoolError> {
        let id = spec.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        if id.trim().is_empty() {
            return Err(PoolError::InvalidTask {
                id,
                reason: "id must not be blank".to_string(),
            });
        }
        if spec.name.trim().is_empty() {
            return Err(PoolError::InvalidTask {
                id,
                reason: "name must not be empty".to_string(),
            });
        }
        if spec.timeout_secs == 0 {
            return Err(PoolError::InvalidTask {
                id,
                reason: "timeout must be a positive number of seconds".to_string(),
            });
        }

        Ok(Self {
            id,
            name: spec.name,
            description: spec.description,
            target: spec.target,
            actions: spec.actions,
            priority: spec.priority,
            timeout_secs: spec.timeout_secs,
            retry_count: spec.retry_count,
            created_at: Utc::now(),
            assigned_agent: None,
            started_at: None,
            completed_at: None,
            outcome: None,
        })
    }

    /// Success payload, if the task succeeded.
    pub fn result(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            Some(TaskOutcome::Succeeded { payload }) => Some(payload),
            _ => None,
        }
    }

    /// Failure reason, if the task failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Some(TaskOutcome::Failed { error }) => Some(error),
            _ => None,
        }
    }

    pub(crate) fn mark_started(&mut self, agent_id: &str, now: DateTime<Utc>) {
        self.assigned_agent = Some(agent_id.to_string());
        self.started_at = Some(now);
    }

    pub(crate) fn mark_completed(&mut self, outcome: TaskOutcome, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        self.outcome = Some(outcome);
    }

    /// Clear assignment fields so the task can be queued again.
    pub(crate) fn reset_for_retry(&mut self) {
        self.retry_count = self.retry_count.saturating_sub(1);
        self.assigned_agent = None;
        self.started_at = None;
    }
}
