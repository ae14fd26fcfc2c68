//! Agent model — identity, status, capabilities, and running statistics.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Free to take a task.
    Idle,
    /// Running exactly one task.
    Busy,
    /// The executor crashed; waiting for the health monitor to recover it.
    Error,
    /// Taken out of rotation by an operator.
    Offline,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Error => "error",
            Self::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

/// Binding of one task to one agent for one dispatch attempt.
///
/// The lease id is unique per dispatch, so a completion that arrives after
/// the agent was reclaimed (and maybe handed the same task again) can be told
/// apart from the current assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub task_id: String,
    pub lease_id: u64,
}

/// Static description of an agent, used to build the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub capabilities: Vec<String>,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

fn default_max_concurrent_tasks() -> usize {
    1
}

impl AgentProfile {
    pub fn new<I, S>(name: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

/// The built-in roster of specialised agents.
pub fn default_roster() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new("WebScraper", ["scraping", "data_extraction", "screenshots"]),
        AgentProfile::new("FormFiller", ["form_filling", "authentication", "validation"]),
        AgentProfile::new("Tester", ["testing", "validation", "performance_monitoring"]),
        AgentProfile::new("Monitor", ["monitoring", "health_checks", "reporting"]),
        AgentProfile::new("GeneralPurpose", ["general", "backup", "flexible"]),
    ]
}

/// A worker in the pool.
///
/// `current_task` is `Some` exactly when `status` is `Busy`; the setters below
/// are the only places either field changes.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    pub current_task: Option<Lease>,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub total_execution_time: Duration,
    pub last_activity: DateTime<Utc>,
    pub capabilities: BTreeSet<String>,
    /// Only 1 is supported today; kept so multi-task agents can be added later.
    pub max_concurrent_tasks: usize,
}

impl Agent {
    pub fn from_profile(id: impl Into<String>, profile: AgentProfile) -> Self {
        Self {
            id: id.into(),
            name: profile.name,
            status: AgentStatus::Idle,
            current_task: None,
            completed_tasks: 0,
            failed_tasks: 0,
            total_execution_time: Duration::ZERO,
            last_activity: Utc::now(),
            capabilities: profile.capabilities.into_iter().collect(),
            max_concurrent_tasks: profile.max_concurrent_tasks.max(1),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    /// True when `lease` is the assignment this agent is currently running.
    pub fn holds(&self, lease: &Lease) -> bool {
        self.status == AgentStatus::Busy && self.current_task.as_ref() == Some(lease)
    }

    /// Success rate in percent; 0 when the agent has run nothing.
    pub fn success_rate(&self) -> f64 {
        let total = (self.completed_tasks + self.failed_tasks).max(1);
        self.completed_tasks as f64 / total as f64 * 100.0
    }

    /// Mean seconds per successful task.
    pub fn average_execution_time(&self) -> f64 {
        self.total_execution_time.as_secs_f64() / self.completed_tasks.max(1) as f64
    }

    pub(crate) fn assign(&mut self, lease: Lease, now: DateTime<Utc>) {
        self.status = AgentStatus::Busy;
        self.current_task = Some(lease);
        self.last_activity = now;
    }

    /// Record the end of the current task and free (or quarantine) the agent.
    pub(crate) fn finish(
        &mut self,
        succeeded: bool,
        elapsed: Duration,
        crashed: bool,
        now: DateTime<Utc>,
    ) {
        if succeeded {
            self.completed_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }
        self.total_execution_time += elapsed;
        self.status = if crashed {
            AgentStatus::Error
        } else {
            AgentStatus::Idle
        };
        self.current_task = None;
        self.last_activity = now;
    }

    /// Force the agent back to IDLE outside the completion path.
    pub(crate) fn reclaim(&mut self) -> Option<Lease> {
        self.status = AgentStatus::Idle;
        self.current_task.take()
    }

    pub(crate) fn set_status(&mut self, status: AgentStatus, now: DateTime<Utc>) {
        debug_assert!(status != AgentStatus::Busy, "use assign() to make an agent busy");
        self.status = status;
        self.current_task = None;
        self.last_activity = now;
    }
}
