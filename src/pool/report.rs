//! Status report snapshot types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::agent::{Agent, AgentStatus};
use super::task::TaskPriority;

/// Per-agent line of the status report.
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    pub current_task: Option<String>,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// Percent.
    pub success_rate: f64,
    /// Seconds per successful task.
    pub average_execution_time: f64,
    pub capabilities: Vec<String>,
}

impl AgentReport {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            status: agent.status,
            current_task: agent.current_task.as_ref().map(|l| l.task_id.clone()),
            completed_tasks: agent.completed_tasks,
            failed_tasks: agent.failed_tasks,
            success_rate: agent.success_rate(),
            average_execution_time: agent.average_execution_time(),
            capabilities: agent.capabilities.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSummary {
    pub pending_tasks: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    /// Pending tasks per priority; every priority is present.
    pub tasks_by_priority: BTreeMap<TaskPriority, usize>,
}

/// Aggregate pool statistics.
///
/// `completed_tasks` counts successes only; `failed_tasks` counts failures,
/// including crashes. Late completions of reclaimed tasks count here too.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatistics {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub average_execution_time: f64,
    pub runtime_seconds: f64,
    pub tasks_per_minute: f64,
    /// Percent of submitted tasks that succeeded.
    pub success_rate: f64,
    pub active_agents: usize,
    pub idle_agents: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub agents: Vec<AgentReport>,
    pub queue: QueueSummary,
    pub statistics: PoolStatistics,
    pub timestamp: DateTime<Utc>,
}

impl StatusReport {
    /// Pretty JSON for dumping to disk or a log.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty JSON.
    pub async fn write_to(&self, path: impl AsRef<std::path::Path>) -> crate::error::Result<()> {
        let json = self.to_json_pretty()?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::agent::AgentProfile;

    fn report() -> StatusReport {
        let mut agent = Agent::from_profile("agent_1", AgentProfile::new("Tester", ["testing"]));
        agent.completed_tasks = 3;
        agent.failed_tasks = 1;
        agent.total_execution_time = std::time::Duration::from_secs(6);

        StatusReport {
            agents: vec![AgentReport::from_agent(&agent)],
            queue: QueueSummary {
                pending_tasks: 1,
                active_tasks: 0,
                completed_tasks: 4,
                tasks_by_priority: TaskPriority::ALL.iter().map(|p| (*p, 0)).collect(),
            },
            statistics: PoolStatistics {
                total_tasks: 5,
                completed_tasks: 3,
                failed_tasks: 1,
                average_execution_time: 2.0,
                runtime_seconds: 60.0,
                tasks_per_minute: 3.0,
                success_rate: 60.0,
                active_agents: 0,
                idle_agents: 1,
            },
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn agent_report_rates() {
        let report = report();
        assert_eq!(report.agents[0].success_rate, 75.0);
        assert_eq!(report.agents[0].average_execution_time, 2.0);
    }

    #[test]
    fn serializes_priorities_as_keys() {
        let json: serde_json::Value =
            serde_json::from_str(&report().to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["queue"]["tasks_by_priority"]["CRITICAL"], 0);
        assert_eq!(json["agents"][0]["status"], "idle");
        assert_eq!(json["statistics"]["total_tasks"], 5);
    }

    #[tokio::test]
    async fn writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report().write_to(&path).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("\"tasks_per_minute\""));
    }
}
