//! Health monitor — reclaims stuck agents and recovers errored ones.
//!
//! Every sweep:
//! 1. BUSY agents silent for longer than the stuck threshold go back to IDLE
//! 2. ERROR agents quiet for longer than the recovery threshold go back to IDLE
//!
//! The sweep itself only touches agents. The pool then resolves each
//! reclaimed lease (requeue, or leave it active for a late completion)
//! under the same lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::agent::{Agent, AgentStatus, Lease};
use super::manager::PoolShared;
use super::state::{PoolState, ReclaimResolution};

#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub stuck: Duration,
    pub error_recovery: Duration,
}

/// Agents changed by one sweep.
#[derive(Debug, Default)]
pub struct HealthSweep {
    /// (agent id, lease it was holding)
    pub reclaimed: Vec<(String, Lease)>,
    pub recovered: Vec<String>,
}

impl HealthSweep {
    pub fn is_empty(&self) -> bool {
        self.reclaimed.is_empty() && self.recovered.is_empty()
    }
}

fn silent_for_longer_than(agent: &Agent, threshold: Duration, now: DateTime<Utc>) -> bool {
    (now - agent.last_activity)
        .to_std()
        .is_ok_and(|silence| silence > threshold)
}

/// Repair agent availability. IDLE and OFFLINE agents are never touched.
pub fn sweep_agents<'a>(
    agents: impl Iterator<Item = &'a mut Agent>,
    thresholds: HealthThresholds,
    now: DateTime<Utc>,
) -> HealthSweep {
    let mut sweep = HealthSweep::default();

    for agent in agents {
        match agent.status {
            AgentStatus::Busy if silent_for_longer_than(agent, thresholds.stuck, now) => {
                warn!(agent_id = %agent.id, "Agent appears stuck, reclaiming");
                if let Some(lease) = agent.reclaim() {
                    sweep.reclaimed.push((agent.id.clone(), lease));
                }
            }
            AgentStatus::Error if silent_for_longer_than(agent, thresholds.error_recovery, now) => {
                info!(agent_id = %agent.id, "Recovering agent from error state");
                agent.status = AgentStatus::Idle;
                sweep.recovered.push(agent.id.clone());
            }
            AgentStatus::Idle | AgentStatus::Busy | AgentStatus::Error | AgentStatus::Offline => {}
        }
    }

    sweep
}

/// Sweep the pool and settle the tasks of reclaimed agents.
pub fn run_sweep(
    state: &mut PoolState,
    thresholds: HealthThresholds,
    requeue_stuck_tasks: bool,
    now: DateTime<Utc>,
) -> HealthSweep {
    let sweep = sweep_agents(state.agents_mut(), thresholds, now);

    for (agent_id, lease) in &sweep.reclaimed {
        match state.resolve_reclaimed(lease, requeue_stuck_tasks) {
            ReclaimResolution::Requeued { remaining_retries } => info!(
                task_id = %lease.task_id,
                agent_id = %agent_id,
                remaining_retries,
                "Requeued task from stuck agent"
            ),
            ReclaimResolution::Orphaned => warn!(
                task_id = %lease.task_id,
                agent_id = %agent_id,
                "Task left running on stuck agent; awaiting late completion"
            ),
            ReclaimResolution::Missing => {}
        }
    }

    sweep
}

/// Spawn the health monitor loop. Exits when `shutdown` is cancelled.
pub(crate) fn spawn_health_monitor(
    shared: Arc<PoolShared>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = shared.config.health_check_interval;
        let thresholds = HealthThresholds {
            stuck: shared.config.stuck_threshold,
            error_recovery: shared.config.error_recovery_threshold,
        };
        info!("Health monitor started (interval: {:?})", interval);

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {}
            }

            let mut state = shared.state.write().await;
            run_sweep(
                &mut state,
                thresholds,
                shared.config.requeue_stuck_tasks,
                Utc::now(),
            );
        }

        info!("Health monitor stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::agent::AgentProfile;
    use crate::pool::selector::Selector;
    use crate::pool::state::TaskLocation;
    use crate::pool::task::{Task, TaskSpec};

    const THRESHOLDS: HealthThresholds = HealthThresholds {
        stuck: Duration::from_secs(30),
        error_recovery: Duration::from_secs(10),
    };

    fn pool(retries: u32) -> PoolState {
        let mut state = PoolState::new();
        state.add_agent(Agent::from_profile("a1", AgentProfile::new("A", ["general"])));
        state
            .submit(vec![
                Task::from_spec(TaskSpec::new("t1", "").with_id("t1").with_retry_count(retries))
                    .unwrap(),
            ])
            .unwrap();
        state
    }

    #[test]
    fn stuck_agent_is_reclaimed_and_selectable() {
        let mut state = pool(0);
        let start = Utc::now();
        state.assign_batch(&Selector::default(), start);

        // Not yet past the threshold.
        let early = run_sweep(&mut state, THRESHOLDS, true, start + chrono::Duration::seconds(20));
        assert!(early.is_empty());
        assert_eq!(state.agent("a1").unwrap().status, AgentStatus::Busy);

        let sweep = run_sweep(&mut state, THRESHOLDS, true, start + chrono::Duration::seconds(31));
        assert_eq!(sweep.reclaimed.len(), 1);
        assert_eq!(sweep.reclaimed[0].1.task_id, "t1");

        let agent = state.agent("a1").unwrap();
        assert!(agent.is_idle());
        assert!(agent.current_task.is_none());
        assert_eq!(state.idle_agent_ids(), vec!["a1".to_string()]);
    }

    #[test]
    fn reclaimed_task_is_requeued_while_budget_lasts() {
        let mut state = pool(1);
        let start = Utc::now();
        state.assign_batch(&Selector::default(), start);

        run_sweep(&mut state, THRESHOLDS, true, start + chrono::Duration::seconds(31));
        let snapshot = state.locate("t1").unwrap();
        assert_eq!(snapshot.location, TaskLocation::Queued);
        assert_eq!(snapshot.task.retry_count, 0);
        assert!(snapshot.task.assigned_agent.is_none());
    }

    #[test]
    fn requeue_can_be_disabled() {
        let mut state = pool(3);
        let start = Utc::now();
        state.assign_batch(&Selector::default(), start);

        run_sweep(&mut state, THRESHOLDS, false, start + chrono::Duration::seconds(31));
        assert_eq!(state.locate("t1").unwrap().location, TaskLocation::Active);
        assert!(state.agent("a1").unwrap().is_idle());
        assert!(state.queue().is_empty());
    }

    #[test]
    fn error_agent_recovers_after_threshold() {
        let mut agent = Agent::from_profile("a1", AgentProfile::new("A", ["general"]));
        let start = Utc::now();
        agent.set_status(AgentStatus::Error, start);

        let sweep = sweep_agents(
            std::iter::once(&mut agent),
            THRESHOLDS,
            start + chrono::Duration::seconds(5),
        );
        assert!(sweep.recovered.is_empty());
        assert_eq!(agent.status, AgentStatus::Error);

        let sweep = sweep_agents(
            std::iter::once(&mut agent),
            THRESHOLDS,
            start + chrono::Duration::seconds(11),
        );
        assert_eq!(sweep.recovered, vec!["a1".to_string()]);
        assert!(agent.is_idle());
    }

    #[test]
    fn idle_and_offline_agents_untouched() {
        let start = Utc::now();
        let mut idle = Agent::from_profile("idle", AgentProfile::new("A", ["general"]));
        idle.last_activity = start - chrono::Duration::hours(1);
        let mut offline = Agent::from_profile("off", AgentProfile::new("B", ["general"]));
        offline.set_status(AgentStatus::Offline, start - chrono::Duration::hours(1));

        let sweep = sweep_agents([&mut idle, &mut offline].into_iter(), THRESHOLDS, start);
        assert!(sweep.is_empty());
        assert_eq!(idle.status, AgentStatus::Idle);
        assert_eq!(offline.status, AgentStatus::Offline);
    }
}
