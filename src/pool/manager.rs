//! Agent manager — the public facade over the pool.
//!
//! Owns the shared pool state and the three background loops (dispatcher,
//! health monitor, performance tracker). `start` and `stop` are idempotent;
//! stopping cancels the loops but lets in-flight executions finish and
//! record their results.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::agent::{Agent, AgentProfile, default_roster};
use super::dispatcher::spawn_dispatcher;
use super::executor::Executor;
use super::health::spawn_health_monitor;
use super::report::{PoolStatistics, StatusReport};
use super::selector::Selector;
use super::state::{PoolState, TaskSnapshot};
use super::task::{Task, TaskSpec};
use super::tracker::spawn_performance_tracker;
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};

/// State shared by the manager, the loops, and every in-flight execution.
pub(crate) struct PoolShared {
    pub(crate) config: PoolConfig,
    pub(crate) state: RwLock<PoolState>,
    pub(crate) selector: Selector,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) last_sample: RwLock<Option<PoolStatistics>>,
}

/// Handles of the running loops.
struct RunningLoops {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Distributes tasks across a fixed pool of agents.
pub struct AgentManager {
    shared: Arc<PoolShared>,
    loops: Mutex<Option<RunningLoops>>,
}

impl AgentManager {
    /// Create a manager with the default keyword-based selector.
    pub fn new(config: PoolConfig, executor: Arc<dyn Executor>) -> Result<Self> {
        Self::with_selector(config, executor, Selector::default())
    }

    /// Create a manager with a custom selector (e.g. another capability inference).
    pub fn with_selector(
        config: PoolConfig,
        executor: Arc<dyn Executor>,
        selector: Selector,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                state: RwLock::new(PoolState::new()),
                selector,
                executor,
                last_sample: RwLock::new(None),
            }),
            loops: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Populate the pool from `roster` (or the built-in one), up to `max_agents`.
    ///
    /// Agent ids are `agent_1`, `agent_2`, …. Calling again once agents exist
    /// is a no-op. Returns the pool size.
    pub async fn initialize(&self, roster: Option<Vec<AgentProfile>>) -> Result<usize> {
        let mut state = self.shared.state.write().await;
        if state.agent_count() > 0 {
            warn!("Agent pool already initialized");
            return Ok(state.agent_count());
        }

        let roster = roster.unwrap_or_else(default_roster);
        let size = self.shared.config.max_agents.min(roster.len());
        info!("Initializing {} agents...", size);

        for (i, profile) in roster.into_iter().take(size).enumerate() {
            state.add_agent(Agent::from_profile(format!("agent_{}", i + 1), profile));
        }
        if state.agent_count() == 0 {
            return Err(PoolError::NoAgents.into());
        }
        state.reset_clock(Utc::now());

        info!("Agent pool initialized with {} agents", state.agent_count());
        Ok(state.agent_count())
    }

    /// Queue one task. Returns its id; never waits for execution.
    pub async fn submit(&self, spec: TaskSpec) -> Result<String> {
        let task = Task::from_spec(spec)?;
        let (id, name, priority) = (task.id.clone(), task.name.clone(), task.priority);

        self.shared.state.write().await.submit(vec![task])?;

        info!(task_id = %id, priority = %priority, "Task added to queue: {}", name);
        Ok(id)
    }

    /// Queue several tasks at once. Either all are queued or none are.
    pub async fn submit_batch(&self, specs: Vec<TaskSpec>) -> Result<Vec<String>> {
        let tasks = specs
            .into_iter()
            .map(Task::from_spec)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        self.shared.state.write().await.submit(tasks)?;

        info!(count = ids.len(), "Added tasks to queue");
        Ok(ids)
    }

    /// Launch the background loops. Returns `false` if they were already running.
    pub async fn start(&self) -> Result<bool> {
        let mut loops = self.loops.lock().await;
        if loops.is_some() {
            warn!("Agent manager is already running");
            return Ok(false);
        }
        if self.shared.state.read().await.agent_count() == 0 {
            return Err(PoolError::NoAgents.into());
        }

        info!("Starting multi-agent execution system...");
        let shutdown = CancellationToken::new();
        let handles = vec![
            spawn_dispatcher(Arc::clone(&self.shared), shutdown.child_token()),
            spawn_health_monitor(Arc::clone(&self.shared), shutdown.child_token()),
            spawn_performance_tracker(Arc::clone(&self.shared), shutdown.child_token()),
        ];
        *loops = Some(RunningLoops { shutdown, handles });
        Ok(true)
    }

    /// Stop the loops and wait for them to exit. In-flight executions keep
    /// running. Returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.loops.lock().await.take() else {
            return false;
        };

        info!("Stopping multi-agent execution system...");
        running.shutdown.cancel();
        for result in join_all(running.handles).await {
            if let Err(e) = result {
                warn!("Background loop ended abnormally: {e}");
            }
        }
        true
    }

    pub async fn is_running(&self) -> bool {
        self.loops.lock().await.is_some()
    }

    /// Consistent snapshot of agents, queue, and statistics.
    pub async fn status_report(&self) -> StatusReport {
        self.shared.state.read().await.status_report(Utc::now())
    }

    /// Latest sample taken by the performance tracker, if any.
    pub async fn last_performance_sample(&self) -> Option<PoolStatistics> {
        self.shared.last_sample.read().await.clone()
    }

    /// Find a task wherever it currently lives.
    pub async fn task(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.shared.state.read().await.locate(task_id)
    }

    pub async fn agent(&self, agent_id: &str) -> Option<Agent> {
        self.shared.state.read().await.agent(agent_id).cloned()
    }

    /// Agents in roster order.
    pub async fn agents(&self) -> Vec<Agent> {
        self.shared.state.read().await.agents().cloned().collect()
    }

    /// Completed tasks, oldest first.
    pub async fn completed_tasks(&self) -> Vec<Task> {
        self.shared.state.read().await.completed().to_vec()
    }

    /// True when nothing is queued or running.
    pub async fn is_drained(&self) -> bool {
        self.shared.state.read().await.is_drained()
    }

    /// Take an idle or errored agent out of rotation.
    pub async fn set_agent_offline(&self, agent_id: &str) -> Result<()> {
        self.shared
            .state
            .write()
            .await
            .set_offline(agent_id, Utc::now())?;
        info!(agent_id = %agent_id, "Agent taken offline");
        Ok(())
    }

    /// Put an offline agent back into rotation.
    pub async fn set_agent_online(&self, agent_id: &str) -> Result<()> {
        let changed = self
            .shared
            .state
            .write()
            .await
            .set_online(agent_id, Utc::now())?;
        if changed {
            info!(agent_id = %agent_id, "Agent back online");
        }
        Ok(())
    }
}
