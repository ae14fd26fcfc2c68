//! Agent pool — prioritized task distribution across a fixed set of agents.
//!
//! Core components:
//! - `task` — Task types, priorities, and outcomes
//! - `agent` — Agent records and the built-in roster
//! - `queue` — Priority-ordered FIFO task queue
//! - `selector` — Capability inference and agent scoring
//! - `executor` — Pluggable task execution (plus a simulated executor)
//! - `state` — Pool state behind a single lock
//! - `dispatcher` — Pairs queued tasks with idle agents
//! - `health` — Reclaims stuck agents, recovers errored ones
//! - `tracker` — Periodic performance sampling
//! - `report` — Status report snapshot types
//! - `manager` — Public facade and loop lifecycle

pub mod agent;
mod dispatcher;
pub mod executor;
pub mod health;
pub mod manager;
pub mod queue;
pub mod report;
pub mod selector;
pub mod state;
pub mod task;
mod tracker;

pub use agent::{Agent, AgentProfile, AgentStatus, Lease, default_roster};
pub use executor::{ExecutionContext, Executor, SimulatedExecutor};
pub use manager::AgentManager;
pub use queue::TaskQueue;
pub use report::{AgentReport, PoolStatistics, QueueSummary, StatusReport};
pub use selector::{CapabilityInference, KeywordInference, Selector};
pub use state::{PoolState, TaskLocation, TaskSnapshot};
pub use task::{Task, TaskOutcome, TaskPriority, TaskSpec};
