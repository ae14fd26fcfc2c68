//! Error types for the agent pool.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the pool facade when a request cannot be honored.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Task {id} already submitted")]
    DuplicateTask { id: String },

    #[error("Invalid task {id}: {reason}")]
    InvalidTask { id: String, reason: String },

    #[error("Agent {id} not found")]
    AgentNotFound { id: String },

    #[error("Agent {id} is busy with task {task_id}")]
    AgentBusy { id: String, task_id: String },

    #[error("Pool has no agents; call initialize() first")]
    NoAgents,
}

/// Errors raised by an executor itself, as opposed to a task that ran and failed.
///
/// Any of these marks the agent unhealthy (ERROR) until the health monitor
/// recovers it.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Executor crashed: {0}")]
    Crashed(String),

    #[error("Executor unavailable for agent {agent_id}: {reason}")]
    Unavailable { agent_id: String, reason: String },
}

/// Result type alias for the pool.
pub type Result<T> = std::result::Result<T, Error>;
