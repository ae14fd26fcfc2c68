//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Pool configuration: pool size plus every loop interval and health threshold.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of agents created by `initialize`.
    pub max_agents: usize,
    /// Dispatcher sleep when the queue is empty.
    pub empty_queue_backoff: Duration,
    /// Dispatcher sleep when no agent is idle.
    pub no_agent_backoff: Duration,
    /// Dispatcher pause after handing out a batch.
    pub dispatch_pause: Duration,
    /// Health monitor sweep interval.
    pub health_check_interval: Duration,
    /// A BUSY agent silent for longer than this is reclaimed.
    pub stuck_threshold: Duration,
    /// An ERROR agent is returned to IDLE after this long.
    pub error_recovery_threshold: Duration,
    /// Performance tracker sampling interval.
    pub tracker_interval: Duration,
    /// Re-enqueue the task of a reclaimed agent while its retry budget lasts.
    pub requeue_stuck_tasks: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_agents: 5,
            empty_queue_backoff: Duration::from_secs(1),
            no_agent_backoff: Duration::from_millis(500),
            dispatch_pause: Duration::from_millis(100),
            health_check_interval: Duration::from_secs(5),
            stuck_threshold: Duration::from_secs(30),
            error_recovery_threshold: Duration::from_secs(10),
            tracker_interval: Duration::from_secs(30),
            requeue_stuck_tasks: true,
        }
    }
}

impl PoolConfig {
    /// Build config from `AGENT_POOL_*` environment variables.
    /// Unset or malformed values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_agents: env_parse("AGENT_POOL_MAX_AGENTS").unwrap_or(defaults.max_agents),
            empty_queue_backoff: env_parse("AGENT_POOL_EMPTY_QUEUE_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.empty_queue_backoff),
            no_agent_backoff: env_parse("AGENT_POOL_NO_AGENT_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.no_agent_backoff),
            dispatch_pause: env_parse("AGENT_POOL_DISPATCH_PAUSE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.dispatch_pause),
            health_check_interval: env_parse("AGENT_POOL_HEALTH_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_check_interval),
            stuck_threshold: env_parse("AGENT_POOL_STUCK_THRESHOLD_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stuck_threshold),
            error_recovery_threshold: env_parse("AGENT_POOL_ERROR_RECOVERY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.error_recovery_threshold),
            tracker_interval: env_parse("AGENT_POOL_TRACKER_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tracker_interval),
            requeue_stuck_tasks: env_parse("AGENT_POOL_REQUEUE_STUCK")
                .unwrap_or(defaults.requeue_stuck_tasks),
        }
    }

    /// Reject values that would stall or spin the background loops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_agents == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_agents".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let durations = [
            ("empty_queue_backoff", self.empty_queue_backoff),
            ("no_agent_backoff", self.no_agent_backoff),
            ("health_check_interval", self.health_check_interval),
            ("stuck_threshold", self.stuck_threshold),
            ("error_recovery_threshold", self.error_recovery_threshold),
            ("tracker_interval", self.tracker_interval),
        ];
        for (key, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_agents, 5);
        assert_eq!(config.stuck_threshold, Duration::from_secs(30));
        assert_eq!(config.error_recovery_threshold, Duration::from_secs(10));
        assert!(config.requeue_stuck_tasks);
    }

    #[test]
    fn zero_agents_rejected() {
        let config = PoolConfig {
            max_agents: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "max_agents"
        ));
    }

    #[test]
    fn zero_interval_rejected() {
        let config = PoolConfig {
            health_check_interval: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "health_check_interval"
        ));
    }

    #[test]
    fn dispatch_pause_may_be_zero() {
        let config = PoolConfig {
            dispatch_pause: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
