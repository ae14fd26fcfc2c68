//! Performance tracker — periodic aggregate statistics.
//!
//! Read-only with respect to agents and tasks: it samples the pool under a
//! read lock, keeps the latest sample, and logs a summary.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::manager::PoolShared;
use super::report::PoolStatistics;

fn log_summary(stats: &PoolStatistics) {
    if stats.total_tasks == 0 {
        return;
    }
    info!(
        total = stats.total_tasks,
        completed = stats.completed_tasks,
        failed = stats.failed_tasks,
        avg_execution_secs = stats.average_execution_time,
        tasks_per_minute = stats.tasks_per_minute,
        "Performance summary: {:.1}% success rate",
        stats.success_rate
    );
}

/// Take one sample and remember it as the latest.
pub(crate) async fn sample(shared: &PoolShared) -> PoolStatistics {
    let stats = shared.state.read().await.statistics(Utc::now());
    *shared.last_sample.write().await = Some(stats.clone());
    stats
}

/// Spawn the tracker loop. Exits when `shutdown` is cancelled.
pub(crate) fn spawn_performance_tracker(
    shared: Arc<PoolShared>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = shared.config.tracker_interval;
        info!("Performance tracker started (interval: {:?})", interval);

        let mut tick = tokio::time::interval(interval);
        // Skip immediate first tick
        tick.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {}
            }

            let stats = sample(&shared).await;
            log_summary(&stats);
        }

        info!("Performance tracker stopped");
    })
}
