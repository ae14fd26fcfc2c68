//! Dispatcher — pairs queued tasks with idle agents and launches executions.
//!
//! The loop only suspends on its backoff sleeps. Each execution runs in its
//! own spawned task whose `JoinHandle` is the completion signal; the
//! completion is applied to pool state under the lock with a lease check,
//! so a late result can never overwrite a reclaimed agent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::manager::PoolShared;
use super::state::{CompletionDisposition, Dispatch};
use super::task::TaskOutcome;
use crate::error::ExecutorError;

/// Result of one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchTick {
    QueueEmpty,
    NoIdleAgents,
    Dispatched(usize),
}

/// Run one pass: assign a batch under the lock, then launch executions.
pub(crate) async fn dispatch_once(shared: &Arc<PoolShared>) -> DispatchTick {
    let dispatches = {
        let mut state = shared.state.write().await;
        if state.queue().is_empty() {
            return DispatchTick::QueueEmpty;
        }
        if state.idle_agent_ids().is_empty() {
            return DispatchTick::NoIdleAgents;
        }
        state.assign_batch(&shared.selector, Utc::now())
    };

    let count = dispatches.len();
    for dispatch in dispatches {
        info!(
            task_id = %dispatch.task.id,
            task = %dispatch.task.name,
            agent_id = %dispatch.agent_id,
            priority = %dispatch.task.priority,
            "Task assigned"
        );
        spawn_execution(Arc::clone(shared), dispatch);
    }
    DispatchTick::Dispatched(count)
}

/// Launch one execution. Not awaited by the dispatcher.
fn spawn_execution(shared: Arc<PoolShared>, dispatch: Dispatch) {
    tokio::spawn(async move {
        let Dispatch {
            agent_id,
            lease,
            context,
            task,
        } = dispatch;
        let task_name = task.name.clone();

        let started = Instant::now();
        let executor = Arc::clone(&shared.executor);
        // Inner spawn so a panicking executor surfaces as a JoinError.
        let run = tokio::spawn(async move { executor.execute(&context, &task).await });

        let (outcome, crashed) = match run.await {
            Ok(Ok(outcome)) => (outcome, false),
            Ok(Err(e)) => {
                error!(task_id = %lease.task_id, agent_id = %agent_id, error = %e, "Executor error");
                (TaskOutcome::failure(e.to_string()), true)
            }
            Err(join_err) => {
                let e = ExecutorError::Crashed(join_err.to_string());
                error!(task_id = %lease.task_id, agent_id = %agent_id, error = %e, "Executor panicked");
                (TaskOutcome::failure(e.to_string()), true)
            }
        };
        let elapsed = started.elapsed();

        let disposition = shared.state.write().await.complete(
            &agent_id,
            &lease,
            outcome.clone(),
            elapsed,
            crashed,
            Utc::now(),
        );
        log_completion(&task_name, &agent_id, &lease.task_id, &outcome, elapsed, disposition);
    });
}

fn log_completion(
    task_name: &str,
    agent_id: &str,
    task_id: &str,
    outcome: &TaskOutcome,
    elapsed: Duration,
    disposition: CompletionDisposition,
) {
    match (disposition, outcome) {
        (CompletionDisposition::Stale, _) => warn!(
            task_id = %task_id,
            agent_id = %agent_id,
            "Discarded completion for re-queued task"
        ),
        (CompletionDisposition::Recorded { .. }, TaskOutcome::Succeeded { .. }) => info!(
            task_id = %task_id,
            agent_id = %agent_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Task {} completed",
            task_name
        ),
        (CompletionDisposition::Recorded { .. }, TaskOutcome::Failed { error }) => warn!(
            task_id = %task_id,
            agent_id = %agent_id,
            error = %error,
            "Task {} failed",
            task_name
        ),
    }
    if let CompletionDisposition::Recorded {
        agent_updated: false,
        ..
    } = disposition
    {
        debug!(agent_id = %agent_id, task_id = %task_id, "Late completion recorded; agent left unchanged");
    }
}

/// Spawn the dispatcher loop. Exits when `shutdown` is cancelled.
pub(crate) fn spawn_dispatcher(
    shared: Arc<PoolShared>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Dispatcher started");

        while !shutdown.is_cancelled() {
            let pause = match dispatch_once(&shared).await {
                DispatchTick::QueueEmpty => shared.config.empty_queue_backoff,
                DispatchTick::NoIdleAgents => shared.config.no_agent_backoff,
                DispatchTick::Dispatched(_) => shared.config.dispatch_pause,
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Dispatcher stopped");
    })
}
