use std::sync::Arc;
use std::time::Duration;

use agent_pool::config::PoolConfig;
use agent_pool::pool::{AgentManager, SimulatedExecutor, StatusReport, TaskPriority, TaskSpec};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);
const PROGRESS_ROUNDS: u32 = 12;

fn sample_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new(
            "Scrape Product Data",
            "Extract product information from e-commerce site",
        )
        .with_target("https://example-shop.com/products")
        .with_actions(["navigate", "extract_data", "screenshot"])
        .with_priority(TaskPriority::High)
        .with_timeout_secs(30)
        .with_retry_count(2),
        TaskSpec::new(
            "Fill Registration Form",
            "Complete user registration form with test data",
        )
        .with_target("https://example.com/register")
        .with_actions(["fill_form", "submit", "verify"])
        .with_priority(TaskPriority::Normal)
        .with_timeout_secs(20)
        .with_retry_count(1),
        TaskSpec::new("Performance Test", "Run performance tests on landing page")
            .with_target("https://example.com/landing")
            .with_actions(["load_test", "measure_metrics", "report"])
            .with_priority(TaskPriority::Critical)
            .with_timeout_secs(60)
            .with_retry_count(3),
        TaskSpec::new("Monitor Health Check", "Check system health and availability")
            .with_target("https://example.com/health")
            .with_actions(["ping", "check_status", "log_results"])
            .with_priority(TaskPriority::Low)
            .with_timeout_secs(10)
            .with_retry_count(1),
        TaskSpec::new("Data Validation", "Validate form data and business rules")
            .with_target("https://example.com/validate")
            .with_actions(["test_validation", "check_errors", "report"])
            .with_priority(TaskPriority::High)
            .with_timeout_secs(25)
            .with_retry_count(2),
    ]
}

fn print_progress(elapsed: Duration, report: &StatusReport) {
    eprintln!("\n--- Status Report (T+{}s) ---", elapsed.as_secs());
    eprintln!(
        "Queue: {} pending, {} active, {} completed",
        report.queue.pending_tasks, report.queue.active_tasks, report.queue.completed_tasks
    );
    eprintln!(
        "Agents: {} busy, {} idle",
        report.statistics.active_agents, report.statistics.idle_agents
    );
    eprintln!("Success Rate: {:.1}%", report.statistics.success_rate);
}

fn print_final(report: &StatusReport) {
    let stats = &report.statistics;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("FINAL EXECUTION REPORT");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Total Tasks: {}", stats.total_tasks);
    eprintln!("Completed: {}", stats.completed_tasks);
    eprintln!("Failed: {}", stats.failed_tasks);
    eprintln!("Success Rate: {:.1}%", stats.success_rate);
    eprintln!("Average Execution Time: {:.2}s", stats.average_execution_time);
    eprintln!("Tasks per Minute: {:.1}", stats.tasks_per_minute);

    eprintln!("\nAgent Performance:");
    for agent in &report.agents {
        eprintln!(
            "  {}: {} completed, {:.1}% success rate",
            agent.name, agent.completed_tasks, agent.success_rate
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = PoolConfig {
        max_agents: 3,
        ..PoolConfig::from_env()
    };
    let report_path = std::env::var("AGENT_POOL_REPORT_PATH")
        .unwrap_or_else(|_| "agent_pool_report.json".to_string());

    eprintln!("🤖 Agent Pool v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Agents: {}", config.max_agents);
    eprintln!("   Report: {}", report_path);

    let manager = AgentManager::new(config, Arc::new(SimulatedExecutor::default()))?;
    manager.initialize(None).await?;
    manager.submit_batch(sample_tasks()).await?;
    manager.start().await?;

    for round in 0..PROGRESS_ROUNDS {
        tokio::time::sleep(PROGRESS_INTERVAL).await;

        let report = manager.status_report().await;
        print_progress(PROGRESS_INTERVAL * round, &report);

        if manager.is_drained().await && report.queue.completed_tasks > 0 {
            break;
        }
    }

    manager.stop().await;

    let report = manager.status_report().await;
    print_final(&report);
    report.write_to(&report_path).await?;
    eprintln!("\nReport written to {}", report_path);

    Ok(())
}
