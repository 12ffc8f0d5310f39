pub mod config;
pub mod etl;
pub mod plan;
pub mod resources;

use colored::Colorize;
use dwhflow_cloud::{ActionType, Orchestrator, PollPolicy, ResourceKind, RunReport, StepOutcome};
use dwhflow_cloud_aws::AwsSession;
use dwhflow_config::{ConfigStore, Template, schema};
use std::path::Path;
use std::time::Duration;

/// Families with at least one identifier recorded
pub(crate) fn recorded_kinds(store: &ConfigStore) -> Vec<ResourceKind> {
    ResourceKind::BUILD_ORDER
        .into_iter()
        .filter(|kind| !kind.is_absent(store))
        .collect()
}

/// Poll policy from the file, overridden by `--poll-timeout`
pub(crate) fn poll_policy(
    store: &ConfigStore,
    poll_timeout: Option<u64>,
) -> anyhow::Result<PollPolicy> {
    let policy = PollPolicy::from_store(store)?;
    Ok(match poll_timeout {
        Some(secs) => policy.with_max_wait(Some(Duration::from_secs(secs))),
        None => policy,
    })
}

/// AWS session for the profile and region recorded in the file
pub(crate) async fn connect(store: &ConfigStore) -> anyhow::Result<AwsSession> {
    let profile = schema::admin_profile(store)?;
    let region = schema::region(store)?;
    println!(
        "{}",
        format!("Connecting to AWS (profile: {}, region: {})...", profile, region).blue()
    );
    Ok(AwsSession::connect(&profile, &region).await)
}

/// Orchestrator over an existing file, backed by AWS
pub(crate) async fn orchestrator(
    path: &Path,
    store: &ConfigStore,
    poll_timeout: Option<u64>,
) -> anyhow::Result<Orchestrator> {
    let poll = poll_policy(store, poll_timeout)?;
    let session = connect(store).await?;
    let template = Template::standard(&schema::admin_profile(store)?);
    Ok(Orchestrator::new(path, template, session.provisioners(poll)))
}

pub(crate) fn print_step(step: &StepOutcome) {
    match step.action {
        ActionType::NoOp => println!("  ℹ {}", step.message.dimmed()),
        ActionType::Create | ActionType::Delete => println!("  ✓ {}", step.message.green()),
    }
}

pub(crate) fn print_report(report: &RunReport) {
    for step in &report.steps {
        print_step(step);
    }
    println!();
    println!(
        "{}",
        format!(
            "✓ Done: {} changed, {} unchanged ({:.1}s)",
            report.changed(),
            report.steps.len() - report.changed(),
            report.duration_ms as f64 / 1000.0
        )
        .green()
        .bold()
    );
}
