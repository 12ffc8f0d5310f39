use colored::Colorize;
use dwhflow_cloud::{ActionType, Orchestrator};
use dwhflow_config::{DEFAULT_ADMIN_PROFILE, Template};
use std::path::Path;

pub fn handle(path: &Path, teardown: bool, json: bool) -> anyhow::Result<()> {
    // Planning never calls the cloud, so no provisioners are needed
    let orchestrator = Orchestrator::new(
        path,
        Template::standard(DEFAULT_ADMIN_PROFILE),
        Vec::new(),
    );
    let plan = if teardown {
        orchestrator.plan_teardown()?
    } else {
        orchestrator.plan_build()?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let title = if teardown { "Teardown plan" } else { "Build plan" };
    println!("{}", format!("{} for {}", title, path.display()).bold());
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => "=".dimmed(),
        };
        println!("  {} {}", marker, action.description);
        for field in &action.pending {
            println!("      {}", field.dimmed());
        }
    }
    println!();
    println!("{}", plan.summary());
    Ok(())
}
