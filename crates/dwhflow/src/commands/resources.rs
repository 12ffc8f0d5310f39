use super::{orchestrator, poll_policy, print_report, print_step};
use colored::Colorize;
use dwhflow_cloud::{CreateContext, Orchestrator, Plan, ResourceKind};
use dwhflow_cloud_aws::AwsSession;
use dwhflow_config::{ConfigStore, StateFile, Template, schema};
use std::path::Path;

pub async fn build_all(
    path: &Path,
    admin_profile: &str,
    db_password: &str,
    poll_timeout: Option<u64>,
) -> anyhow::Result<()> {
    let template = Template::standard(admin_profile);

    // Existing file: parameters and recorded identifiers come from it
    let store = if path.exists() {
        let state = StateFile::open(path)?;
        if !Plan::for_build(state.store()).has_changes {
            println!("ℹ All resources already exist, nothing to build");
            return Ok(());
        }
        state.store().clone()
    } else {
        ConfigStore::from_template(&template)
    };

    let profile = schema::admin_profile(&store)?;
    let region = schema::region(&store)?;
    let poll = poll_policy(&store, poll_timeout)?;
    println!("{}", "Building data warehouse resources...".blue());
    println!("  config: {}", path.display().to_string().cyan());

    let session = AwsSession::connect(&profile, &region).await;
    let orchestrator = Orchestrator::new(path, template, session.provisioners(poll));
    let report = orchestrator.build_all(admin_profile, db_password).await?;

    print_report(&report);
    Ok(())
}

pub async fn teardown_all(path: &Path, poll_timeout: Option<u64>) -> anyhow::Result<()> {
    if !path.exists() {
        println!(
            "ℹ Configuration file {} does not exist, nothing to delete",
            path.display()
        );
        return Ok(());
    }
    let state = StateFile::open(path)?;
    if !Plan::for_teardown(state.store()).has_changes {
        println!("ℹ No resources recorded, nothing to delete");
        return Ok(());
    }

    println!("{}", "Deleting data warehouse resources...".yellow());
    let report = orchestrator(path, state.store(), poll_timeout)
        .await?
        .teardown_all()
        .await?;

    print_report(&report);
    Ok(())
}

pub async fn create(
    path: &Path,
    kind: ResourceKind,
    db_password: Option<String>,
    poll_timeout: Option<u64>,
) -> anyhow::Result<()> {
    let state = StateFile::open(path)?;
    if kind.is_provisioned(state.store()) {
        println!("ℹ {} already exists", kind.display_name());
        return Ok(());
    }

    println!("{}", format!("Creating {}...", kind.display_name()).blue());
    let ctx = CreateContext { db_password };
    let outcome = orchestrator(path, state.store(), poll_timeout)
        .await?
        .create(kind, &ctx)
        .await?;

    print_step(&outcome);
    Ok(())
}

pub async fn delete(
    path: &Path,
    kind: ResourceKind,
    poll_timeout: Option<u64>,
) -> anyhow::Result<()> {
    let state = StateFile::open(path)?;
    if kind.is_absent(state.store()) {
        println!("ℹ {} does not exist", kind.display_name());
        return Ok(());
    }

    println!("{}", format!("Deleting {}...", kind.display_name()).yellow());
    let outcome = orchestrator(path, state.store(), poll_timeout)
        .await?
        .delete(kind)
        .await?;

    print_step(&outcome);
    Ok(())
}
