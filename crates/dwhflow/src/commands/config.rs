use super::recorded_kinds;
use colored::Colorize;
use dwhflow_config::{ConfigStore, Template, delete_config};
use std::path::Path;

/// Refuse to discard a file that still tracks live resources
fn ensure_no_resources(path: &Path, force: bool) -> anyhow::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let store = ConfigStore::load(path)?;
    let recorded = recorded_kinds(&store);
    if recorded.is_empty() {
        return Ok(());
    }

    let names: Vec<&str> = recorded.iter().map(|kind| kind.display_name()).collect();
    if force {
        println!(
            "{}",
            format!(
                "⚠ Discarding identifiers of existing resources: {}",
                names.join(", ")
            )
            .yellow()
        );
        return Ok(());
    }
    anyhow::bail!(
        "{} still records existing resources ({}).\nRun `dwh delete-resources` first, or pass --force to discard them.",
        path.display(),
        names.join(", ")
    )
}

pub fn create(path: &Path, profile: &str, force: bool) -> anyhow::Result<()> {
    ensure_no_resources(path, force)?;

    ConfigStore::init_from_template(path, &Template::standard(profile))?;
    println!(
        "{}",
        format!("✓ Created configuration file {}", path.display())
            .green()
            .bold()
    );
    println!("  profile: {}", profile.cyan());
    Ok(())
}

pub fn delete(path: &Path, force: bool) -> anyhow::Result<()> {
    if !path.exists() {
        println!(
            "ℹ Configuration file {} does not exist",
            path.display().to_string().cyan()
        );
        return Ok(());
    }
    ensure_no_resources(path, force)?;

    delete_config(path)?;
    println!(
        "{}",
        format!("✓ Deleted configuration file {}", path.display())
            .green()
            .bold()
    );
    Ok(())
}
