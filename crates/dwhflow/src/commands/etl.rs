use colored::Colorize;
use dwhflow_config::StateFile;
use std::path::Path;

pub async fn create_tables(path: &Path) -> anyhow::Result<()> {
    let state = StateFile::open(path)?;
    let mut runner = dwhflow_etl::connect(state.store()).await?;

    println!("{}", "Recreating tables...".blue());
    let executed = runner.reset_tables().await?;
    println!(
        "{}",
        format!("✓ Tables recreated ({} statements)", executed)
            .green()
            .bold()
    );
    Ok(())
}

pub async fn run(path: &Path) -> anyhow::Result<()> {
    let state = StateFile::open(path)?;
    let mut runner = dwhflow_etl::connect(state.store()).await?;

    println!("{}", "Loading staging tables...".blue());
    let loaded = runner.load_staging_tables().await?;
    println!("  ✓ {} staging tables loaded", loaded);

    println!("{}", "Filling star schema...".blue());
    let inserted = runner.insert_tables().await?;
    println!("  ✓ {} tables filled", inserted);

    println!();
    println!("{}", "✓ ETL finished".green().bold());
    Ok(())
}
