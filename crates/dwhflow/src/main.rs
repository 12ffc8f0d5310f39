mod commands;

use clap::{ArgAction, Parser, Subcommand};
use dwhflow_cloud::ResourceKind;
use dwhflow_config::{CONFIG_FILE, DEFAULT_ADMIN_PROFILE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dwh")]
#[command(version, about = "Provision a Redshift data warehouse and load it", long_about = None)]
struct Cli {
    /// Configuration file holding parameters and resource identifiers
    #[arg(
        long = "config",
        global = true,
        env = "DWH_CONFIG_PATH",
        default_value = CONFIG_FILE
    )]
    config: PathBuf,

    /// Increase log verbosity (-v: debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh configuration file from the default template
    CreateConfig {
        /// AWS profile used for provisioning and as the database user
        #[arg(short, long, default_value = DEFAULT_ADMIN_PROFILE)]
        profile: String,
        /// Overwrite even if the file records existing resources
        #[arg(long)]
        force: bool,
    },
    /// Delete the configuration file
    DeleteConfig {
        /// Delete even if the file records existing resources
        #[arg(long)]
        force: bool,
    },
    /// Create the network, IAM role and cluster, skipping what exists
    BuildResources {
        /// AWS profile with permission to create the resources
        admin_profile: String,
        /// Master password of the cluster database
        db_password: String,
        /// Give up waiting for the cluster after this many seconds
        #[arg(long, value_name = "SECS")]
        poll_timeout: Option<u64>,
    },
    /// Delete the cluster, IAM role and network, skipping what is gone
    DeleteResources {
        /// Give up waiting for the cluster after this many seconds
        #[arg(long, value_name = "SECS")]
        poll_timeout: Option<u64>,
    },
    /// Create the VPC, internet gateway, security group, route table and subnets
    CreateVpc,
    /// Create the IAM role the cluster uses to read S3
    CreateIam,
    /// Create the subnet group and the cluster
    CreateCluster {
        /// Master password of the cluster database
        db_password: String,
        /// Give up waiting for the cluster after this many seconds
        #[arg(long, value_name = "SECS")]
        poll_timeout: Option<u64>,
    },
    /// Delete the network resources
    DeleteVpc,
    /// Delete the IAM role
    DeleteIam,
    /// Delete the cluster and its subnet group
    DeleteCluster {
        /// Give up waiting for the cluster after this many seconds
        #[arg(long, value_name = "SECS")]
        poll_timeout: Option<u64>,
    },
    /// Show what build-resources (or delete-resources) would do
    Plan {
        /// Plan the teardown instead of the build
        #[arg(long)]
        teardown: bool,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop and recreate the staging and star-schema tables
    CreateTables,
    /// Load the staging tables and fill the star schema
    Etl,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_path();
    match cli.command {
        Commands::CreateConfig { profile, force } => {
            commands::config::create(config, &profile, force)?;
        }
        Commands::DeleteConfig { force } => {
            commands::config::delete(config, force)?;
        }
        Commands::BuildResources {
            admin_profile,
            db_password,
            poll_timeout,
        } => {
            commands::resources::build_all(config, &admin_profile, &db_password, poll_timeout)
                .await?;
        }
        Commands::DeleteResources { poll_timeout } => {
            commands::resources::teardown_all(config, poll_timeout).await?;
        }
        Commands::CreateVpc => {
            commands::resources::create(config, ResourceKind::Network, None, None).await?;
        }
        Commands::CreateIam => {
            commands::resources::create(config, ResourceKind::IamRole, None, None).await?;
        }
        Commands::CreateCluster {
            db_password,
            poll_timeout,
        } => {
            commands::resources::create(
                config,
                ResourceKind::Cluster,
                Some(db_password),
                poll_timeout,
            )
            .await?;
        }
        Commands::DeleteVpc => {
            commands::resources::delete(config, ResourceKind::Network, None).await?;
        }
        Commands::DeleteIam => {
            commands::resources::delete(config, ResourceKind::IamRole, None).await?;
        }
        Commands::DeleteCluster { poll_timeout } => {
            commands::resources::delete(config, ResourceKind::Cluster, poll_timeout).await?;
        }
        Commands::Plan { teardown, json } => {
            commands::plan::handle(config, teardown, json)?;
        }
        Commands::CreateTables => {
            commands::etl::create_tables(config).await?;
        }
        Commands::Etl => {
            commands::etl::run(config).await?;
        }
    }

    Ok(())
}
