//! dwhflow cloud provisioning
//!
//! Builds and tears down the data-warehouse environment: a VPC with two
//! public subnets, an IAM role the cluster uses to read S3, and a
//! multi-node Redshift cluster. All cross-step data flows through the
//! configuration file, which doubles as the record of what exists.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   dwh CLI                        │
//! │        (build-resources / delete-resources)      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                dwhflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Orchestrator (build / teardown order)   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐     │
//! │  │ Network  │ │ IAM role │ │   Cluster    │     │
//! │  └──────────┘ └──────────┘ └──────────────┘     │
//! │   trait NetworkApi / IamApi / ClusterApi        │
//! └───────┬─────────────────────────┬───────────────┘
//!         │                         │
//! ┌───────▼───────┐         ┌───────▼───────┐
//! │ dwhflow-config│         │ dwhflow-cloud │
//! │  (dwh.cfg)    │         │     -aws      │
//! └───────────────┘         └───────────────┘
//! ```

pub mod action;
pub mod api;
pub mod cluster;
pub mod error;
pub mod iam;
pub mod network;
pub mod orchestrator;
pub mod poll;
pub mod provisioner;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary, RunReport, StepOutcome};
pub use api::{ClusterApi, ClusterInfo, ClusterStatus, CreateClusterRequest, IamApi, NetworkApi};
pub use cluster::ClusterProvisioner;
pub use error::{CloudError, Result};
pub use iam::IamRoleProvisioner;
pub use network::NetworkProvisioner;
pub use orchestrator::Orchestrator;
pub use poll::{DEFAULT_POLL_INTERVAL, PollPolicy};
pub use provisioner::{
    CreateContext, Field, Provisioner, ResourceKind, fields, standard_provisioners,
};
