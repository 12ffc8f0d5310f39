//! AWS backend for dwhflow provisioning
//!
//! Implements the network, IAM and cluster APIs of `dwhflow-cloud` with the
//! official SDK clients (EC2, IAM, Redshift). Credentials come from the
//! named profile in the shared AWS config files.

mod error;

pub mod ec2;
pub mod iam;
pub mod redshift;
pub mod session;

// Re-exports
pub use ec2::Ec2Network;
pub use iam::AwsIam;
pub use redshift::RedshiftClusters;
pub use session::AwsSession;
