//! dwhflow configuration store
//!
//! The configuration file (`dwh.cfg` by default) holds both the desired
//! parameters of every resource and the identifiers assigned by the cloud
//! once a resource exists. It is the only channel through which the
//! provisioning steps pass data to each other.
//!
//! - [`ConfigStore`]: sectioned key/value store with `%(name)s` interpolation
//! - [`Template`]: default mapping used to create a fresh file
//! - [`schema`]: required keys per section and typed views
//! - [`StateFile`] / [`StateLock`]: write-through persistence and an advisory lock

pub mod error;
pub mod schema;
pub mod state;
pub mod store;
pub mod template;

// Re-exports
pub use error::{ConfigError, Result};
pub use schema::{
    ClusterSettings, DbConnection, IamRoleSettings, S3Sources, SectionSchema, SubnetGroupSettings,
    SubnetSettings, VpcSettings, section,
};
pub use state::{CONFIG_FILE, StateFile, StateLock, delete_config};
pub use store::{ConfigStore, DEFAULT_SECTION};
pub use template::{DEFAULT_ADMIN_PROFILE, Template};
