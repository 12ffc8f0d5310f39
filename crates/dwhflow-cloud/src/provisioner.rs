//! Provisioner trait and identifier fields

use crate::api::{ClusterApi, IamApi, NetworkApi};
use crate::cluster::ClusterProvisioner;
use crate::error::Result;
use crate::iam::IamRoleProvisioner;
use crate::network::NetworkProvisioner;
use crate::poll::PollPolicy;
use async_trait::async_trait;
use dwhflow_config::{ConfigStore, StateFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Creates and deletes one family of cloud resources
///
/// Implementations read their inputs from the state file and write every
/// assigned identifier back through [`StateFile::record`] as soon as the
/// remote call that produced it succeeds. They keep no state of their own
/// between calls.
#[async_trait]
pub trait Provisioner: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Create whatever part of the resource family is not yet recorded
    async fn create(&self, state: &mut StateFile, ctx: &CreateContext) -> Result<()>;

    /// Delete whatever part of the resource family is recorded
    async fn delete(&self, state: &mut StateFile) -> Result<()>;
}

/// Inputs to `create` that are never read from the file
#[derive(Clone, Default)]
pub struct CreateContext {
    pub db_password: Option<String>,
}

impl CreateContext {
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            db_password: Some(password.into()),
        }
    }
}

impl fmt::Debug for CreateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateContext")
            .field("db_password", &self.db_password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The resource families, in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    IamRole,
    Cluster,
}

impl ResourceKind {
    pub const BUILD_ORDER: [ResourceKind; 3] = [Self::Network, Self::IamRole, Self::Cluster];
    pub const TEARDOWN_ORDER: [ResourceKind; 3] = [Self::Cluster, Self::IamRole, Self::Network];

    /// Keys written back by this family's provisioner
    pub fn identifier_fields(self) -> &'static [Field] {
        match self {
            Self::Network => fields::NETWORK,
            Self::IamRole => fields::IAM_ROLE,
            Self::Cluster => fields::CLUSTER,
        }
    }

    /// Every identifier field is present: creation is a no-op
    pub fn is_provisioned(self, store: &ConfigStore) -> bool {
        self.identifier_fields().iter().all(|f| f.is_set(store))
    }

    /// No identifier field is present: deletion is a no-op
    pub fn is_absent(self, store: &ConfigStore) -> bool {
        !self.identifier_fields().iter().any(|f| f.is_set(store))
    }

    pub fn missing_fields(self, store: &ConfigStore) -> Vec<Field> {
        self.identifier_fields()
            .iter()
            .copied()
            .filter(|f| !f.is_set(store))
            .collect()
    }

    pub fn present_fields(self, store: &ConfigStore) -> Vec<Field> {
        self.identifier_fields()
            .iter()
            .copied()
            .filter(|f| f.is_set(store))
            .collect()
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::IamRole => "IAM role",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::IamRole => write!(f, "iam-role"),
            Self::Cluster => write!(f, "cluster"),
        }
    }
}

/// A `(section, key)` pair in the configuration store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub section: &'static str,
    pub key: &'static str,
}

impl Field {
    pub const fn new(section: &'static str, key: &'static str) -> Self {
        Self { section, key }
    }

    pub fn is_set(self, store: &ConfigStore) -> bool {
        store.has(self.section, self.key)
    }

    pub fn read(self, store: &ConfigStore) -> Result<String> {
        Ok(store.get(self.section, self.key)?)
    }

    /// Write the value and persist the file
    pub fn record(self, state: &mut StateFile, value: impl Into<String>) -> Result<()> {
        Ok(state.record(self.section, self.key, value)?)
    }

    /// Write a value taken from user input, escaped against interpolation
    pub fn record_literal(self, state: &mut StateFile, value: &str) -> Result<()> {
        Ok(state.record_literal(self.section, self.key, value)?)
    }

    /// Remove the value and persist the file
    pub fn forget(self, state: &mut StateFile) -> Result<()> {
        Ok(state.forget(self.section, &[self.key])?)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.key)
    }
}

/// Identifier and marker fields, grouped by owner
pub mod fields {
    use super::Field;
    use dwhflow_config::section;

    pub const VPC_ID: Field = Field::new(section::VPC, "id");
    pub const IGW_ID: Field = Field::new(section::VPC, "igw_id");
    /// VPC the gateway is attached to
    pub const IGW_ATTACHMENT: Field = Field::new(section::VPC, "igw_attachment");
    pub const SG_ID: Field = Field::new(section::VPC, "sg_id");
    /// Port opened by the ingress rule
    pub const SG_INGRESS_PORT: Field = Field::new(section::VPC, "sg_ingress_port");
    pub const RT_ID: Field = Field::new(section::VPC, "rt_id");
    /// Gateway targeted by the default route
    pub const RT_ROUTE: Field = Field::new(section::VPC, "rt_route");
    pub const SUBNET_A_ID: Field = Field::new(section::SUBNET_A, "id");
    pub const SUBNET_A_ASSOCIATION: Field = Field::new(section::SUBNET_A, "rt_asc_id");
    pub const SUBNET_C_ID: Field = Field::new(section::SUBNET_C, "id");
    pub const SUBNET_C_ASSOCIATION: Field = Field::new(section::SUBNET_C, "rt_asc_id");

    pub const ROLE_ARN: Field = Field::new(section::IAM_ROLE, "arn");
    pub const ROLE_ATTACHED_POLICY: Field = Field::new(section::IAM_ROLE, "attached_policy");

    pub const SUBNET_GROUP_ID: Field = Field::new(section::SUBNET_GROUP, "id");
    pub const CLUSTER_ID: Field = Field::new(section::CLUSTER, "id");
    pub const CLUSTER_ROLE_ARN: Field = Field::new(section::CLUSTER, "iam_role_arn");
    pub const CLUSTER_DB_HOST: Field = Field::new(section::CLUSTER, "db_host");
    /// Written together with the host; not an identifier
    pub const CLUSTER_DB_PASSWORD: Field = Field::new(section::CLUSTER, "db_password");

    pub const NETWORK: &[Field] = &[
        VPC_ID,
        IGW_ID,
        IGW_ATTACHMENT,
        SG_ID,
        SG_INGRESS_PORT,
        RT_ID,
        RT_ROUTE,
        SUBNET_A_ID,
        SUBNET_A_ASSOCIATION,
        SUBNET_C_ID,
        SUBNET_C_ASSOCIATION,
    ];
    pub const IAM_ROLE: &[Field] = &[ROLE_ARN, ROLE_ATTACHED_POLICY];
    pub const CLUSTER: &[Field] = &[SUBNET_GROUP_ID, CLUSTER_ID, CLUSTER_ROLE_ARN, CLUSTER_DB_HOST];
}

/// Network, IAM role and cluster provisioners wired to the given APIs
pub fn standard_provisioners(
    network: Arc<dyn NetworkApi>,
    iam: Arc<dyn IamApi>,
    cluster: Arc<dyn ClusterApi>,
    poll: PollPolicy,
) -> Vec<Box<dyn Provisioner>> {
    vec![
        Box::new(NetworkProvisioner::new(network)),
        Box::new(IamRoleProvisioner::new(iam)),
        Box::new(ClusterProvisioner::new(cluster, poll)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwhflow_config::Template;

    #[test]
    fn test_provisioned_and_absent() {
        let mut store = ConfigStore::from_template(&Template::standard("admin"));
        assert!(ResourceKind::IamRole.is_absent(&store));
        assert!(!ResourceKind::IamRole.is_provisioned(&store));

        store.set(fields::ROLE_ARN.section, fields::ROLE_ARN.key, "arn:aws:iam::1:role/r");
        assert!(!ResourceKind::IamRole.is_absent(&store));
        assert!(!ResourceKind::IamRole.is_provisioned(&store));
        assert_eq!(
            ResourceKind::IamRole.missing_fields(&store),
            vec![fields::ROLE_ATTACHED_POLICY]
        );

        store.set(
            fields::ROLE_ATTACHED_POLICY.section,
            fields::ROLE_ATTACHED_POLICY.key,
            "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess",
        );
        assert!(ResourceKind::IamRole.is_provisioned(&store));
    }

    #[test]
    fn test_orders_are_reversed() {
        let mut reversed = ResourceKind::BUILD_ORDER;
        reversed.reverse();
        assert_eq!(reversed, ResourceKind::TEARDOWN_ORDER);
    }

    #[test]
    fn test_template_defines_no_identifier() {
        let store = ConfigStore::from_template(&Template::standard("admin"));
        for kind in ResourceKind::BUILD_ORDER {
            assert!(kind.is_absent(&store), "{} should start absent", kind);
        }
    }
}
