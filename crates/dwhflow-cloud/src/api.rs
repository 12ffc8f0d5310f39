//! Remote control-plane APIs used by the provisioners
//!
//! Each trait is a thin, opaque view of one cloud subsystem. Every method is
//! a single remote call; none of them retry.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Virtual network subsystem (VPC, gateway, security group, routes, subnets)
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Returns the VPC id
    async fn create_vpc(&self, cidr: &str, name: &str) -> Result<String>;

    /// Returns the internet gateway id
    async fn create_internet_gateway(&self, name: &str) -> Result<String>;

    async fn attach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> Result<()>;

    /// Returns the security group id
    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: &str,
    ) -> Result<String>;

    /// Allow inbound TCP on `port` from `cidr`
    async fn authorize_ingress(&self, sg_id: &str, cidr: &str, port: u16) -> Result<()>;

    /// Returns the route table id
    async fn create_route_table(&self, vpc_id: &str, name: &str) -> Result<String>;

    async fn create_route(&self, rt_id: &str, destination_cidr: &str, igw_id: &str) -> Result<()>;

    /// Returns the subnet id
    async fn create_subnet(&self, vpc_id: &str, cidr: &str, az: &str, name: &str)
    -> Result<String>;

    /// Returns the association id
    async fn associate_route_table(&self, rt_id: &str, subnet_id: &str) -> Result<String>;

    async fn disassociate_route_table(&self, association_id: &str) -> Result<()>;

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()>;

    async fn delete_route_table(&self, rt_id: &str) -> Result<()>;

    async fn detach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> Result<()>;

    async fn delete_internet_gateway(&self, igw_id: &str) -> Result<()>;

    async fn delete_security_group(&self, sg_id: &str) -> Result<()>;

    async fn delete_vpc(&self, vpc_id: &str) -> Result<()>;
}

/// Identity subsystem
#[async_trait]
pub trait IamApi: Send + Sync {
    /// Returns the role ARN
    async fn create_role(
        &self,
        path: &str,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> Result<String>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    async fn delete_role(&self, role_name: &str) -> Result<()>;
}

/// Analytic database cluster subsystem
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_subnet_group(
        &self,
        name: &str,
        description: &str,
        subnet_ids: &[String],
    ) -> Result<()>;

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<ClusterInfo>;

    /// `Ok(None)` when the cluster does not exist
    async fn describe_cluster(&self, identifier: &str) -> Result<Option<ClusterInfo>>;

    async fn add_iam_role(&self, identifier: &str, role_arn: &str) -> Result<()>;

    async fn delete_cluster(&self, identifier: &str, skip_final_snapshot: bool) -> Result<()>;

    async fn delete_subnet_group(&self, name: &str) -> Result<()>;
}

/// Parameters of a multi-node cluster
#[derive(Clone)]
pub struct CreateClusterRequest {
    pub identifier: String,
    pub node_type: String,
    pub node_count: i32,
    pub db_name: String,
    pub port: u16,
    pub master_username: String,
    pub master_password: String,
    pub subnet_group_name: String,
    pub availability_zone: String,
    pub security_group_id: String,
}

impl fmt::Debug for CreateClusterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateClusterRequest")
            .field("identifier", &self.identifier)
            .field("node_type", &self.node_type)
            .field("node_count", &self.node_count)
            .field("db_name", &self.db_name)
            .field("port", &self.port)
            .field("master_username", &self.master_username)
            .field("master_password", &"***")
            .field("subnet_group_name", &self.subnet_group_name)
            .field("availability_zone", &self.availability_zone)
            .field("security_group_id", &self.security_group_id)
            .finish()
    }
}

/// Observed state of a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub identifier: String,
    pub status: ClusterStatus,
    /// Endpoint address, present once the cluster is available
    pub endpoint: Option<String>,
}

/// Cluster lifecycle status as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterStatus {
    Creating,
    Available,
    Deleting,
    Other(String),
}

impl ClusterStatus {
    pub fn from_api(status: &str) -> Self {
        match status {
            "creating" => Self::Creating,
            "available" => Self::Available,
            "deleting" => Self::Deleting,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::Deleting => "deleting",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_status_from_api() {
        assert_eq!(ClusterStatus::from_api("available"), ClusterStatus::Available);
        assert_eq!(ClusterStatus::from_api("deleting"), ClusterStatus::Deleting);
        let other = ClusterStatus::from_api("incompatible-network");
        assert_eq!(other.to_string(), "incompatible-network");
    }
}
