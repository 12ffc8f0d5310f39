//! Redshift implementation of the cluster API

use crate::error::{missing_field, sdk_error};
use async_trait::async_trait;
use aws_sdk_redshift::Client;
use aws_sdk_redshift::types::Cluster;
use dwhflow_cloud::{ClusterApi, ClusterInfo, ClusterStatus, CreateClusterRequest, Result};
use tracing::debug;

const CLUSTER_TYPE: &str = "multi-node";

pub struct RedshiftClusters {
    client: Client,
}

impl RedshiftClusters {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn cluster_info(cluster: &Cluster) -> Option<ClusterInfo> {
    Some(ClusterInfo {
        identifier: cluster.cluster_identifier()?.to_string(),
        status: ClusterStatus::from_api(cluster.cluster_status().unwrap_or_default()),
        endpoint: cluster
            .endpoint()
            .and_then(|endpoint| endpoint.address())
            .map(str::to_string),
    })
}

#[async_trait]
impl ClusterApi for RedshiftClusters {
    async fn create_subnet_group(
        &self,
        name: &str,
        description: &str,
        subnet_ids: &[String],
    ) -> Result<()> {
        self.client
            .create_cluster_subnet_group()
            .cluster_subnet_group_name(name)
            .description(description)
            .set_subnet_ids(Some(subnet_ids.to_vec()))
            .send()
            .await
            .map_err(|e| sdk_error("CreateClusterSubnetGroup", e))?;
        Ok(())
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<ClusterInfo> {
        debug!("CreateCluster {:?}", request);
        let output = self
            .client
            .create_cluster()
            .cluster_identifier(&request.identifier)
            .cluster_type(CLUSTER_TYPE)
            .node_type(&request.node_type)
            .number_of_nodes(request.node_count)
            .db_name(&request.db_name)
            .port(i32::from(request.port))
            .master_username(&request.master_username)
            .master_user_password(&request.master_password)
            .cluster_subnet_group_name(&request.subnet_group_name)
            .availability_zone(&request.availability_zone)
            .vpc_security_group_ids(&request.security_group_id)
            .publicly_accessible(true)
            .enhanced_vpc_routing(false)
            .send()
            .await
            .map_err(|e| sdk_error("CreateCluster", e))?;
        output
            .cluster()
            .and_then(cluster_info)
            .ok_or_else(|| missing_field("CreateCluster", "cluster"))
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<Option<ClusterInfo>> {
        let result = self
            .client
            .describe_clusters()
            .cluster_identifier(identifier)
            .send()
            .await;
        match result {
            Ok(output) => Ok(output.clusters().first().and_then(cluster_info)),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_cluster_not_found_fault())
                    .unwrap_or(false) =>
            {
                Ok(None)
            }
            Err(err) => Err(sdk_error("DescribeClusters", err)),
        }
    }

    async fn add_iam_role(&self, identifier: &str, role_arn: &str) -> Result<()> {
        self.client
            .modify_cluster_iam_roles()
            .cluster_identifier(identifier)
            .add_iam_roles(role_arn)
            .send()
            .await
            .map_err(|e| sdk_error("ModifyClusterIamRoles", e))?;
        Ok(())
    }

    async fn delete_cluster(&self, identifier: &str, skip_final_snapshot: bool) -> Result<()> {
        self.client
            .delete_cluster()
            .cluster_identifier(identifier)
            .skip_final_cluster_snapshot(skip_final_snapshot)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteCluster", e))?;
        Ok(())
    }

    async fn delete_subnet_group(&self, name: &str) -> Result<()> {
        self.client
            .delete_cluster_subnet_group()
            .cluster_subnet_group_name(name)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteClusterSubnetGroup", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_redshift::types::Endpoint;

    #[test]
    fn test_cluster_info_reads_endpoint() {
        let cluster = Cluster::builder()
            .cluster_identifier("dwh-cluster")
            .cluster_status("available")
            .endpoint(
                Endpoint::builder()
                    .address("dwh-cluster.abc.ap-northeast-2.redshift.amazonaws.com")
                    .port(5439)
                    .build(),
            )
            .build();

        let info = cluster_info(&cluster).unwrap();
        assert_eq!(info.status, ClusterStatus::Available);
        assert_eq!(
            info.endpoint.as_deref(),
            Some("dwh-cluster.abc.ap-northeast-2.redshift.amazonaws.com")
        );
    }

    #[test]
    fn test_cluster_info_while_creating() {
        let cluster = Cluster::builder()
            .cluster_identifier("dwh-cluster")
            .cluster_status("creating")
            .build();

        let info = cluster_info(&cluster).unwrap();
        assert_eq!(info.status, ClusterStatus::Creating);
        assert!(info.endpoint.is_none());
    }

    #[test]
    fn test_cluster_without_identifier_is_ignored() {
        assert!(cluster_info(&Cluster::builder().build()).is_none());
    }
}
