//! Cluster provisioner: subnet group, multi-node cluster, IAM role attachment
//!
//! Lifecycle observed here:
//!
//! ```text
//! absent ──create──▶ creating ──▶ available ──delete──▶ deleting ──▶ absent
//! ```
//!
//! Creation waits for `available`; deletion waits for the cluster to stop
//! being found. Both waits follow the provisioner's [`PollPolicy`].

use crate::api::{ClusterApi, ClusterInfo, ClusterStatus, CreateClusterRequest};
use crate::error::{CloudError, Result};
use crate::poll::PollPolicy;
use crate::provisioner::fields::{
    CLUSTER_DB_HOST, CLUSTER_DB_PASSWORD, CLUSTER_ID, CLUSTER_ROLE_ARN, ROLE_ARN, SG_ID,
    SUBNET_A_ID, SUBNET_C_ID, SUBNET_GROUP_ID, VPC_ID,
};
use crate::provisioner::{CreateContext, Provisioner, ResourceKind};
use async_trait::async_trait;
use dwhflow_config::{ClusterSettings, ConfigStore, StateFile, SubnetGroupSettings, section};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ClusterProvisioner {
    api: Arc<dyn ClusterApi>,
    poll: PollPolicy,
}

impl ClusterProvisioner {
    pub fn new(api: Arc<dyn ClusterApi>, poll: PollPolicy) -> Self {
        Self { api, poll }
    }

    /// Fail before any remote call when the network or role is missing
    fn check_prerequisites(store: &ConfigStore, ctx: &CreateContext) -> Result<()> {
        let missing: Vec<String> = [VPC_ID, SG_ID, SUBNET_A_ID, SUBNET_C_ID, ROLE_ARN]
            .iter()
            .filter(|field| !field.is_set(store))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CloudError::Precondition(format!(
                "missing {}; create the network and IAM role first",
                missing.join(", ")
            )));
        }
        if ctx.db_password.is_none() {
            return Err(CloudError::Precondition(
                "a database password is required to create the cluster".to_string(),
            ));
        }
        Ok(())
    }

    async fn wait_until_available(&self, identifier: &str) -> Result<ClusterInfo> {
        let api = &self.api;
        self.poll
            .wait_until(
                &format!("cluster {} to become available", identifier),
                |attempt| async move {
                    let info = api.describe_cluster(identifier).await?.ok_or_else(|| {
                        CloudError::ResourceNotFound(format!("cluster {}", identifier))
                    })?;
                    debug!("Cluster {} check #{}: {}", identifier, attempt, info.status);
                    let done = match &info.status {
                        ClusterStatus::Available => Some(info),
                        ClusterStatus::Creating => None,
                        other => {
                            warn!(
                                "Cluster {} reports '{}' while creating, still waiting",
                                identifier, other
                            );
                            None
                        }
                    };
                    Ok::<_, CloudError>(done)
                },
            )
            .await
    }

    async fn wait_until_gone(&self, identifier: &str) -> Result<()> {
        let api = &self.api;
        self.poll
            .wait_until(
                &format!("cluster {} to be deleted", identifier),
                |attempt| async move {
                    let found = api.describe_cluster(identifier).await?;
                    if let Some(info) = &found {
                        debug!("Cluster {} check #{}: {}", identifier, attempt, info.status);
                    }
                    Ok::<_, CloudError>(found.is_none().then_some(()))
                },
            )
            .await
    }
}

#[async_trait]
impl Provisioner for ClusterProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cluster
    }

    async fn create(&self, state: &mut StateFile, ctx: &CreateContext) -> Result<()> {
        Self::check_prerequisites(state.store(), ctx)?;
        let password = ctx.db_password.clone().unwrap_or_default();
        let cluster = ClusterSettings::from_store(state.store())?;
        let group = SubnetGroupSettings::from_store(state.store())?;

        // Subnet group
        if !SUBNET_GROUP_ID.is_set(state.store()) {
            let subnet_ids = vec![
                SUBNET_A_ID.read(state.store())?,
                SUBNET_C_ID.read(state.store())?,
            ];
            info!("Create subnet group {}", group.name);
            self.api
                .create_subnet_group(&group.name, &group.description, &subnet_ids)
                .await?;
            SUBNET_GROUP_ID.record(state, group.name.as_str())?;
        }

        // Cluster
        if !CLUSTER_ID.is_set(state.store()) {
            let request = CreateClusterRequest {
                identifier: cluster.identifier.clone(),
                node_type: cluster.node_type.clone(),
                node_count: cluster.node_count,
                db_name: cluster.db_name.clone(),
                port: cluster.db_port,
                master_username: cluster.db_user.clone(),
                master_password: password.clone(),
                subnet_group_name: SUBNET_GROUP_ID.read(state.store())?,
                availability_zone: state.store().get(section::SUBNET_A, "az")?,
                security_group_id: SG_ID.read(state.store())?,
            };
            info!(
                "Create Redshift cluster {} ({} x {})",
                request.identifier, request.node_count, request.node_type
            );
            let created = self.api.create_cluster(&request).await?;
            CLUSTER_ID.record(state, created.identifier)?;
            CLUSTER_DB_PASSWORD.record_literal(state, &password)?;
        } else if CLUSTER_DB_PASSWORD.is_set(state.store()) {
            // Resuming: the recorded password is the one the cluster was created with
            if CLUSTER_DB_PASSWORD.read(state.store())? != password {
                warn!("Keeping the recorded database password of the existing cluster");
            }
        } else {
            CLUSTER_DB_PASSWORD.record_literal(state, &password)?;
        }
        let identifier = CLUSTER_ID.read(state.store())?;

        info!("Waiting for cluster {} to be available", identifier);
        let info = self.wait_until_available(&identifier).await?;
        let endpoint = info.endpoint.ok_or_else(|| {
            CloudError::api(
                "describe_cluster",
                format!("cluster {} is available but has no endpoint", identifier),
            )
        })?;

        if !CLUSTER_ROLE_ARN.is_set(state.store()) {
            let role_arn = ROLE_ARN.read(state.store())?;
            info!("Associate IAM role {} with cluster {}", role_arn, identifier);
            self.api.add_iam_role(&identifier, &role_arn).await?;
            CLUSTER_ROLE_ARN.record(state, role_arn)?;
        }

        info!("Save DB host information in configuration file");
        CLUSTER_DB_HOST.record(state, endpoint)?;

        Ok(())
    }

    async fn delete(&self, state: &mut StateFile) -> Result<()> {
        if CLUSTER_ID.is_set(state.store()) {
            let identifier = CLUSTER_ID.read(state.store())?;
            match self.api.describe_cluster(&identifier).await? {
                None => info!("Cluster {} no longer exists", identifier),
                Some(info) => {
                    if info.status == ClusterStatus::Deleting {
                        info!("Cluster {} is already being deleted", identifier);
                    } else {
                        info!("Delete Redshift cluster {}", identifier);
                        self.api.delete_cluster(&identifier, true).await?;
                    }
                    info!("Waiting for cluster {} to be deleted", identifier);
                    self.wait_until_gone(&identifier).await?;
                }
            }
            state.forget(
                section::CLUSTER,
                &[
                    CLUSTER_ID.key,
                    CLUSTER_ROLE_ARN.key,
                    CLUSTER_DB_HOST.key,
                    CLUSTER_DB_PASSWORD.key,
                ],
            )?;
        }

        if SUBNET_GROUP_ID.is_set(state.store()) {
            let name = SUBNET_GROUP_ID.read(state.store())?;
            info!("Delete subnet group {}", name);
            self.api.delete_subnet_group(&name).await?;
            SUBNET_GROUP_ID.forget(state)?;
        }

        Ok(())
    }
}
