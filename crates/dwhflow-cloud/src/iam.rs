//! IAM role provisioner: a role the cluster assumes to read the raw data bucket

use crate::api::IamApi;
use crate::error::Result;
use crate::provisioner::fields::{ROLE_ARN, ROLE_ATTACHED_POLICY};
use crate::provisioner::{CreateContext, Provisioner, ResourceKind};
use async_trait::async_trait;
use dwhflow_config::{IamRoleSettings, StateFile};
use std::sync::Arc;
use tracing::info;

const ROLE_DESCRIPTION: &str = "Allow Redshift to read S3 buckets";
const TRUSTED_SERVICE: &str = "redshift.amazonaws.com";

/// Trust policy letting only the database service assume the role
pub fn trust_policy() -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": ["sts:AssumeRole"],
                "Principal": {"Service": [TRUSTED_SERVICE]}
            }
        ]
    })
}

pub struct IamRoleProvisioner {
    api: Arc<dyn IamApi>,
}

impl IamRoleProvisioner {
    pub fn new(api: Arc<dyn IamApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Provisioner for IamRoleProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::IamRole
    }

    async fn create(&self, state: &mut StateFile, _ctx: &CreateContext) -> Result<()> {
        let role = IamRoleSettings::from_store(state.store())?;

        if !ROLE_ARN.is_set(state.store()) {
            info!("Create IAM role {} under {}", role.name, role.path);
            let arn = self
                .api
                .create_role(
                    &role.path,
                    &role.name,
                    &trust_policy().to_string(),
                    ROLE_DESCRIPTION,
                )
                .await?;
            ROLE_ARN.record(state, arn)?;
        }

        if !ROLE_ATTACHED_POLICY.is_set(state.store()) {
            info!("Attach policy {} to role {}", role.policy, role.name);
            self.api.attach_role_policy(&role.name, &role.policy).await?;
            ROLE_ATTACHED_POLICY.record(state, role.policy.as_str())?;
        }

        Ok(())
    }

    async fn delete(&self, state: &mut StateFile) -> Result<()> {
        let role = IamRoleSettings::from_store(state.store())?;

        // Detachment must precede deletion
        if ROLE_ATTACHED_POLICY.is_set(state.store()) {
            let policy = ROLE_ATTACHED_POLICY.read(state.store())?;
            info!("Detach policy {} from role {}", policy, role.name);
            self.api.detach_role_policy(&role.name, &policy).await?;
            ROLE_ATTACHED_POLICY.forget(state)?;
        }

        if ROLE_ARN.is_set(state.store()) {
            info!("Delete IAM role {}", role.name);
            self.api.delete_role(&role.name).await?;
            ROLE_ARN.forget(state)?;
        }

        Ok(())
    }
}
