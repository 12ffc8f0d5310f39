//! IAM implementation of the identity API

use crate::error::{missing_field, sdk_error};
use async_trait::async_trait;
use aws_sdk_iam::Client;
use dwhflow_cloud::{IamApi, Result};

pub struct AwsIam {
    client: Client,
}

impl AwsIam {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IamApi for AwsIam {
    async fn create_role(
        &self,
        path: &str,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> Result<String> {
        let output = self
            .client
            .create_role()
            .path(path)
            .role_name(name)
            .assume_role_policy_document(trust_policy)
            .description(description)
            .send()
            .await
            .map_err(|e| sdk_error("CreateRole", e))?;
        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| missing_field("CreateRole", "role"))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("AttachRolePolicy", e))?;
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("DetachRolePolicy", e))?;
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteRole", e))?;
        Ok(())
    }
}
