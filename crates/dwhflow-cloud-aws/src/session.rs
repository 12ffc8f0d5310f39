//! Shared SDK configuration for one profile and region

use crate::ec2::Ec2Network;
use crate::iam::AwsIam;
use crate::redshift::RedshiftClusters;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use dwhflow_cloud::{PollPolicy, Provisioner, standard_provisioners};
use std::sync::Arc;
use tracing::info;

/// Loaded AWS configuration, from which the service clients are built
#[derive(Debug, Clone)]
pub struct AwsSession {
    sdk_config: SdkConfig,
}

impl AwsSession {
    /// Resolve credentials for `profile` from the shared config files
    pub async fn connect(profile: &str, region: &str) -> Self {
        info!("Creating AWS session (profile: {}, region: {})", profile, region);
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(profile)
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self { sdk_config }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }

    pub fn network(&self) -> Ec2Network {
        Ec2Network::new(aws_sdk_ec2::Client::new(&self.sdk_config))
    }

    pub fn iam(&self) -> AwsIam {
        AwsIam::new(aws_sdk_iam::Client::new(&self.sdk_config))
    }

    pub fn clusters(&self) -> RedshiftClusters {
        RedshiftClusters::new(aws_sdk_redshift::Client::new(&self.sdk_config))
    }

    /// Network, IAM role and cluster provisioners backed by this session
    pub fn provisioners(&self, poll: PollPolicy) -> Vec<Box<dyn Provisioner>> {
        standard_provisioners(
            Arc::new(self.network()),
            Arc::new(self.iam()),
            Arc::new(self.clusters()),
            poll,
        )
    }
}
