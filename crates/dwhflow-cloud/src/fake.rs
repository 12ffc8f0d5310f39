//! In-memory cloud for tests
//!
//! `FakeCloud` implements all three API traits against a call log. Every
//! call is logged as `"operation:argument"` before any injected failure is
//! returned, so tests can assert both what was attempted and in what order.

use crate::api::{
    ClusterApi, ClusterInfo, ClusterStatus, CreateClusterRequest, IamApi, NetworkApi,
};
use crate::error::{CloudError, Result};
use crate::poll::PollPolicy;
use crate::provisioner::{Provisioner, standard_provisioners};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct FakeCluster {
    identifier: String,
    status: ClusterStatus,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<String>,
    next_id: u32,
    fail_on: Option<String>,
    status_script: VecDeque<ClusterStatus>,
    deleting_polls: u32,
    cluster: Option<FakeCluster>,
}

#[derive(Debug)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                deleting_polls: 1,
                ..FakeState::default()
            }),
        }
    }

    /// Statuses returned by successive `describe_cluster` calls on a live
    /// cluster; once exhausted the cluster reports `available`
    pub fn with_status_script(self, script: impl IntoIterator<Item = ClusterStatus>) -> Self {
        self.lock().status_script = script.into_iter().collect();
        self
    }

    /// Number of `deleting` answers before a deleted cluster disappears
    pub fn with_deleting_polls(self, polls: u32) -> Self {
        self.lock().deleting_polls = polls;
        self
    }

    /// Wire the standard provisioners to this fake
    pub fn provisioners(self: &Arc<Self>, poll: PollPolicy) -> Vec<Box<dyn Provisioner>> {
        standard_provisioners(self.clone(), self.clone(), self.clone(), poll)
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of logged calls to `operation`
    pub fn count(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    /// Make every later call to `operation` fail
    pub fn fail_on(&self, operation: &str) {
        self.lock().fail_on = Some(operation.to_string());
    }

    pub fn clear_failure(&self) {
        self.lock().fail_on = None;
    }

    pub fn endpoint_for(&self, identifier: &str) -> String {
        format!("{}.fake.redshift.amazonaws.com", identifier)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // A panicking test must not poison the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log the call and apply any injected failure
    fn call(&self, operation: &str, argument: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("{}:{}", operation, argument));
        if state.fail_on.as_deref() == Some(operation) {
            return Err(CloudError::api(operation, "injected failure"));
        }
        Ok(())
    }

    fn new_id(&self, prefix: &str) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        format!("{}-{:04}", prefix, state.next_id)
    }
}

#[async_trait]
impl NetworkApi for FakeCloud {
    async fn create_vpc(&self, cidr: &str, _name: &str) -> Result<String> {
        self.call("create_vpc", cidr)?;
        Ok(self.new_id("vpc"))
    }

    async fn create_internet_gateway(&self, name: &str) -> Result<String> {
        self.call("create_internet_gateway", name)?;
        Ok(self.new_id("igw"))
    }

    async fn attach_internet_gateway(&self, igw_id: &str, _vpc_id: &str) -> Result<()> {
        self.call("attach_internet_gateway", igw_id)
    }

    async fn create_security_group(
        &self,
        name: &str,
        _description: &str,
        _vpc_id: &str,
    ) -> Result<String> {
        self.call("create_security_group", name)?;
        Ok(self.new_id("sg"))
    }

    async fn authorize_ingress(&self, _sg_id: &str, _cidr: &str, port: u16) -> Result<()> {
        self.call("authorize_ingress", &port.to_string())
    }

    async fn create_route_table(&self, _vpc_id: &str, name: &str) -> Result<String> {
        self.call("create_route_table", name)?;
        Ok(self.new_id("rtb"))
    }

    async fn create_route(&self, rt_id: &str, _destination_cidr: &str, _igw_id: &str) -> Result<()> {
        self.call("create_route", rt_id)
    }

    async fn create_subnet(
        &self,
        _vpc_id: &str,
        cidr: &str,
        _az: &str,
        _name: &str,
    ) -> Result<String> {
        self.call("create_subnet", cidr)?;
        Ok(self.new_id("subnet"))
    }

    async fn associate_route_table(&self, _rt_id: &str, subnet_id: &str) -> Result<String> {
        self.call("associate_route_table", subnet_id)?;
        Ok(self.new_id("rtbassoc"))
    }

    async fn disassociate_route_table(&self, association_id: &str) -> Result<()> {
        self.call("disassociate_route_table", association_id)
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()> {
        self.call("delete_subnet", subnet_id)
    }

    async fn delete_route_table(&self, rt_id: &str) -> Result<()> {
        self.call("delete_route_table", rt_id)
    }

    async fn detach_internet_gateway(&self, igw_id: &str, _vpc_id: &str) -> Result<()> {
        self.call("detach_internet_gateway", igw_id)
    }

    async fn delete_internet_gateway(&self, igw_id: &str) -> Result<()> {
        self.call("delete_internet_gateway", igw_id)
    }

    async fn delete_security_group(&self, sg_id: &str) -> Result<()> {
        self.call("delete_security_group", sg_id)
    }

    async fn delete_vpc(&self, vpc_id: &str) -> Result<()> {
        self.call("delete_vpc", vpc_id)
    }
}

#[async_trait]
impl IamApi for FakeCloud {
    async fn create_role(
        &self,
        path: &str,
        name: &str,
        _trust_policy: &str,
        _description: &str,
    ) -> Result<String> {
        self.call("create_role", &format!("{}{}", path, name))?;
        Ok(format!("arn:aws:iam::000000000000:role{}{}", path, name))
    }

    async fn attach_role_policy(&self, _role_name: &str, policy_arn: &str) -> Result<()> {
        self.call("attach_role_policy", policy_arn)
    }

    async fn detach_role_policy(&self, _role_name: &str, policy_arn: &str) -> Result<()> {
        self.call("detach_role_policy", policy_arn)
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        self.call("delete_role", role_name)
    }
}

#[async_trait]
impl ClusterApi for FakeCloud {
    async fn create_subnet_group(
        &self,
        name: &str,
        _description: &str,
        _subnet_ids: &[String],
    ) -> Result<()> {
        self.call("create_subnet_group", name)
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<ClusterInfo> {
        self.call("create_cluster", &request.identifier)?;
        self.lock().cluster = Some(FakeCluster {
            identifier: request.identifier.clone(),
            status: ClusterStatus::Creating,
        });
        Ok(ClusterInfo {
            identifier: request.identifier.clone(),
            status: ClusterStatus::Creating,
            endpoint: None,
        })
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<Option<ClusterInfo>> {
        self.call("describe_cluster", identifier)?;
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(cluster) = state
            .cluster
            .as_mut()
            .filter(|cluster| cluster.identifier == identifier)
        else {
            return Ok(None);
        };

        if cluster.status == ClusterStatus::Deleting {
            if state.deleting_polls == 0 {
                state.cluster = None;
                return Ok(None);
            }
            state.deleting_polls -= 1;
        } else {
            cluster.status = state
                .status_script
                .pop_front()
                .unwrap_or(ClusterStatus::Available);
        }

        let endpoint = (cluster.status == ClusterStatus::Available)
            .then(|| self.endpoint_for(identifier));
        Ok(Some(ClusterInfo {
            identifier: cluster.identifier.clone(),
            status: cluster.status.clone(),
            endpoint,
        }))
    }

    async fn add_iam_role(&self, identifier: &str, _role_arn: &str) -> Result<()> {
        self.call("add_iam_role", identifier)
    }

    async fn delete_cluster(&self, identifier: &str, _skip_final_snapshot: bool) -> Result<()> {
        self.call("delete_cluster", identifier)?;
        let mut state = self.lock();
        match state.cluster.as_mut() {
            Some(cluster) if cluster.identifier == identifier => {
                cluster.status = ClusterStatus::Deleting;
                Ok(())
            }
            _ => Err(CloudError::ResourceNotFound(format!("cluster {}", identifier))),
        }
    }

    async fn delete_subnet_group(&self, name: &str) -> Result<()> {
        self.call("delete_subnet_group", name)
    }
}
