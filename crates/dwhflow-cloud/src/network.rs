//! Network provisioner: VPC, internet gateway, security group, route table, two subnets

use crate::api::NetworkApi;
use crate::error::Result;
use crate::provisioner::fields::{
    IGW_ATTACHMENT, IGW_ID, RT_ID, RT_ROUTE, SG_ID, SG_INGRESS_PORT, SUBNET_A_ASSOCIATION,
    SUBNET_A_ID, SUBNET_C_ASSOCIATION, SUBNET_C_ID, VPC_ID,
};
use crate::provisioner::{CreateContext, Field, Provisioner, ResourceKind};
use async_trait::async_trait;
use dwhflow_config::{StateFile, SubnetSettings, VpcSettings, section};
use std::sync::Arc;
use tracing::info;

const SECURITY_GROUP_DESCRIPTION: &str = "traffic rules over Redshift cluster";
const ANYWHERE: &str = "0.0.0.0/0";

/// Subnet section with its id and route association fields
const SUBNETS: [(&str, Field, Field); 2] = [
    (section::SUBNET_A, SUBNET_A_ID, SUBNET_A_ASSOCIATION),
    (section::SUBNET_C, SUBNET_C_ID, SUBNET_C_ASSOCIATION),
];

pub struct NetworkProvisioner {
    api: Arc<dyn NetworkApi>,
}

impl NetworkProvisioner {
    pub fn new(api: Arc<dyn NetworkApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Provisioner for NetworkProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Network
    }

    async fn create(&self, state: &mut StateFile, _ctx: &CreateContext) -> Result<()> {
        let vpc = VpcSettings::from_store(state.store())?;
        let port: u16 = state.store().get_parsed(section::CLUSTER, "db_port")?;

        // VPC
        if !VPC_ID.is_set(state.store()) {
            info!("Create VPC {} ({})", vpc.name, vpc.cidr);
            let id = self.api.create_vpc(&vpc.cidr, &vpc.name).await?;
            VPC_ID.record(state, id)?;
        }
        let vpc_id = VPC_ID.read(state.store())?;

        // Internet gateway
        if !IGW_ID.is_set(state.store()) {
            info!("Create internet gateway {}", vpc.igw_name);
            let id = self.api.create_internet_gateway(&vpc.igw_name).await?;
            IGW_ID.record(state, id)?;
        }
        let igw_id = IGW_ID.read(state.store())?;
        if !IGW_ATTACHMENT.is_set(state.store()) {
            info!("Attach internet gateway {} to VPC {}", igw_id, vpc_id);
            self.api.attach_internet_gateway(&igw_id, &vpc_id).await?;
            IGW_ATTACHMENT.record(state, vpc_id.as_str())?;
        }

        // Security group
        if !SG_ID.is_set(state.store()) {
            info!("Create security group {}", vpc.sg_name);
            let id = self
                .api
                .create_security_group(&vpc.sg_name, SECURITY_GROUP_DESCRIPTION, &vpc_id)
                .await?;
            SG_ID.record(state, id)?;
        }
        if !SG_INGRESS_PORT.is_set(state.store()) {
            let sg_id = SG_ID.read(state.store())?;
            info!("Allow inbound traffic on port {} to security group {}", port, sg_id);
            self.api.authorize_ingress(&sg_id, ANYWHERE, port).await?;
            SG_INGRESS_PORT.record(state, port.to_string())?;
        }

        // Route table
        if !RT_ID.is_set(state.store()) {
            info!("Create route table {}", vpc.rt_name);
            let id = self.api.create_route_table(&vpc_id, &vpc.rt_name).await?;
            RT_ID.record(state, id)?;
        }
        let rt_id = RT_ID.read(state.store())?;
        if !RT_ROUTE.is_set(state.store()) {
            info!("Route {} of {} to internet gateway {}", ANYWHERE, rt_id, igw_id);
            self.api.create_route(&rt_id, ANYWHERE, &igw_id).await?;
            RT_ROUTE.record(state, igw_id.as_str())?;
        }

        // Subnets
        for (subnet_section, id_field, association_field) in SUBNETS {
            let subnet = SubnetSettings::from_store(state.store(), subnet_section)?;
            if !id_field.is_set(state.store()) {
                info!("Create subnet {} ({}) in {}", subnet.name, subnet.cidr, subnet.az);
                let id = self
                    .api
                    .create_subnet(&vpc_id, &subnet.cidr, &subnet.az, &subnet.name)
                    .await?;
                id_field.record(state, id)?;
            }
            if !association_field.is_set(state.store()) {
                let subnet_id = id_field.read(state.store())?;
                info!("Associate route table {} with subnet {}", rt_id, subnet_id);
                let association = self.api.associate_route_table(&rt_id, &subnet_id).await?;
                association_field.record(state, association)?;
            }
        }

        Ok(())
    }

    async fn delete(&self, state: &mut StateFile) -> Result<()> {
        // Subnets must leave the route table before either is deleted
        for (_, _, association_field) in SUBNETS {
            if association_field.is_set(state.store()) {
                let association = association_field.read(state.store())?;
                info!("Disassociate route table ({})", association);
                self.api.disassociate_route_table(&association).await?;
                association_field.forget(state)?;
            }
        }
        for (_, id_field, _) in SUBNETS {
            if id_field.is_set(state.store()) {
                let subnet_id = id_field.read(state.store())?;
                info!("Delete subnet {}", subnet_id);
                self.api.delete_subnet(&subnet_id).await?;
                id_field.forget(state)?;
            }
        }

        if RT_ID.is_set(state.store()) {
            let rt_id = RT_ID.read(state.store())?;
            info!("Delete route table {}", rt_id);
            self.api.delete_route_table(&rt_id).await?;
            state.forget(section::VPC, &[RT_ID.key, RT_ROUTE.key])?;
        }

        if IGW_ATTACHMENT.is_set(state.store()) {
            let igw_id = IGW_ID.read(state.store())?;
            let attached_vpc = IGW_ATTACHMENT.read(state.store())?;
            info!("Detach internet gateway {} from VPC {}", igw_id, attached_vpc);
            self.api.detach_internet_gateway(&igw_id, &attached_vpc).await?;
            IGW_ATTACHMENT.forget(state)?;
        }
        if IGW_ID.is_set(state.store()) {
            let igw_id = IGW_ID.read(state.store())?;
            info!("Delete internet gateway {}", igw_id);
            self.api.delete_internet_gateway(&igw_id).await?;
            IGW_ID.forget(state)?;
        }

        if SG_ID.is_set(state.store()) {
            let sg_id = SG_ID.read(state.store())?;
            info!("Delete security group {}", sg_id);
            self.api.delete_security_group(&sg_id).await?;
            state.forget(section::VPC, &[SG_ID.key, SG_INGRESS_PORT.key])?;
        }

        if VPC_ID.is_set(state.store()) {
            let vpc_id = VPC_ID.read(state.store())?;
            info!("Delete VPC {}", vpc_id);
            self.api.delete_vpc(&vpc_id).await?;
            VPC_ID.forget(state)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCloud;
    use dwhflow_config::{ConfigStore, Template};
    use tempfile::tempdir;

    fn position(calls: &[String], prefix: &str) -> usize {
        calls
            .iter()
            .position(|call| call.starts_with(prefix))
            .unwrap_or_else(|| panic!("{} was never called", prefix))
    }

    #[tokio::test]
    async fn test_create_records_every_identifier() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dwh.cfg");
        let (mut state, _) = StateFile::open_or_init(&path, &Template::standard("admin")).unwrap();
        let fake = Arc::new(FakeCloud::new());
        let provisioner = NetworkProvisioner::new(fake.clone());

        provisioner
            .create(&mut state, &CreateContext::default())
            .await
            .unwrap();

        let on_disk = ConfigStore::load(&path).unwrap();
        assert!(ResourceKind::Network.is_provisioned(&on_disk));
        assert_eq!(on_disk.get(section::VPC, "sg_ingress_port").unwrap(), "5439");
        assert_eq!(
            on_disk.get(section::VPC, "rt_route").unwrap(),
            on_disk.get(section::VPC, "igw_id").unwrap()
        );
        assert_ne!(
            on_disk.get(section::SUBNET_A, "id").unwrap(),
            on_disk.get(section::SUBNET_C, "id").unwrap()
        );
        assert!(fake.calls().contains(&"authorize_ingress:5439".to_string()));
    }

    #[tokio::test]
    async fn test_delete_respects_dependencies() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dwh.cfg");
        let (mut state, _) = StateFile::open_or_init(&path, &Template::standard("admin")).unwrap();
        let fake = Arc::new(FakeCloud::new());
        let provisioner = NetworkProvisioner::new(fake.clone());

        provisioner
            .create(&mut state, &CreateContext::default())
            .await
            .unwrap();
        fake.clear_calls();
        provisioner.delete(&mut state).await.unwrap();

        let calls = fake.calls();
        let delete_rt = position(&calls, "delete_route_table");
        let detach = position(&calls, "detach_internet_gateway");
        let delete_vpc = position(&calls, "delete_vpc");

        let disassociations: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| call.starts_with("disassociate_route_table"))
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(disassociations.len(), 2);
        assert!(disassociations.iter().all(|idx| *idx < delete_rt));
        assert!(detach < delete_vpc);
        assert!(position(&calls, "delete_internet_gateway") > detach);
        assert!(position(&calls, "delete_security_group") < delete_vpc);
        assert_eq!(delete_vpc, calls.len() - 1);

        assert!(ResourceKind::Network.is_absent(state.store()));
    }

    #[tokio::test]
    async fn test_failure_leaves_confirmed_steps_only() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dwh.cfg");
        let (mut state, _) = StateFile::open_or_init(&path, &Template::standard("admin")).unwrap();
        let fake = Arc::new(FakeCloud::new());
        fake.fail_on("create_route_table");
        let provisioner = NetworkProvisioner::new(fake.clone());

        let result = provisioner.create(&mut state, &CreateContext::default()).await;
        assert!(result.is_err());

        let on_disk = ConfigStore::load(&path).unwrap();
        assert!(VPC_ID.is_set(&on_disk));
        assert!(SG_INGRESS_PORT.is_set(&on_disk));
        assert!(!RT_ID.is_set(&on_disk));
        assert!(!SUBNET_A_ID.is_set(&on_disk));

        // A second run resumes at the failed step
        fake.clear_failure();
        fake.clear_calls();
        provisioner
            .create(&mut state, &CreateContext::default())
            .await
            .unwrap();
        let calls = fake.calls();
        assert!(calls[0].starts_with("create_route_table"));
        assert!(!calls.iter().any(|call| call.starts_with("create_vpc")));
        assert!(ResourceKind::Network.is_provisioned(state.store()));
    }
}
