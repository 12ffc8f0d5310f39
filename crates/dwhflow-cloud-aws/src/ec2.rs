//! EC2 implementation of the network API

use crate::error::{missing_field, sdk_error};
use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{IpPermission, IpRange, ResourceType, Tag, TagSpecification};
use dwhflow_cloud::{NetworkApi, Result};
use tracing::debug;

pub struct Ec2Network {
    client: Client,
}

impl Ec2Network {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// `Name` tag applied at creation time
fn name_tag(resource_type: ResourceType, name: &str) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource_type)
        .tags(Tag::builder().key("Name").value(name).build())
        .build()
}

fn tcp_ingress(cidr: &str, port: u16) -> IpPermission {
    IpPermission::builder()
        .ip_protocol("tcp")
        .from_port(i32::from(port))
        .to_port(i32::from(port))
        .ip_ranges(IpRange::builder().cidr_ip(cidr).build())
        .build()
}

#[async_trait]
impl NetworkApi for Ec2Network {
    async fn create_vpc(&self, cidr: &str, name: &str) -> Result<String> {
        let output = self
            .client
            .create_vpc()
            .cidr_block(cidr)
            .tag_specifications(name_tag(ResourceType::Vpc, name))
            .send()
            .await
            .map_err(|e| sdk_error("CreateVpc", e))?;
        let id = output
            .vpc()
            .and_then(|vpc| vpc.vpc_id())
            .ok_or_else(|| missing_field("CreateVpc", "vpc id"))?;
        debug!("Created VPC {}", id);
        Ok(id.to_string())
    }

    async fn create_internet_gateway(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .create_internet_gateway()
            .tag_specifications(name_tag(ResourceType::InternetGateway, name))
            .send()
            .await
            .map_err(|e| sdk_error("CreateInternetGateway", e))?;
        output
            .internet_gateway()
            .and_then(|igw| igw.internet_gateway_id())
            .map(str::to_string)
            .ok_or_else(|| missing_field("CreateInternetGateway", "internet gateway id"))
    }

    async fn attach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> Result<()> {
        self.client
            .attach_internet_gateway()
            .internet_gateway_id(igw_id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| sdk_error("AttachInternetGateway", e))?;
        Ok(())
    }

    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: &str,
    ) -> Result<String> {
        let output = self
            .client
            .create_security_group()
            .group_name(name)
            .description(description)
            .vpc_id(vpc_id)
            .tag_specifications(name_tag(ResourceType::SecurityGroup, name))
            .send()
            .await
            .map_err(|e| sdk_error("CreateSecurityGroup", e))?;
        output
            .group_id()
            .map(str::to_string)
            .ok_or_else(|| missing_field("CreateSecurityGroup", "group id"))
    }

    async fn authorize_ingress(&self, sg_id: &str, cidr: &str, port: u16) -> Result<()> {
        self.client
            .authorize_security_group_ingress()
            .group_id(sg_id)
            .ip_permissions(tcp_ingress(cidr, port))
            .send()
            .await
            .map_err(|e| sdk_error("AuthorizeSecurityGroupIngress", e))?;
        Ok(())
    }

    async fn create_route_table(&self, vpc_id: &str, name: &str) -> Result<String> {
        let output = self
            .client
            .create_route_table()
            .vpc_id(vpc_id)
            .tag_specifications(name_tag(ResourceType::RouteTable, name))
            .send()
            .await
            .map_err(|e| sdk_error("CreateRouteTable", e))?;
        output
            .route_table()
            .and_then(|rt| rt.route_table_id())
            .map(str::to_string)
            .ok_or_else(|| missing_field("CreateRouteTable", "route table id"))
    }

    async fn create_route(&self, rt_id: &str, destination_cidr: &str, igw_id: &str) -> Result<()> {
        self.client
            .create_route()
            .route_table_id(rt_id)
            .destination_cidr_block(destination_cidr)
            .gateway_id(igw_id)
            .send()
            .await
            .map_err(|e| sdk_error("CreateRoute", e))?;
        Ok(())
    }

    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: &str,
        az: &str,
        name: &str,
    ) -> Result<String> {
        let output = self
            .client
            .create_subnet()
            .vpc_id(vpc_id)
            .cidr_block(cidr)
            .availability_zone(az)
            .tag_specifications(name_tag(ResourceType::Subnet, name))
            .send()
            .await
            .map_err(|e| sdk_error("CreateSubnet", e))?;
        output
            .subnet()
            .and_then(|subnet| subnet.subnet_id())
            .map(str::to_string)
            .ok_or_else(|| missing_field("CreateSubnet", "subnet id"))
    }

    async fn associate_route_table(&self, rt_id: &str, subnet_id: &str) -> Result<String> {
        let output = self
            .client
            .associate_route_table()
            .route_table_id(rt_id)
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(|e| sdk_error("AssociateRouteTable", e))?;
        output
            .association_id()
            .map(str::to_string)
            .ok_or_else(|| missing_field("AssociateRouteTable", "association id"))
    }

    async fn disassociate_route_table(&self, association_id: &str) -> Result<()> {
        self.client
            .disassociate_route_table()
            .association_id(association_id)
            .send()
            .await
            .map_err(|e| sdk_error("DisassociateRouteTable", e))?;
        Ok(())
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()> {
        self.client
            .delete_subnet()
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteSubnet", e))?;
        Ok(())
    }

    async fn delete_route_table(&self, rt_id: &str) -> Result<()> {
        self.client
            .delete_route_table()
            .route_table_id(rt_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteRouteTable", e))?;
        Ok(())
    }

    async fn detach_internet_gateway(&self, igw_id: &str, vpc_id: &str) -> Result<()> {
        self.client
            .detach_internet_gateway()
            .internet_gateway_id(igw_id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| sdk_error("DetachInternetGateway", e))?;
        Ok(())
    }

    async fn delete_internet_gateway(&self, igw_id: &str) -> Result<()> {
        self.client
            .delete_internet_gateway()
            .internet_gateway_id(igw_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteInternetGateway", e))?;
        Ok(())
    }

    async fn delete_security_group(&self, sg_id: &str) -> Result<()> {
        self.client
            .delete_security_group()
            .group_id(sg_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteSecurityGroup", e))?;
        Ok(())
    }

    async fn delete_vpc(&self, vpc_id: &str) -> Result<()> {
        self.client
            .delete_vpc()
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteVpc", e))?;
        Ok(())
    }
}
