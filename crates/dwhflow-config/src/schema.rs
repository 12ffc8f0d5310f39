//! Section schema and typed views over the store
//!
//! Provisioners never read raw strings: they read one of the settings
//! structs below, which fail with `MissingKey`/`InvalidValue` at the
//! boundary instead of deep inside a provisioning step.

use crate::error::{ConfigError, Result};
use crate::store::ConfigStore;
use std::fmt;

/// Section names
pub mod section {
    pub const DEFAULT: &str = crate::store::DEFAULT_SECTION;
    pub const S3: &str = "s3";
    pub const VPC: &str = "network.vpc";
    pub const SUBNET_A: &str = "network.subnet.a";
    pub const SUBNET_C: &str = "network.subnet.c";
    pub const IAM_ROLE: &str = "iam.role";
    pub const CLUSTER: &str = "cluster";
    pub const SUBNET_GROUP: &str = "cluster.subnet.group";
}

/// Required input keys of a section
#[derive(Debug, Clone, Copy)]
pub struct SectionSchema {
    pub section: &'static str,
    pub required: &'static [&'static str],
}

pub const SCHEMA: &[SectionSchema] = &[
    SectionSchema {
        section: section::DEFAULT,
        required: &["admin_profile", "region"],
    },
    SectionSchema {
        section: section::S3,
        required: &["log_data", "log_jsonpath", "song_data"],
    },
    SectionSchema {
        section: section::VPC,
        required: &["cidr", "name", "igw_name", "sg_name", "rt_name"],
    },
    SectionSchema {
        section: section::SUBNET_A,
        required: &["cidr", "name", "az"],
    },
    SectionSchema {
        section: section::SUBNET_C,
        required: &["cidr", "name", "az"],
    },
    SectionSchema {
        section: section::IAM_ROLE,
        required: &["name", "policy"],
    },
    SectionSchema {
        section: section::CLUSTER,
        required: &[
            "identifier",
            "db_name",
            "db_user",
            "db_port",
            "node_type",
            "node_count",
        ],
    },
    SectionSchema {
        section: section::SUBNET_GROUP,
        required: &["name", "desc"],
    },
];

/// Check every required key of [`SCHEMA`] is present
pub fn validate(store: &ConfigStore) -> Result<()> {
    let missing: Vec<String> = SCHEMA
        .iter()
        .flat_map(|schema| {
            schema
                .required
                .iter()
                .filter(move |key| !store.has(schema.section, key))
                .map(move |key| format!("{}.{}", schema.section, key))
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Schema { missing })
    }
}

pub fn region(store: &ConfigStore) -> Result<String> {
    store.get(section::DEFAULT, "region")
}

pub fn admin_profile(store: &ConfigStore) -> Result<String> {
    store.get(section::DEFAULT, "admin_profile")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcSettings {
    pub cidr: String,
    pub name: String,
    pub igw_name: String,
    pub sg_name: String,
    pub rt_name: String,
}

impl VpcSettings {
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let s = section::VPC;
        Ok(Self {
            cidr: store.get(s, "cidr")?,
            name: store.get(s, "name")?,
            igw_name: store.get(s, "igw_name")?,
            sg_name: store.get(s, "sg_name")?,
            rt_name: store.get(s, "rt_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSettings {
    pub section: &'static str,
    pub cidr: String,
    pub name: String,
    pub az: String,
}

impl SubnetSettings {
    pub fn from_store(store: &ConfigStore, section: &'static str) -> Result<Self> {
        Ok(Self {
            section,
            cidr: store.get(section, "cidr")?,
            name: store.get(section, "name")?,
            az: store.get(section, "az")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRoleSettings {
    pub name: String,
    pub policy: String,
    /// Role path, scoped to the cluster identifier (`/<identifier>/`)
    pub path: String,
}

impl IamRoleSettings {
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        Ok(Self {
            name: store.get(section::IAM_ROLE, "name")?,
            policy: store.get(section::IAM_ROLE, "policy")?,
            path: format!("/{}/", store.get(section::CLUSTER, "identifier")?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub identifier: String,
    pub db_name: String,
    pub db_user: String,
    pub db_port: u16,
    pub node_type: String,
    pub node_count: i32,
}

impl ClusterSettings {
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let s = section::CLUSTER;
        let node_count: i32 = store.get_parsed(s, "node_count")?;
        if node_count < 2 {
            return Err(ConfigError::invalid_value(
                s,
                "node_count",
                &node_count.to_string(),
                "a multi-node cluster needs at least 2 nodes",
            ));
        }
        Ok(Self {
            identifier: store.get(s, "identifier")?,
            db_name: store.get(s, "db_name")?,
            db_user: store.get(s, "db_user")?,
            db_port: store.get_parsed(s, "db_port")?,
            node_type: store.get(s, "node_type")?,
            node_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetGroupSettings {
    pub name: String,
    pub description: String,
}

impl SubnetGroupSettings {
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        Ok(Self {
            name: store.get(section::SUBNET_GROUP, "name")?,
            description: store.get(section::SUBNET_GROUP, "desc")?,
        })
    }
}

/// Raw data locations loaded into the staging tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Sources {
    pub log_data: String,
    pub log_jsonpath: String,
    pub song_data: String,
}

impl S3Sources {
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        Ok(Self {
            log_data: store.get(section::S3, "log_data")?,
            log_jsonpath: store.get(section::S3, "log_jsonpath")?,
            song_data: store.get(section::S3, "song_data")?,
        })
    }
}

/// Connection parameters written by the cluster provisioner
#[derive(Clone, PartialEq, Eq)]
pub struct DbConnection {
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl DbConnection {
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let s = section::CLUSTER;
        Ok(Self {
            host: store.get(s, "db_host")?,
            name: store.get(s, "db_name")?,
            user: store.get(s, "db_user")?,
            password: store.get(s, "db_password")?,
            port: store.get_parsed(s, "db_port")?,
        })
    }
}

impl fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConnection")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    #[test]
    fn test_validate_reports_every_missing_key() {
        let mut store = ConfigStore::from_template(&Template::standard("admin"));
        store.remove_key(section::VPC, "cidr");
        store.remove_section(section::IAM_ROLE);

        match validate(&store) {
            Err(ConfigError::Schema { missing }) => {
                assert_eq!(
                    missing,
                    vec!["network.vpc.cidr", "iam.role.name", "iam.role.policy"]
                );
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_views() {
        let store = ConfigStore::from_template(&Template::standard("admin.kim"));

        let cluster = ClusterSettings::from_store(&store).unwrap();
        assert_eq!(cluster.db_port, 5439);
        assert_eq!(cluster.node_count, 2);
        assert_eq!(cluster.db_user, "admin.kim");

        let role = IamRoleSettings::from_store(&store).unwrap();
        assert_eq!(role.path, "/dwh-cluster/");

        let subnet = SubnetSettings::from_store(&store, section::SUBNET_A).unwrap();
        assert_eq!(subnet.az, "ap-northeast-2a");
    }

    #[test]
    fn test_single_node_rejected() {
        let mut store = ConfigStore::from_template(&Template::standard("admin"));
        store.set(section::CLUSTER, "node_count", "1");

        assert!(matches!(
            ClusterSettings::from_store(&store),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_db_connection_requires_host() {
        let mut store = ConfigStore::from_template(&Template::standard("admin"));
        assert!(matches!(
            DbConnection::from_store(&store),
            Err(ConfigError::MissingKey { key, .. }) if key == "db_host"
        ));

        store.set(section::CLUSTER, "db_host", "dwh.example.com");
        store.set(section::CLUSTER, "db_password", "Secret123");
        let conn = DbConnection::from_store(&store).unwrap();
        assert_eq!(conn.port, 5439);
        assert!(!format!("{:?}", conn).contains("Secret123"));
    }
}
