//! Default configuration template

use crate::schema::section;

/// Profile name written into a template when none is given
pub const DEFAULT_ADMIN_PROFILE: &str = "admin";

/// Nested `section -> key -> value` mapping used to seed a new store
///
/// Sections and keys keep their insertion order; [`crate::ConfigStore::save`]
/// sorts them when writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or extend) a section
    pub fn section(mut self, name: &str, entries: &[(&str, &str)]) -> Self {
        for (key, value) in entries {
            self = self.with_value(name, key, *value);
        }
        if !self.sections.iter().any(|(existing, _)| existing == name) {
            self.sections.push((name.to_string(), Vec::new()));
        }
        self
    }

    /// Set a single value, replacing any previous value for the same key
    pub fn with_value(mut self, section: &str, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        let entries = match self.sections.iter().position(|(name, _)| name == section) {
            Some(idx) => &mut self.sections[idx].1,
            None => {
                self.sections.push((section.to_string(), Vec::new()));
                let last = self.sections.len() - 1;
                &mut self.sections[last].1
            }
        };
        match entries.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(name, _)| name == section)
            .and_then(|(_, entries)| entries.iter().find(|(k, _)| k == key))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(String, String)])> {
        self.sections
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    /// The standard single-VPC, two-subnet, multi-node cluster layout
    pub fn standard(admin_profile: &str) -> Self {
        Self::new()
            .section(
                section::DEFAULT,
                &[
                    ("admin_profile", admin_profile),
                    ("region", "ap-northeast-2"),
                    ("dw_port", "5439"),
                ],
            )
            .section(
                section::S3,
                &[
                    ("log_data", "s3://udacity-dend/log-data"),
                    ("log_jsonpath", "s3://udacity-dend/log_json_path.json"),
                    ("song_data", "s3://udacity-dend/song-data"),
                ],
            )
            .section(
                section::VPC,
                &[
                    ("cidr", "172.10.0.0/16"),
                    ("name", "dwh"),
                    ("igw_name", "dwh-igw"),
                    ("sg_name", "redshift"),
                    ("rt_name", "dwh-rt-pub"),
                ],
            )
            .section(
                section::SUBNET_A,
                &[
                    ("cidr", "172.10.100.0/24"),
                    ("name", "dwh-pub-a"),
                    ("az", "%(region)sa"),
                ],
            )
            .section(
                section::SUBNET_C,
                &[
                    ("cidr", "172.10.101.0/24"),
                    ("name", "dwh-pub-c"),
                    ("az", "%(region)sc"),
                ],
            )
            .section(
                section::IAM_ROLE,
                &[
                    ("name", "dwh-redshift-s3-read"),
                    ("policy", "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess"),
                ],
            )
            .section(
                section::CLUSTER,
                &[
                    ("identifier", "dwh-cluster"),
                    ("db_name", "sparkify"),
                    ("db_user", "%(admin_profile)s"),
                    ("db_port", "%(dw_port)s"),
                    ("node_type", "dc2.large"),
                    ("node_count", "2"),
                ],
            )
            .section(
                section::SUBNET_GROUP,
                &[
                    ("name", "dwh-subnet-group"),
                    ("desc", "Subnets of the dwh Redshift cluster"),
                ],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConfigStore;

    #[test]
    fn test_with_value_overrides() {
        let template = Template::standard("admin.kim").with_value(section::DEFAULT, "dw_port", "5440");

        assert_eq!(template.get(section::DEFAULT, "dw_port"), Some("5440"));
        assert_eq!(template.get(section::DEFAULT, "admin_profile"), Some("admin.kim"));
        assert_eq!(
            template.iter().filter(|(name, _)| *name == section::DEFAULT).count(),
            1
        );
    }

    #[test]
    fn test_standard_template_resolves() {
        let store = ConfigStore::from_template(&Template::standard("admin.kim"));

        assert_eq!(store.get(section::CLUSTER, "db_user").unwrap(), "admin.kim");
        assert_eq!(store.get_int(section::CLUSTER, "db_port").unwrap(), 5439);
        assert_eq!(store.get(section::SUBNET_C, "az").unwrap(), "ap-northeast-2c");
        assert_eq!(store.get(section::S3, "log_data").unwrap(), "s3://udacity-dend/log-data");
        assert_eq!(store.get(section::S3, "song_data").unwrap(), "s3://udacity-dend/song-data");
        crate::schema::validate(&store).unwrap();
    }
}
