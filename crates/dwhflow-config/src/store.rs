//! Sectioned key/value store backing the `dwh.cfg` file
//!
//! The on-disk format is INI-style:
//!
//! ```text
//! [DEFAULT]
//! region = ap-northeast-2
//!
//! [network.subnet.a]
//! az = %(region)sa
//! ```
//!
//! Keys in `DEFAULT` are visible from every section. Values may reference
//! other keys with `%(name)s`; references are resolved lazily by [`ConfigStore::get`].

use crate::error::{ConfigError, Result};
use crate::template::Template;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the section whose keys are inherited by every other section
pub const DEFAULT_SECTION: &str = "DEFAULT";

const MAX_INTERPOLATION_DEPTH: usize = 10;

/// In-memory view of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    defaults: BTreeMap<String, String>,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from disk. An absent file is reported as [`ConfigError::NotFound`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let store = Self::parse(&content)?;
        tracing::debug!(
            "Loaded configuration with {} sections from {}",
            store.sections.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parse the INI-style text format
    pub fn parse(text: &str) -> Result<Self> {
        let mut store = Self::new();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                last_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Indented line directly under a key continues its value
            if raw.starts_with([' ', '\t']) {
                if let (Some(section), Some(key)) = (&current, &last_key) {
                    let value = store.entry_mut(section, key);
                    value.push('\n');
                    value.push_str(trimmed);
                    continue;
                }
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| ConfigError::Parse {
                        line,
                        message: format!("malformed section header '{}'", trimmed),
                    })?;
                if name != DEFAULT_SECTION {
                    store.sections.entry(name.to_string()).or_default();
                }
                current = Some(name.to_string());
                last_key = None;
                continue;
            }

            let section = current.as_deref().ok_or_else(|| ConfigError::Parse {
                line,
                message: "key defined before any section header".to_string(),
            })?;

            let split = trimmed.find(['=', ':']).ok_or_else(|| ConfigError::Parse {
                line,
                message: format!("expected 'key = value', found '{}'", trimmed),
            })?;
            let key = trimmed[..split].trim();
            if key.is_empty() {
                return Err(ConfigError::Parse {
                    line,
                    message: "empty key".to_string(),
                });
            }
            let value = trimmed[split + 1..].trim();

            store.set(section, key, value);
            last_key = Some(key.to_string());
        }

        Ok(store)
    }

    /// Materialize a store from a nested default mapping
    pub fn from_template(template: &Template) -> Self {
        let mut store = Self::new();
        for (section, entries) in template.iter() {
            if section != DEFAULT_SECTION {
                store.sections.entry(section.to_string()).or_default();
            }
            for (key, value) in entries {
                store.set(section, key, value.as_str());
            }
        }
        store
    }

    /// Materialize a store from a template and write it to `path`, replacing any existing file
    pub fn init_from_template(path: impl AsRef<Path>, template: &Template) -> Result<Self> {
        let store = Self::from_template(template);
        store.save(path)?;
        Ok(store)
    }

    /// Resolved value of `key` in `section`, falling back to `DEFAULT`
    pub fn get(&self, section: &str, key: &str) -> Result<String> {
        let raw = self
            .entry(section, key)
            .ok_or_else(|| ConfigError::missing_key(section, key))?;
        self.interpolate(section, key, raw, 1)
    }

    pub fn get_int(&self, section: &str, key: &str) -> Result<i64> {
        self.get_parsed(section, key)
    }

    /// Resolved value parsed into `T`
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.get(section, key)?;
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid_value(section, key, &value, e.to_string()))
    }

    /// Stored value without interpolation
    pub fn get_raw(&self, section: &str, key: &str) -> Option<&str> {
        self.entry(section, key)
    }

    pub fn has(&self, section: &str, key: &str) -> bool {
        self.entry(section, key).is_some()
    }

    pub fn has_section(&self, section: &str) -> bool {
        section == DEFAULT_SECTION || self.sections.contains_key(section)
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let value = value.into();
        if section == DEFAULT_SECTION {
            self.defaults.insert(key.to_string(), value);
        } else {
            self.sections
                .entry(section.to_string())
                .or_default()
                .insert(key.to_string(), value);
        }
    }

    /// Store `value` so that [`ConfigStore::get`] returns it verbatim.
    /// Every `%` is escaped as `%%`.
    pub fn set_literal(&mut self, section: &str, key: &str, value: &str) {
        self.set(section, key, value.replace('%', "%%"));
    }

    /// Remove a key owned by `section`. Returns whether it was present.
    pub fn remove_key(&mut self, section: &str, key: &str) -> bool {
        if section == DEFAULT_SECTION {
            return self.defaults.remove(key).is_some();
        }
        self.sections
            .get_mut(section)
            .is_some_and(|entries| entries.remove(key).is_some())
    }

    /// Remove a whole section. `DEFAULT` cannot be removed.
    pub fn remove_section(&mut self, section: &str) -> bool {
        self.sections.remove(section).is_some()
    }

    /// Names of all non-default sections, in sorted order
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Keys owned by `section` (inherited defaults excluded)
    pub fn keys(&self, section: &str) -> Vec<&str> {
        if section == DEFAULT_SECTION {
            return self.defaults.keys().map(String::as_str).collect();
        }
        self.sections
            .get(section)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every `(section, key)` pair stored in the file
    pub fn qualified_keys(&self) -> BTreeSet<(String, String)> {
        let defaults = self
            .defaults
            .keys()
            .map(|key| (DEFAULT_SECTION.to_string(), key.clone()));
        let sections = self.sections.iter().flat_map(|(name, entries)| {
            entries.keys().map(move |key| (name.clone(), key.clone()))
        });
        defaults.chain(sections).collect()
    }

    /// Serialize with `DEFAULT` first and every other section and key sorted
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.defaults.is_empty() {
            write_section(&mut out, DEFAULT_SECTION, &self.defaults);
        }
        for (name, entries) in &self.sections {
            write_section(&mut out, name, entries);
        }
        out
    }

    /// Write the rendered store to `path` via a temporary sibling file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = temp_path(path);
        fs::write(&tmp, self.render())?;
        fs::rename(&tmp, path)?;
        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    fn entry(&self, section: &str, key: &str) -> Option<&str> {
        if section == DEFAULT_SECTION {
            return self.defaults.get(key).map(String::as_str);
        }
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .or_else(|| self.defaults.get(key))
            .map(String::as_str)
    }

    fn entry_mut(&mut self, section: &str, key: &str) -> &mut String {
        let entries = if section == DEFAULT_SECTION {
            &mut self.defaults
        } else {
            self.sections.entry(section.to_string()).or_default()
        };
        entries.entry(key.to_string()).or_default()
    }

    fn interpolate(&self, section: &str, key: &str, raw: &str, depth: usize) -> Result<String> {
        if !raw.contains('%') {
            return Ok(raw.to_string());
        }
        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(ConfigError::InterpolationDepth {
                section: section.to_string(),
                key: key.to_string(),
            });
        }

        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];

            if let Some(after) = tail.strip_prefix('%') {
                out.push('%');
                rest = after;
            } else if let Some(body) = tail.strip_prefix('(') {
                let end = body.find(")s").ok_or_else(|| {
                    ConfigError::invalid_value(section, key, raw, "unterminated %(name)s reference")
                })?;
                let name = &body[..end];
                let (context, value) = self
                    .resolve_reference(section, name)
                    .ok_or_else(|| ConfigError::missing_key(section, name))?;
                out.push_str(&self.interpolate(&context, name, value, depth + 1)?);
                rest = &body[end + 2..];
            } else {
                return Err(ConfigError::invalid_value(
                    section,
                    key,
                    raw,
                    "'%' must be followed by '%' or '('",
                ));
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Look `name` up in `section` (with defaults), then as `<section>.<key>`
    fn resolve_reference(&self, section: &str, name: &str) -> Option<(String, &str)> {
        if let Some(value) = self.entry(section, name) {
            return Some((section.to_string(), value));
        }
        let (ref_section, ref_key) = name.rsplit_once('.')?;
        self.entry(ref_section, ref_key)
            .map(|value| (ref_section.to_string(), value))
    }
}

fn write_section(out: &mut String, name: &str, entries: &BTreeMap<String, String>) {
    let _ = writeln!(out, "[{}]", name);
    for (key, value) in entries {
        let _ = writeln!(out, "{} = {}", key, value.replace('\n', "\n\t"));
    }
    out.push('\n');
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
[DEFAULT]
region = ap-northeast-2
dw_port = 5439

# network
[network.subnet.a]
az = %(region)sa
cidr = 172.10.100.0/24

[cluster]
db_port = %(dw_port)s
identifier = dw
endpoint_url = %(cluster.identifier)s.%(region)s:%(db_port)s
";

    #[test]
    fn test_parse_and_defaults() {
        let store = ConfigStore::parse(SAMPLE).unwrap();

        assert_eq!(store.sections().collect::<Vec<_>>(), vec!["cluster", "network.subnet.a"]);
        assert_eq!(store.get("network.subnet.a", "cidr").unwrap(), "172.10.100.0/24");
        // DEFAULT keys are visible from every section
        assert!(store.has("cluster", "region"));
        assert_eq!(store.keys("cluster"), vec!["db_port", "endpoint_url", "identifier"]);
    }

    #[test]
    fn test_interpolation() {
        let store = ConfigStore::parse(SAMPLE).unwrap();

        assert_eq!(store.get("network.subnet.a", "az").unwrap(), "ap-northeast-2a");
        assert_eq!(store.get_int("cluster", "db_port").unwrap(), 5439);
        assert_eq!(
            store.get("cluster", "endpoint_url").unwrap(),
            "dw.ap-northeast-2:5439"
        );
        assert_eq!(store.get_raw("cluster", "db_port"), Some("%(dw_port)s"));
    }

    #[test]
    fn test_interpolation_escapes_and_errors() {
        let mut store = ConfigStore::new();
        store.set("a", "pct", "100%%");
        store.set("a", "loop", "%(loop)s");
        store.set("a", "dangling", "%(nowhere)s");
        store.set("a", "bad", "50%");

        assert_eq!(store.get("a", "pct").unwrap(), "100%");
        assert!(matches!(
            store.get("a", "loop"),
            Err(ConfigError::InterpolationDepth { .. })
        ));
        assert!(matches!(
            store.get("a", "dangling"),
            Err(ConfigError::MissingKey { key, .. }) if key == "nowhere"
        ));
        assert!(matches!(
            store.get("a", "bad"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_key_and_invalid_int() {
        let mut store = ConfigStore::new();
        store.set("cluster", "node_count", "two");

        assert!(matches!(
            store.get("cluster", "id"),
            Err(ConfigError::MissingKey { .. })
        ));
        assert!(matches!(
            store.get_int("cluster", "node_count"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_remove_key_and_section() {
        let mut store = ConfigStore::parse(SAMPLE).unwrap();

        assert!(store.remove_key("cluster", "identifier"));
        assert!(!store.remove_key("cluster", "identifier"));
        assert!(!store.has("cluster", "identifier"));

        assert!(store.remove_section("network.subnet.a"));
        assert!(!store.has_section("network.subnet.a"));
        assert!(!store.remove_section(DEFAULT_SECTION));
    }

    #[test]
    fn test_continuation_lines() {
        let text = "[etl]\nnote = first\n  second\nnext = 1\n";
        let store = ConfigStore::parse(text).unwrap();

        assert_eq!(store.get("etl", "note").unwrap(), "first\nsecond");
        let reparsed = ConfigStore::parse(&store.render()).unwrap();
        assert_eq!(reparsed, store);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConfigStore::parse("key = value\n"),
            Err(ConfigError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            ConfigStore::parse("[ok]\nno separator here\n"),
            Err(ConfigError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            ConfigStore::parse("[broken\n"),
            Err(ConfigError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_save_is_deterministic() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("dwh.cfg");

        let store = ConfigStore::parse(SAMPLE).unwrap();
        store.save(&path).unwrap();
        let first = fs::read(&path).unwrap();

        ConfigStore::load(&path).unwrap().save(&path).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempdir().unwrap();
        let result = ConfigStore::load(temp_dir.path().join("absent.cfg"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_set_literal_is_not_interpolated() {
        let mut store = ConfigStore::parse(SAMPLE).unwrap();
        store.set_literal("cluster", "secret", "Pa%ss%(region)s");

        assert_eq!(store.get_raw("cluster", "secret"), Some("Pa%%ss%%(region)s"));
        assert_eq!(store.get("cluster", "secret").unwrap(), "Pa%ss%(region)s");

        let reparsed = ConfigStore::parse(&store.render()).unwrap();
        assert_eq!(reparsed.get("cluster", "secret").unwrap(), "Pa%ss%(region)s");
    }
}
