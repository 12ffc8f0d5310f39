//! Persisted state file and advisory lock
//!
//! [`StateFile`] is the only way provisioners mutate the configuration:
//! every `record`/`forget` writes the file before returning, so an
//! interrupted run leaves a snapshot of exactly the steps that completed.

use crate::error::{ConfigError, Result};
use crate::schema;
use crate::store::ConfigStore;
use crate::template::Template;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default configuration file name, relative to the working directory
pub const CONFIG_FILE: &str = "dwh.cfg";

/// A configuration store bound to its file
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    store: ConfigStore,
}

impl StateFile {
    /// Open an existing file. Fails with `NotFound` if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = ConfigStore::load(&path)?;
        schema::validate(&store)?;
        Ok(Self { path, store })
    }

    /// Open the file, materializing it from `template` first if it is absent.
    /// The flag reports whether the file was created.
    pub fn open_or_init(path: impl AsRef<Path>, template: &Template) -> Result<(Self, bool)> {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(state) => Ok((state, false)),
            Err(ConfigError::NotFound { .. }) => {
                tracing::info!("Create configuration file {}", path.display());
                let store = ConfigStore::init_from_template(path, template)?;
                schema::validate(&store)?;
                Ok((
                    Self {
                        path: path.to_path_buf(),
                        store,
                    },
                    true,
                ))
            }
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Set a value and persist immediately
    pub fn record(&mut self, section: &str, key: &str, value: impl Into<String>) -> Result<()> {
        self.store.set(section, key, value);
        self.save()
    }

    /// Set a value that must read back verbatim and persist immediately
    pub fn record_literal(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        self.store.set_literal(section, key, value);
        self.save()
    }

    /// Remove keys owned by `section` and persist immediately
    pub fn forget(&mut self, section: &str, keys: &[&str]) -> Result<()> {
        let mut changed = false;
        for key in keys {
            changed |= self.store.remove_key(section, key);
        }
        if changed { self.save() } else { Ok(()) }
    }

    pub fn save(&self) -> Result<()> {
        self.store.save(&self.path)
    }
}

/// Delete the configuration file
pub fn delete_config(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Deleted configuration file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for exclusive use of a configuration file
#[derive(Debug)]
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Acquire `<config>.lock`. A lock younger than one hour is respected;
    /// an older one is considered stale and replaced.
    pub fn acquire(config_path: impl AsRef<Path>) -> Result<Self> {
        let lock_path = lock_path_for(config_path.as_ref());

        if let Ok(content) = fs::read_to_string(&lock_path) {
            match serde_json::from_str::<LockInfo>(&content) {
                Ok(info) => {
                    let age = Utc::now().signed_duration_since(info.acquired_at);
                    if age.num_hours() < 1 {
                        return Err(ConfigError::Locked {
                            holder: format!("{} (pid {})", info.holder, info.pid),
                            since: info.acquired_at.to_rfc3339(),
                        });
                    }
                    tracing::warn!("Removing stale lock from {}", info.holder);
                }
                Err(_) => {
                    // Possibly created by another process that has not written it yet
                    let modified: DateTime<Utc> = fs::metadata(&lock_path)?.modified()?.into();
                    if Utc::now().signed_duration_since(modified).num_hours() < 1 {
                        return Err(ConfigError::Locked {
                            holder: "another process".to_string(),
                            since: modified.to_rfc3339(),
                        });
                    }
                    tracing::warn!("Removing unreadable lock file {}", lock_path.display());
                }
            }
            fs::remove_file(&lock_path)?;
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ConfigError::Locked {
                    holder: "another process".to_string(),
                    since: Utc::now().to_rfc3339(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(serde_json::to_string_pretty(&info)?.as_bytes())?;

        tracing::debug!("Acquired state lock {}", lock_path.display());
        Ok(Self {
            lock_path,
            released: false,
        })
    }

    /// Release the lock
    pub fn release(mut self) -> Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path)?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = self.remove();
    }
}

fn lock_path_for(config_path: &Path) -> PathBuf {
    let mut name = config_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::section;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_open_or_init_creates_once() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        let template = Template::standard("admin");

        let (state, created) = StateFile::open_or_init(&path, &template).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(state.store().get(section::CLUSTER, "db_port").unwrap(), "5439");

        let (_, created) = StateFile::open_or_init(&path, &template).unwrap();
        assert!(!created);
    }

    #[test]
    fn test_record_and_forget_persist() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        let (mut state, _) = StateFile::open_or_init(&path, &Template::standard("admin")).unwrap();

        state.record(section::VPC, "id", "vpc-0001").unwrap();
        let on_disk = ConfigStore::load(&path).unwrap();
        assert_eq!(on_disk.get(section::VPC, "id").unwrap(), "vpc-0001");

        state.forget(section::VPC, &["id", "never-set"]).unwrap();
        let on_disk = ConfigStore::load(&path).unwrap();
        assert!(!on_disk.has(section::VPC, "id"));
    }

    #[test]
    fn test_open_rejects_incomplete_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "[DEFAULT]\nregion = us-east-1\n").unwrap();

        assert!(matches!(
            StateFile::open(&path),
            Err(ConfigError::Schema { .. })
        ));
    }

    #[test]
    fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);

        let lock = StateLock::acquire(&path).unwrap();
        assert!(matches!(
            StateLock::acquire(&path),
            Err(ConfigError::Locked { .. })
        ));

        lock.release().unwrap();
        let relocked = StateLock::acquire(&path).unwrap();
        drop(relocked);
        assert!(!lock_path_for(&path).exists());
    }

    #[test]
    fn test_stale_lock_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        let stale = LockInfo {
            holder: "old-host".to_string(),
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        fs::write(lock_path_for(&path), serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(StateLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_unwritten_lock_is_held_until_stale() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        let lock_path = lock_path_for(&path);
        let file = fs::File::create(&lock_path).unwrap();

        assert!(matches!(
            StateLock::acquire(&path),
            Err(ConfigError::Locked { .. })
        ));
        assert!(lock_path.exists());

        file.set_modified(SystemTime::now() - Duration::from_secs(2 * 3600))
            .unwrap();
        drop(file);
        assert!(StateLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_delete_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        StateFile::open_or_init(&path, &Template::standard("admin")).unwrap();

        delete_config(&path).unwrap();
        assert!(!path.exists());
        assert!(matches!(
            delete_config(&path),
            Err(ConfigError::NotFound { .. })
        ));
    }
}
