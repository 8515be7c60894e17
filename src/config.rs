//! Configuration for a visitdb instance.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Command-line flags are applied on top in `main`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::SUMMARY_LIMIT;
use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Byte limit for the whole store; `None` means unlimited
    pub quota_bytes: Option<u64>,
    /// fsync every write
    pub strict_durability: bool,
    pub storage: TierConfig,
    pub maintenance: MaintenanceConfig,
    pub relay: RelayConfig,
    pub sender: SenderConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.max_active == 0 {
            return Err(Error::Config("storage.max_active must be at least 1".into()));
        }
        if self.maintenance.interval_secs == 0 {
            return Err(Error::Config("maintenance.interval_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Tier placement policy
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Visits older than this many days live in the archived tier
    pub archive_threshold_days: u32,
    /// Active-tier size that triggers a threshold sweep
    pub max_active: usize,
    /// Characters of summary kept when archiving
    pub summary_limit: usize,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            archive_threshold_days: 100,
            max_active: 500,
            summary_limit: SUMMARY_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
}

impl MaintenanceConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 5 * 60,
            interval_secs: 60 * 60,
        }
    }
}

/// Email relay account
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    /// Public key of the relay account
    pub user_key: String,
    /// Log sends instead of calling the relay
    pub dry_run: bool,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.emailjs.com/api/v1.0/email/send".to_string(),
            service_id: String::new(),
            template_id: String::new(),
            user_key: String::new(),
            dry_run: true,
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub name: String,
    pub email: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            name: "Business Development".to_string(),
            email: "sales@example.com".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("visitdb.json");
        fs::write(&path, r#"{ "storage": { "max_active": 50 }, "relay": { "dry_run": false } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.max_active, 50);
        assert_eq!(config.storage.archive_threshold_days, 100);
        assert!(!config.relay.dry_run);
        assert_eq!(config.maintenance.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("visitdb.json");
        fs::write(&path, r#"{ "storage": { "max_active": 0 } }"#).unwrap();

        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
