//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Cleanup engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Days a canvas must age before it becomes eligible for deletion.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Page size for the eligibility scan.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum canvases deleted in a single run. The only internal guard
    /// against unbounded runtime; remaining eligible canvases are picked
    /// up by the next scheduled run.
    #[serde(default = "default_safety_cap")]
    pub safety_cap: u64,
    /// Minutes after which a held run lock is presumed abandoned by a
    /// crashed run and may be forcibly released.
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u64,
}

fn default_retention_days() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_safety_cap() -> u64 {
    1000
}

fn default_lock_stale_minutes() -> u64 {
    30
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            page_size: default_page_size(),
            safety_cap: default_safety_cap(),
            lock_stale_minutes: default_lock_stale_minutes(),
        }
    }
}

impl CleanupConfig {
    /// Get the retention period as a Duration.
    pub fn retention_period(&self) -> Duration {
        let days = i64::try_from(self.retention_days).unwrap_or(i64::MAX);
        Duration::days(days)
    }

    /// Get the lock staleness threshold as a Duration.
    pub fn lock_stale_after(&self) -> Duration {
        let minutes = i64::try_from(self.lock_stale_minutes).unwrap_or(i64::MAX);
        Duration::minutes(minutes)
    }

    /// Validate cleanup configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("cleanup page_size must be greater than zero".to_string());
        }
        if self.safety_cap == 0 {
            return Err("cleanup safety_cap must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Blob store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if unset.
        /// WARNING: prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient credential chain if unset.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO
        /// and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blobs"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database file.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

/// Top-level configuration for the retention subsystem.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Blob store configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Cleanup engine configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl AppConfig {
    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.cleanup.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_defaults_match_retention_policy() {
        let config = CleanupConfig::default();
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.safety_cap, 1000);
        assert_eq!(config.lock_stale_minutes, 30);
        assert_eq!(config.retention_period(), Duration::days(30));
        assert_eq!(config.lock_stale_after(), Duration::minutes(30));
    }

    #[test]
    fn cleanup_deserialize_fills_missing_fields() {
        let config: CleanupConfig = serde_json::from_str(r#"{"retention_days": 7}"#).unwrap();
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.safety_cap, 1000);
    }

    #[test]
    fn cleanup_rejects_zero_page_size() {
        let config = CleanupConfig {
            page_size: 0,
            ..CleanupConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn s3_rejects_partial_credentials() {
        let config = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn app_config_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
