//! Construction-time configuration for the student store.
//!
//! # Responsibility
//! - Name the database location, schema version and worker count.
//! - Apply environment overrides for hosts without a config file.
//!
//! # Invariants
//! - A validated config has a non-empty file name, `version >= 1` and
//!   `pool_size >= 1`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_NAME: &str = "student_db";
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_POOL_SIZE: usize = 2;

const ENV_DATA_DIR: &str = "ROLLCALL_DATA_DIR";
const ENV_DB_NAME: &str = "ROLLCALL_DB_NAME";
const ENV_SCHEMA_VERSION: &str = "ROLLCALL_SCHEMA_VERSION";
const ENV_POOL_SIZE: &str = "ROLLCALL_POOL_SIZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyName,
    ZeroVersion,
    ZeroPoolSize,
    InvalidEnv { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "database name cannot be empty"),
            Self::ZeroVersion => write!(f, "schema version must be at least 1"),
            Self::ZeroPoolSize => write!(f, "worker pool size must be at least 1"),
            Self::InvalidEnv { key, value } => {
                write!(f, "invalid value `{value}` for environment variable {key}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Store location and runtime sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory that holds the database file.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    #[serde(default = "default_name")]
    pub name: String,
    /// Schema version mirrored to `PRAGMA user_version`.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Worker threads owned by each repository.
    #[serde(default = "default_pool_size", rename = "poolSize", alias = "pool_size")]
    pub pool_size: usize,
}

fn default_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

fn default_version() -> u32 {
    DEFAULT_SCHEMA_VERSION
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl StoreConfig {
    /// Creates a config rooted at `data_dir` with default name, version and pool size.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            name: default_name(),
            version: default_version(),
            pool_size: default_pool_size(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Builds a config from `ROLLCALL_*` environment variables.
    ///
    /// Unset or blank variables fall back to `default_dir` and the defaults.
    ///
    /// # Errors
    /// - `InvalidEnv` when a numeric variable does not parse.
    /// - Any error from [`StoreConfig::validate`].
    pub fn from_env(default_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_lookup(default_dir, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        default_dir: impl AsRef<Path>,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let read = |key: &'static str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let data_dir = read(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_dir.as_ref().to_path_buf());
        let mut config = Self::new(data_dir);

        if let Some(name) = read(ENV_DB_NAME) {
            config.name = name;
        }
        if let Some(raw) = read(ENV_SCHEMA_VERSION) {
            config.version = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_SCHEMA_VERSION,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = read(ENV_POOL_SIZE) {
            config.pool_size = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_POOL_SIZE,
                value: raw.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.version == 0 {
            return Err(ConfigError::ZeroVersion);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        Ok(())
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig, DEFAULT_DB_NAME, DEFAULT_POOL_SIZE};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(
        pairs: &[(&'static str, &'static str)],
    ) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> = pairs
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn new_applies_defaults() {
        let config = StoreConfig::new("/tmp/rollcall");
        assert_eq!(config.name, DEFAULT_DB_NAME);
        assert_eq!(config.version, 1);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/rollcall/student_db"));
    }

    #[test]
    fn validate_rejects_zero_sizes_and_blank_name() {
        assert_eq!(
            StoreConfig::new("/tmp").with_pool_size(0).validate(),
            Err(ConfigError::ZeroPoolSize)
        );
        assert_eq!(
            StoreConfig::new("/tmp").with_version(0).validate(),
            Err(ConfigError::ZeroVersion)
        );
        assert_eq!(
            StoreConfig::new("/tmp").with_name("  ").validate(),
            Err(ConfigError::EmptyName)
        );
    }

    #[test]
    fn env_overrides_replace_defaults_and_ignore_blanks() {
        let lookup = lookup_from(&[
            ("ROLLCALL_DATA_DIR", "/var/lib/rollcall"),
            ("ROLLCALL_DB_NAME", " "),
            ("ROLLCALL_POOL_SIZE", "4"),
        ]);
        let config = StoreConfig::from_lookup("/tmp", lookup).expect("env config should parse");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/rollcall"));
        assert_eq!(config.name, DEFAULT_DB_NAME);
        assert_eq!(config.pool_size, 4);
    }

    #[test]
    fn deserializes_recognized_options_with_defaults() {
        let config: StoreConfig = serde_json::from_value(serde_json::json!({
            "data_dir": "/srv/rollcall",
            "poolSize": 3
        }))
        .expect("config should deserialize");
        assert_eq!(config.name, DEFAULT_DB_NAME);
        assert_eq!(config.version, 1);
        assert_eq!(config.pool_size, 3);
    }

    #[test]
    fn env_rejects_unparsable_numbers() {
        let lookup = lookup_from(&[("ROLLCALL_SCHEMA_VERSION", "two")]);
        let err = StoreConfig::from_lookup("/tmp", lookup).expect_err("bad version must fail");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { key: "ROLLCALL_SCHEMA_VERSION", .. }
        ));
    }
}
