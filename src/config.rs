//! Configuration loading and types for fakestore.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Every field has a default, so an empty file (or no
//! file at all) yields a working filesystem-backed setup.

use serde::Deserialize;
use std::path::Path;

/// Environment variable overriding the filesystem storage root.
pub const STORAGE_ROOT_ENV: &str = "STORAGE_ROOT";

/// Environment variable overriding the bootstrap seed directory.
pub const SEED_DIR_ENV: &str = "SEED_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Initial object loading.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `filesystem` or `memory`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Filesystem backend configuration.
    #[serde(default)]
    pub filesystem: FilesystemStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            filesystem: FilesystemStorageConfig::default(),
        }
    }
}

/// Filesystem backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesystemStorageConfig {
    /// Root directory; one subdirectory per bucket.
    #[serde(default = "default_storage_root")]
    pub root_dir: String,
}

impl Default for FilesystemStorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
        }
    }
}

/// Bootstrap loader configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    /// Mounted directory whose first-level folders are buckets.
    /// Unset means nothing is loaded.
    #[serde(default)]
    pub seed_dir: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Count storage operations with the `metrics` facade.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Address for a Prometheus scrape listener, e.g. `127.0.0.1:9100`.
    #[serde(default)]
    pub metrics_listen: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            metrics_listen: None,
        }
    }
}

impl Config {
    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(STORAGE_ROOT_ENV).ok(),
            std::env::var(SEED_DIR_ENV).ok(),
        )
    }

    /// Replace the storage root and/or seed directory.  Empty values are
    /// ignored.
    pub fn with_overrides(mut self, storage_root: Option<String>, seed_dir: Option<String>) -> Self {
        if let Some(root) = storage_root.filter(|r| !r.is_empty()) {
            self.storage.filesystem.root_dir = root;
        }
        if let Some(seed) = seed_dir.filter(|s| !s.is_empty()) {
            self.bootstrap.seed_dir = Some(seed);
        }
        self
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_storage_backend() -> String {
    "filesystem".to_string()
}

fn default_storage_root() -> String {
    "./data/storage".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.storage.backend, "filesystem");
        assert_eq!(config.storage.filesystem.root_dir, "./data/storage");
        assert!(config.bootstrap.seed_dir.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert!(config.observability.metrics);
        assert!(config.observability.metrics_listen.is_none());
    }

    #[test]
    fn test_partial_document() {
        let yaml = r#"
storage:
  backend: memory
bootstrap:
  seed_dir: /storage
logging:
  format: json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.filesystem.root_dir, "./data/storage");
        assert_eq!(config.bootstrap.seed_dir.as_deref(), Some("/storage"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::default().with_overrides(Some("/srv/store".to_string()), None);
        assert_eq!(config.storage.filesystem.root_dir, "/srv/store");
        assert!(config.bootstrap.seed_dir.is_none());

        let config = Config::default().with_overrides(None, Some("/storage".to_string()));
        assert_eq!(config.storage.filesystem.root_dir, "./data/storage");
        assert_eq!(config.bootstrap.seed_dir.as_deref(), Some("/storage"));

        let config = Config::default().with_overrides(Some(String::new()), Some(String::new()));
        assert_eq!(config.storage.filesystem.root_dir, "./data/storage");
        assert!(config.bootstrap.seed_dir.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fakestore.yaml");
        std::fs::write(&path, "storage:\n  filesystem:\n    root_dir: /srv/objects\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.filesystem.root_dir, "/srv/objects");
        assert!(load_config(dir.path().join("missing.yaml")).is_err());
    }
}
