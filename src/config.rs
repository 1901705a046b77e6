//! Control-plane configuration.
//!
//! Loaded from a YAML file (path in `CAPPLANE_CONFIG`, default
//! `capplane.yaml`). A missing file yields the defaults. `PORT` overrides
//! `server.port`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::EnvironmentContext;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "CAPPLANE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "capplane.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Root of the local capability cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// YAML seed for the in-memory resource store.
    #[serde(default)]
    pub store_seed: Option<PathBuf>,

    #[serde(default)]
    pub environments: Vec<EnvironmentContext>,
}

fn default_cache_dir() -> PathBuf { PathBuf::from("capabilities") }

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache_dir: default_cache_dir(),
            store_seed: None,
            environments: Vec::new(),
        }
    }
}

impl PlaneConfig {
    /// Parse and validate a configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file; a missing file yields the defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `CAPPLANE_CONFIG` and apply the `PORT` override.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_yaml_file(Path::new(&path))?;

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT `{}` is not a port number", port)))?;
        }
        Ok(config)
    }

    /// Environment names must be unique and non-empty.
    fn validate(&self) -> Result<(), ConfigError> {
        for (i, env) in self.environments.iter().enumerate() {
            if env.name.is_empty() {
                return Err(ConfigError::Invalid(format!("environments[{}] has no name", i)));
            }
            if self.environments[..i].iter().any(|e| e.name == env.name) {
                return Err(ConfigError::Invalid(format!(
                    "environment `{}` is defined twice",
                    env.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaneConfig::from_yaml("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.cache_dir, PathBuf::from("capabilities"));
        assert!(config.environments.is_empty());
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
server:
  port: 9000
cacheDir: /var/lib/capplane/capabilities
storeSeed: cluster.yaml
environments:
  - name: dev
    namespace: dev-ns
    defaultAppGroup: sandbox
"#;
        let config = PlaneConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.store_seed, Some(PathBuf::from("cluster.yaml")));
        assert_eq!(config.environments[0].namespace, "dev-ns");
    }

    #[test]
    fn test_duplicate_environment_rejected() {
        let yaml = r#"
environments:
  - { name: dev, namespace: a }
  - { name: dev, namespace: b }
"#;
        assert!(matches!(PlaneConfig::from_yaml(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlaneConfig::from_yaml_file(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
