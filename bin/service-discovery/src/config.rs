//! Daemon configuration loaded from YAML

use anyhow::{Context, Result};
use registry_core::ReconcilerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "SERVICE_DISCOVERY_CONFIG";
pub const EXPOSE_HOST_ENV: &str = "SERVICE_DISCOVERY_EXPOSE_HOST";
pub const DEFAULT_CONFIG_PATH: &str = "service-discovery.yaml";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub reconciler: ReconcilerConfig,

    /// Seconds between two polls of a source file
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Consumers in precedence order
    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,
}

/// A file holding the latest services of one discovery source
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub name: String,
    pub priority: u32,
    pub path: PathBuf,
}

/// A route table written for the services carrying the required metadata
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerConfig {
    pub name: String,
    #[serde(default)]
    pub required_metadata: Vec<String>,
    pub output: PathBuf,
}

impl DaemonConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: DaemonConfig = serde_yaml::from_str(text)?;
        if config.poll_interval_seconds == 0 {
            anyhow::bail!("pollIntervalSeconds must be greater than zero");
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Resolve the config path from the first argument, the environment, or the default
    pub fn path_from_env(arg: Option<String>) -> PathBuf {
        arg.or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
            .into()
    }

    /// Apply an `expose host network` override such as "true" or "0"
    pub fn apply_expose_override(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(value) = value {
            self.reconciler.expose_host_network = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => anyhow::bail!("Invalid {} value: {}", EXPOSE_HOST_ENV, other),
            };
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

fn default_poll_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
exposeHostNetwork: true
pollIntervalSeconds: 5
sources:
  - name: marathon
    priority: 2
    path: /var/lib/discovery/marathon.yaml
  - name: etcd
    priority: 1
    path: /var/lib/discovery/etcd.yaml
consumers:
  - name: http
    requiredMetadata: [domain]
    output: /etc/router/http.json
  - name: tcp
    output: /etc/router/tcp.json
"#;

    #[test]
    fn test_parse_config() {
        let config = DaemonConfig::from_yaml(SAMPLE).unwrap();
        assert!(config.reconciler.expose_host_network);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].priority, 2);
        assert_eq!(config.consumers[0].required_metadata, vec!["domain"]);
        assert!(config.consumers[1].required_metadata.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::from_yaml("sources: []").unwrap();
        assert!(!config.reconciler.expose_host_network);
        assert_eq!(config.poll_interval_seconds, 30);
        assert!(config.consumers.is_empty());
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(DaemonConfig::from_yaml("pollIntervalSeconds: 0").is_err());
    }

    #[test]
    fn test_expose_override() {
        let mut config = DaemonConfig::from_yaml("sources: []").unwrap();
        config.apply_expose_override(Some("TRUE")).unwrap();
        assert!(config.reconciler.expose_host_network);
        config.apply_expose_override(None).unwrap();
        assert!(config.reconciler.expose_host_network);
        config.apply_expose_override(Some("0")).unwrap();
        assert!(!config.reconciler.expose_host_network);
        assert!(config.apply_expose_override(Some("maybe")).is_err());
    }

    #[test]
    fn test_path_from_arg() {
        let path = DaemonConfig::path_from_env(Some("/tmp/discovery.yaml".to_string()));
        assert_eq!(path, PathBuf::from("/tmp/discovery.yaml"));
    }
}
