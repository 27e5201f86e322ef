//! Discovery source backed by a YAML file listing the current services

use anyhow::{Context, Result};
use registry_core::{DiscoverySource, Reconciler, Service, ServiceMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Parse a YAML sequence of services into a map keyed by service key
pub fn parse_services(text: &str) -> Result<ServiceMap> {
    let services: Vec<Service> = serde_yaml::from_str(text)?;
    let mut map = ServiceMap::with_capacity(services.len());
    for service in services {
        let key = service.key.clone();
        if map.insert(key.clone(), service).is_some() {
            anyhow::bail!("Service {} listed more than once", key);
        }
    }
    Ok(map)
}

/// Polls one file and feeds its content to the reconciler
pub struct FileSource {
    source: DiscoverySource,
    path: PathBuf,
}

impl FileSource {
    pub fn new(name: &str, priority: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            source: DiscoverySource::new(name, priority),
            path: path.into(),
        }
    }

    /// Read the file and run one reconcile cycle with its services
    pub async fn poll_once(&self, reconciler: &Arc<Reconciler>) -> Result<usize> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let services = parse_services(&text)
            .with_context(|| format!("Invalid services in {}", self.path.display()))?;
        let count = services.len();

        let reconciler = reconciler.clone();
        let source = self.source.clone();
        let report = tokio::task::spawn_blocking(move || reconciler.update(&source, services))
            .await??;
        debug!(
            "Source {} reported {} services ({} changes)",
            self.source,
            count,
            report.events.len()
        );
        Ok(count)
    }

    /// Poll forever; failures are logged and retried on the next tick
    pub async fn run(self, reconciler: Arc<Reconciler>, interval: Duration) {
        info!("Watching {} for source {}", self.path.display(), self.source);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once(&reconciler).await {
                error!("Error polling source {}: {:#}", self.source, e);
            }
        }
    }
}
