//! Consumer writing the services it claims to a JSON route table

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use registry_core::{MetadataConsumer, Service, ServiceMap};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteTable<'a> {
    consumer: &'a str,
    generated_at: DateTime<Utc>,
    services: Vec<&'a Service>,
}

/// Writes a consumer's claimed services to `output`, skipping unchanged tables
pub struct RouteTableWriter {
    consumer: String,
    output: PathBuf,
    last_written: Option<Vec<Service>>,
}

impl RouteTableWriter {
    pub fn new(consumer: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            consumer: consumer.into(),
            output: output.into(),
            last_written: None,
        }
    }

    pub fn write(&mut self, claimed: &ServiceMap) -> Result<()> {
        let mut services: Vec<&Service> = claimed.values().collect();
        services.sort_by(|a, b| a.key.cmp(&b.key));

        let unchanged = self
            .last_written
            .as_ref()
            .is_some_and(|last| last.iter().eq(services.iter().copied()));
        if unchanged {
            debug!("Route table {} unchanged", self.output.display());
            return Ok(());
        }

        let table = RouteTable {
            consumer: &self.consumer,
            generated_at: Utc::now(),
            services: services.clone(),
        };
        let json = serde_json::to_vec_pretty(&table)?;

        let tmp = tmp_path(&self.output);
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.output)
            .with_context(|| format!("Failed to replace {}", self.output.display()))?;

        debug!("Wrote {} routes to {}", services.len(), self.output.display());
        self.last_written = Some(services.into_iter().cloned().collect());
        Ok(())
    }
}

/// Sibling path the table is staged at before the rename
fn tmp_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("route-table"));
    name.push(".tmp");
    output.with_file_name(name)
}

/// Consumer claiming offered services that carry every required metadata key
/// and writing them to a route table at `output`
pub fn route_table_consumer(
    name: &str,
    required_metadata: Vec<String>,
    output: &Path,
) -> MetadataConsumer<impl FnMut(&ServiceMap) -> Result<()> + Send> {
    let mut writer = RouteTableWriter::new(name, output);
    MetadataConsumer::new(name, required_metadata, move |claimed: &ServiceMap| {
        writer.write(claimed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_core::{AggregateView, ServiceConsumer};
    use std::collections::HashSet;

    fn services() -> ServiceMap {
        [
            Service::new("web", "web", 80).with_metadata("domain", "web.example.com"),
            Service::new("db", "db", 5432),
        ]
        .into_iter()
        .map(|s| (s.key.clone(), s))
        .collect()
    }

    #[test]
    fn test_claims_and_writes_matching() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("http.json");
        let mut consumer = route_table_consumer("http", vec!["domain".into()], &output);

        let all = services();
        let view = AggregateView {
            services: &all,
            expose_host_network: false,
        };
        let claimed = consumer.update(&view, &all).unwrap();
        assert_eq!(claimed, HashSet::from(["web".to_string()]));
        assert_eq!(consumer.name(), "http");

        let table: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(table["consumer"], "http");
        assert_eq!(table["services"].as_array().unwrap().len(), 1);
        assert_eq!(table["services"][0]["key"], "web");
        assert!(table["generatedAt"].is_string());
    }

    #[test]
    fn test_unchanged_table_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("all.json");
        let mut consumer = route_table_consumer("all", vec![], &output);

        let all = services();
        let view = AggregateView {
            services: &all,
            expose_host_network: false,
        };
        consumer.update(&view, &all).unwrap();
        std::fs::remove_file(&output).unwrap();

        let claimed = consumer.update(&view, &all).unwrap();
        assert_eq!(claimed.len(), 2);
        assert!(!output.exists());
    }

    #[test]
    fn test_write_failure_propagates() {
        let output = Path::new("/nonexistent/dir/all.json");
        let mut consumer = route_table_consumer("all", vec![], output);
        let all = services();
        let view = AggregateView {
            services: &all,
            expose_host_network: false,
        };
        assert!(consumer.update(&view, &all).is_err());
    }

    #[test]
    fn test_tmp_path_keeps_full_file_name() {
        assert_eq!(
            tmp_path(Path::new("/etc/router/http.json")),
            PathBuf::from("/etc/router/http.json.tmp")
        );
        assert_ne!(
            tmp_path(Path::new("/etc/router/http.json")),
            tmp_path(Path::new("/etc/router/http.yaml"))
        );
        assert_eq!(
            tmp_path(Path::new("/etc/router/http.tmp")),
            PathBuf::from("/etc/router/http.tmp.tmp")
        );
    }

    #[test]
    fn test_sibling_outputs_do_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("http.json");
        let yaml = dir.path().join("http.yaml");
        let mut first = RouteTableWriter::new("json", &json);
        let mut second = RouteTableWriter::new("yaml", &yaml);

        let all = services();
        first.write(&all).unwrap();
        second.write(&all).unwrap();

        let json_table: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        let yaml_table: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&yaml).unwrap()).unwrap();
        assert_eq!(json_table["consumer"], "json");
        assert_eq!(yaml_table["consumer"], "yaml");
        assert!(!dir.path().join("http.tmp").exists());
    }
}
