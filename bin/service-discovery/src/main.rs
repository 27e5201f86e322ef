use anyhow::Result;
use registry_core::{Reconciler, ReconcilerMetrics};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod file_source;
mod route_table;

use config::{DaemonConfig, EXPOSE_HOST_ENV};
use file_source::FileSource;
use route_table::route_table_consumer;

const LOG_JSON_ENV: &str = "SERVICE_DISCOVERY_LOG_JSON";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting service-discovery daemon...");

    let path = DaemonConfig::path_from_env(std::env::args().nth(1));
    let mut config = DaemonConfig::load(&path)?;
    config.apply_expose_override(std::env::var(EXPOSE_HOST_ENV).ok().as_deref())?;
    info!(
        "Loaded {} ({} sources, {} consumers, expose host network: {})",
        path.display(),
        config.sources.len(),
        config.consumers.len(),
        config.reconciler.expose_host_network
    );

    let metrics = ReconcilerMetrics::new()?;
    let reconciler = Arc::new(build_reconciler(&config, metrics.clone()));

    if config.sources.is_empty() {
        warn!("No sources configured - nothing will be reconciled");
    }

    let interval = config.poll_interval();
    let watchers = config.sources.iter().map(|source| {
        let watcher = FileSource::new(&source.name, source.priority, &source.path);
        tokio::spawn(watcher.run(reconciler.clone(), interval))
    });
    let watchers = futures::future::join_all(watchers);

    tokio::select! {
        results = watchers => {
            for result in results {
                if let Err(e) = result {
                    error!("Source watcher stopped: {}", e);
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, exiting...");
        }
    }

    match metrics.gather() {
        Ok(text) => info!("Final metrics:\n{}", text),
        Err(e) => warn!("Failed to gather metrics: {}", e),
    }

    Ok(())
}

/// Build the reconciler with one route table consumer per configured entry, in order
fn build_reconciler(config: &DaemonConfig, metrics: ReconcilerMetrics) -> Reconciler {
    let reconciler = Reconciler::new(config.reconciler.clone()).with_metrics(metrics);
    for consumer in &config.consumers {
        info!(
            "Registering consumer {} -> {}",
            consumer.name,
            consumer.output.display()
        );
        reconciler.add_consumer(route_table_consumer(
            &consumer.name,
            consumer.required_metadata.clone(),
            &consumer.output,
        ));
    }
    reconciler
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_JSON_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
