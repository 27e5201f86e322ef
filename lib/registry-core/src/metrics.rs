//! Prometheus metrics for reconcile cycles

use crate::{CycleReport, Result};
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics collector for the reconciler
#[derive(Clone)]
pub struct ReconcilerMetrics {
    /// Completed cycles by source and outcome
    pub cycles_total: CounterVec,
    /// Services in the last committed view
    pub merged_services: Gauge,
    /// Audit events by kind
    pub audit_events_total: CounterVec,
    /// Services claimed by consumer name and chain position
    pub claimed_services_total: CounterVec,
    /// Services left unclaimed in the last cycle
    pub dropped_services: Gauge,
    /// Wall time of a cycle in seconds
    pub cycle_duration_seconds: Histogram,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl ReconcilerMetrics {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a collector registering into an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let cycles_total = CounterVec::new(
            Opts::new("registry_cycles_total", "Reconcile cycles by source and outcome"),
            &["source", "outcome"],
        )?;

        let merged_services = Gauge::new(
            "registry_merged_services",
            "Services in the last committed merged view",
        )?;

        let audit_events_total = CounterVec::new(
            Opts::new("registry_audit_events_total", "Service changes by kind"),
            &["kind"],
        )?;

        let claimed_services_total = CounterVec::new(
            Opts::new(
                "registry_claimed_services_total",
                "Services claimed by each consumer",
            ),
            &["consumer", "position"],
        )?;

        let dropped_services = Gauge::new(
            "registry_dropped_services",
            "Services no consumer claimed in the last cycle",
        )?;

        let cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "registry_cycle_duration_seconds",
            "Reconcile cycle latency in seconds",
        ))?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(merged_services.clone()))?;
        registry.register(Box::new(audit_events_total.clone()))?;
        registry.register(Box::new(claimed_services_total.clone()))?;
        registry.register(Box::new(dropped_services.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            cycles_total,
            merged_services,
            audit_events_total,
            claimed_services_total,
            dropped_services,
            cycle_duration_seconds,
            registry,
        })
    }

    pub(crate) fn record_success(&self, source: &str, report: &CycleReport, seconds: f64) {
        let claimed: usize = report.claims.iter().map(|claim| claim.keys.len()).sum();
        self.cycles_total.with_label_values(&[source, "ok"]).inc();
        self.merged_services.set((claimed + report.unclaimed.len()) as f64);
        for event in &report.events {
            self.audit_events_total
                .with_label_values(&[event.kind().as_str()])
                .inc();
        }
        for (position, claim) in report.claims.iter().enumerate() {
            self.claimed_services_total
                .with_label_values(&[claim.consumer.as_str(), &position.to_string()])
                .inc_by(claim.keys.len() as f64);
        }
        self.dropped_services.set(report.unclaimed.len() as f64);
        self.cycle_duration_seconds.observe(seconds);
    }

    pub(crate) fn record_failure(&self, source: &str, seconds: f64) {
        self.cycles_total.with_label_values(&[source, "error"]).inc();
        self.cycle_duration_seconds.observe(seconds);
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
