//! Reconciler tying snapshots, merge, filter, audit and dispatch together

use crate::audit::audit;
use crate::filter::visible_services;
use crate::merge::compute_merged;
use crate::{
    AggregateView, AuditEvent, ConsumerChain, ConsumerClaim, DiscoverySource, ReconcilerConfig,
    ReconcilerMetrics, Result, ServiceConsumer, ServiceKey, ServiceMap, SnapshotStore,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};

/// What a successful cycle changed and where the services went
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    pub events: Vec<AuditEvent>,
    /// One entry per consumer, in registration order
    pub claims: Vec<ConsumerClaim>,
    /// Visible keys no consumer claimed
    pub unclaimed: HashSet<ServiceKey>,
}

impl CycleReport {
    /// Keys claimed by the first consumer registered under `consumer`
    pub fn claimed_by(&self, consumer: &str) -> Option<&HashSet<ServiceKey>> {
        crate::consumer::claim_of(&self.claims, consumer)
    }
}

/// State only ever touched while holding the reconciler lock
struct AggregateState {
    snapshots: SnapshotStore,
    /// Last fully dispatched view, the baseline for the next diff
    previous: ServiceMap,
    consumers: ConsumerChain,
}

/// Serializes updates from independent discovery sources into one coherent view.
///
/// Every call to [`Reconciler::update`] runs a complete cycle (record the
/// source snapshot, merge by priority, filter, audit, dispatch) under a single
/// lock, so cycles never interleave. Callers block until the whole consumer
/// chain has run.
pub struct Reconciler {
    config: ReconcilerConfig,
    state: Mutex<AggregateState>,
    metrics: Option<ReconcilerMetrics>,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(AggregateState {
                snapshots: SnapshotStore::new(),
                previous: ServiceMap::new(),
                consumers: ConsumerChain::new(),
            }),
            metrics: None,
        }
    }

    /// Record cycle metrics into `metrics`
    pub fn with_metrics(mut self, metrics: ReconcilerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Register a consumer after all previously registered ones
    pub fn add_consumer<C: ServiceConsumer + 'static>(&self, consumer: C) {
        self.add_boxed_consumer(Box::new(consumer));
    }

    pub fn add_boxed_consumer(&self, consumer: Box<dyn ServiceConsumer>) {
        let mut state = self.state.lock();
        debug!("Registered consumer {}", consumer.name());
        state.consumers.push_boxed(consumer);
    }

    /// Replace `source`'s snapshot with `services` and run a full cycle.
    ///
    /// On error the committed view is left untouched, so the next successful
    /// cycle diffs against the last view that made it through every consumer.
    pub fn update(&self, source: &DiscoverySource, services: ServiceMap) -> Result<CycleReport> {
        let span = span!(
            Level::INFO,
            "reconcile",
            source = %source.name(),
            priority = source.priority()
        );
        let _guard = span.enter();
        let started = Instant::now();

        let result = {
            let mut state = self.state.lock();
            self.run_cycle(&mut state, source, services)
        };

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(report) => {
                info!(
                    changes = report.events.len(),
                    unclaimed = report.unclaimed.len(),
                    "Reconciled update"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_success(source.name(), report, elapsed);
                }
            }
            Err(e) => {
                warn!("Reconcile cycle failed: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(source.name(), elapsed);
                }
            }
        }
        result
    }

    fn run_cycle(
        &self,
        state: &mut AggregateState,
        source: &DiscoverySource,
        services: ServiceMap,
    ) -> Result<CycleReport> {
        state.snapshots.record(source, services)?;

        let merged = visible_services(
            compute_merged(&state.snapshots),
            self.config.expose_host_network,
        );
        debug!("Merged view has {} visible services", merged.len());

        let events = audit(&state.previous, &merged);

        let aggregate = AggregateView {
            services: &merged,
            expose_host_network: self.config.expose_host_network,
        };
        let outcome = state.consumers.dispatch(&aggregate, merged.clone())?;

        state.previous = merged;
        Ok(CycleReport {
            events,
            claims: outcome.claims,
            unclaimed: outcome.unclaimed,
        })
    }

    /// The last committed merged view
    pub fn merged(&self) -> ServiceMap {
        self.state.lock().previous.clone()
    }

    /// Number of sources that have reported at least once
    pub fn source_count(&self) -> usize {
        self.state.lock().snapshots.len()
    }

    pub fn consumer_count(&self) -> usize {
        self.state.lock().consumers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Server, Service};
    use std::sync::Arc;

    fn map(services: Vec<Service>) -> ServiceMap {
        services.into_iter().map(|s| (s.key.clone(), s)).collect()
    }

    #[test]
    fn test_reconciler_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Reconciler>();
        assert_send_sync::<Arc<Reconciler>>();
    }

    #[test]
    fn test_update_commits_view() {
        let reconciler = Reconciler::new(ReconcilerConfig::default());
        let source = DiscoverySource::new("marathon", 1);
        let web = Service::new("web", "web", 80).with_server(Server::new("10.0.0.1", "31000"));

        let report = reconciler.update(&source, map(vec![web.clone()])).unwrap();
        assert_eq!(report.events, vec![AuditEvent::Added(web.clone())]);
        assert_eq!(report.unclaimed, HashSet::from(["web".to_string()]));
        assert_eq!(reconciler.merged()["web"], web);
        assert_eq!(reconciler.source_count(), 1);
        assert_eq!(reconciler.consumer_count(), 0);
    }

    #[test]
    fn test_metrics_recorded() {
        let metrics = ReconcilerMetrics::new().unwrap();
        let reconciler = Reconciler::new(ReconcilerConfig::default()).with_metrics(metrics.clone());
        let source = DiscoverySource::new("etcd", 1);

        reconciler
            .update(&source, map(vec![Service::new("a", "a", 80), Service::new("b", "b", 81)]))
            .unwrap();

        assert_eq!(metrics.merged_services.get(), 2.0);
        assert_eq!(metrics.dropped_services.get(), 2.0);
        assert_eq!(
            metrics.audit_events_total.with_label_values(&["added"]).get(),
            2.0
        );
    }
}
