//! Latest service snapshot per discovery source

use crate::{DiscoverySource, RegistryError, Result, ServiceMap, SourceId};
use std::collections::HashMap;
use tracing::debug;

/// The most recent services reported by one source
#[derive(Clone, Debug)]
pub struct SourceSnapshot {
    pub source: DiscoverySource,
    pub services: ServiceMap,
}

/// Holds the latest snapshot of every source that has reported
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<SourceId, SourceSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `source` with `services`.
    ///
    /// Keys already known to this source are merge-updated so unchanged
    /// server positions stay put. Keys missing from `services` are dropped.
    /// The whole map is validated first; on error the previous snapshot is
    /// left as it was.
    pub fn record(&mut self, source: &DiscoverySource, services: ServiceMap) -> Result<()> {
        for (key, service) in &services {
            if *key != service.key {
                return Err(RegistryError::malformed(
                    key.as_str(),
                    format!("filed under a different key than its own ({:?})", service.key),
                ));
            }
            service.validate()?;
        }

        let previous = self.snapshots.remove(&source.id());
        let next: ServiceMap = match previous {
            Some(SourceSnapshot { services: mut prev, .. }) => services
                .into_iter()
                .map(|(key, service)| match prev.remove(&key) {
                    Some(old) => (key, old.merge_update(service)),
                    None => (key, service),
                })
                .collect(),
            None => services,
        };

        debug!("Recorded {} services from source {}", next.len(), source);
        self.snapshots.insert(
            source.id(),
            SourceSnapshot {
                source: source.clone(),
                services: next,
            },
        );
        Ok(())
    }

    /// Snapshot for a source, if it has reported
    pub fn get(&self, source: &DiscoverySource) -> Option<&ServiceMap> {
        self.snapshots.get(&source.id()).map(|s| &s.services)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &SourceSnapshot> {
        self.snapshots.values()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Server, Service};

    fn map(services: Vec<Service>) -> ServiceMap {
        services.into_iter().map(|s| (s.key.clone(), s)).collect()
    }

    #[test]
    fn test_record_replaces_snapshot() {
        let mut store = SnapshotStore::new();
        let source = DiscoverySource::new("marathon", 1);

        store
            .record(&source, map(vec![Service::new("a", "a", 80), Service::new("b", "b", 81)]))
            .unwrap();
        store.record(&source, map(vec![Service::new("b", "b", 81)])).unwrap();

        let snapshot = store.get(&source).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("b"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_preserves_server_order() {
        let mut store = SnapshotStore::new();
        let source = DiscoverySource::new("marathon", 1);
        let first = Service::new("a", "a", 80)
            .with_server(Server::new("10.0.0.2", "31000"))
            .with_server(Server::new("10.0.0.1", "31000"));
        let reordered = Service::new("a", "a", 80)
            .with_server(Server::new("10.0.0.1", "31000"))
            .with_server(Server::new("10.0.0.2", "31000"));

        store.record(&source, map(vec![first.clone()])).unwrap();
        store.record(&source, map(vec![reordered])).unwrap();

        assert_eq!(store.get(&source).unwrap()["a"], first);
    }

    #[test]
    fn test_malformed_update_keeps_previous() {
        let mut store = SnapshotStore::new();
        let source = DiscoverySource::new("etcd", 1);
        store.record(&source, map(vec![Service::new("a", "a", 80)])).unwrap();

        let broken = Service::new("b", "b", 80).with_server(Server::new("", "31000"));
        assert!(store.record(&source, map(vec![broken])).is_err());

        let mut misfiled = ServiceMap::new();
        misfiled.insert("c".to_string(), Service::new("d", "d", 80));
        assert!(store.record(&source, misfiled).is_err());

        assert!(store.get(&source).unwrap().contains_key("a"));
    }

    #[test]
    fn test_sources_are_independent() {
        let mut store = SnapshotStore::new();
        let etcd = DiscoverySource::new("etcd", 1);
        let marathon = DiscoverySource::new("marathon", 2);

        store.record(&etcd, map(vec![Service::new("a", "a", 80)])).unwrap();
        store.record(&marathon, ServiceMap::new()).unwrap();

        assert_eq!(store.get(&etcd).unwrap().len(), 1);
        assert!(store.get(&marathon).unwrap().is_empty());
    }
}
