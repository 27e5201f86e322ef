//! Priority merge of per-source snapshots

use crate::{ServiceMap, SnapshotStore};

/// Combine every source snapshot into one map.
///
/// Sources are applied in ascending priority and later assignments
/// overwrite earlier ones, so the highest priority source reporting a key
/// owns it no matter which source updated last.
pub fn compute_merged(store: &SnapshotStore) -> ServiceMap {
    let mut snapshots: Vec<_> = store.snapshots().collect();
    snapshots.sort_by_key(|s| s.source.merge_order());

    let mut merged = ServiceMap::new();
    for snapshot in snapshots {
        for (key, service) in &snapshot.services {
            merged.insert(key.clone(), service.clone());
        }
    }
    merged
}
