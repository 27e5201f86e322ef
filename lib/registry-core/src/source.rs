//! Discovery source handles

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a discovery source, allocated in creation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u64);

/// Handle for a discovery source such as an orchestrator API or a coordination store.
///
/// Handles compare by identity: two sources created with the same name and
/// priority are still distinct, and a watcher must reuse its handle across
/// updates for its latest snapshot to replace the previous one. Clones share
/// the identity.
#[derive(Clone, Debug)]
pub struct DiscoverySource {
    id: SourceId,
    name: String,
    priority: u32,
}

impl DiscoverySource {
    /// Create a source. Higher priority wins conflicts for the same service key.
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            priority,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Merge order: ascending priority, then creation order
    pub(crate) fn merge_order(&self) -> (u32, SourceId) {
        (self.priority, self.id)
    }
}

impl PartialEq for DiscoverySource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DiscoverySource {}

impl Hash for DiscoverySource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {})", self.name, self.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_not_name() {
        let a = DiscoverySource::new("marathon", 1);
        let b = DiscoverySource::new("marathon", 1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_merge_order() {
        let low = DiscoverySource::new("etcd", 1);
        let high = DiscoverySource::new("marathon", 2);
        let tied = DiscoverySource::new("consul", 1);
        assert!(low.merge_order() < high.merge_order());
        assert!(low.merge_order() < tied.merge_order());
        assert!(tied.merge_order() < high.merge_order());
    }
}
