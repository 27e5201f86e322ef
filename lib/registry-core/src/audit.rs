//! Change auditing between merged views

use crate::{Service, ServiceKey, ServiceMap};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Kind of change reported for a service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuditKind {
    Added,
    Modified,
    Removed,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Added => "added",
            AuditKind::Modified => "modified",
            AuditKind::Removed => "removed",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change between the previous and the current merged view
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuditEvent {
    Added(Service),
    Modified { previous: Service, current: Service },
    Removed(Service),
}

impl AuditEvent {
    pub fn kind(&self) -> AuditKind {
        match self {
            AuditEvent::Added(_) => AuditKind::Added,
            AuditEvent::Modified { .. } => AuditKind::Modified,
            AuditEvent::Removed(_) => AuditKind::Removed,
        }
    }

    pub fn key(&self) -> &ServiceKey {
        match self {
            AuditEvent::Added(service) | AuditEvent::Removed(service) => &service.key,
            AuditEvent::Modified { current, .. } => &current.key,
        }
    }
}

/// Diff two merged views. Pure apart from logging each change.
pub fn audit(previous: &ServiceMap, current: &ServiceMap) -> Vec<AuditEvent> {
    let mut events = Vec::new();

    for (key, service) in current {
        match previous.get(key) {
            None => {
                info!(key = %key, service = %service, "Added service");
                events.push(AuditEvent::Added(service.clone()));
            }
            Some(old) if old != service => {
                info!(key = %key, previous = %old, service = %service, "Modified service");
                events.push(AuditEvent::Modified {
                    previous: old.clone(),
                    current: service.clone(),
                });
            }
            Some(_) => {}
        }
    }

    for (key, service) in previous {
        if !current.contains_key(key) {
            info!(key = %key, service = %service, "Removed service");
            events.push(AuditEvent::Removed(service.clone()));
        }
    }

    events
}
