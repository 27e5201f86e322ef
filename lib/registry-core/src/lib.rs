//! Multi-source service registry reconciliation
//!
//! This library provides:
//! - Service and server model with stable merge-update
//! - Per-source snapshots merged by source priority
//! - Host network visibility filtering and change auditing
//! - An ordered chain of consumers that each claim a subset of services

pub mod audit;
pub mod config;
pub mod consumer;
pub mod error;
pub mod filter;
pub mod merge;
pub mod metrics;
pub mod reconciler;
pub mod service;
pub mod snapshot;
pub mod source;

pub use audit::{AuditEvent, AuditKind};
pub use config::ReconcilerConfig;
pub use consumer::{
    AggregateView, ConsumerChain, ConsumerClaim, DispatchOutcome, MetadataConsumer,
    ServiceConsumer,
};
pub use error::{RegistryError, Result};
pub use metrics::ReconcilerMetrics;
pub use reconciler::{CycleReport, Reconciler};
pub use service::{Server, Service, ServiceKey, ServiceMap};
pub use snapshot::{SnapshotStore, SourceSnapshot};
pub use source::{DiscoverySource, SourceId};
