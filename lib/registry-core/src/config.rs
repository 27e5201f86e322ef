//! Reconciler configuration

use serde::{Deserialize, Serialize};

/// Settings fixed for the lifetime of a reconciler
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerConfig {
    /// Offer services running in host network mode to consumers
    #[serde(default)]
    pub expose_host_network: bool,
}
