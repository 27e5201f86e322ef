//! Visibility filtering of merged services

use crate::{Service, ServiceMap};

/// Whether a service may be offered to consumers.
///
/// A server listening on the service's own port means the task runs in
/// host network mode; such services are hidden unless `expose_host_network`.
pub fn is_visible(service: &Service, expose_host_network: bool) -> bool {
    if expose_host_network {
        return true;
    }
    let declared = service.port.to_string();
    !service.servers.iter().any(|server| server.port == declared)
}

/// Drop every service that is not visible
pub fn visible_services(merged: ServiceMap, expose_host_network: bool) -> ServiceMap {
    merged
        .into_iter()
        .filter(|(_, service)| is_visible(service, expose_host_network))
        .collect()
}
