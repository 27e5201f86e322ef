//! Service and server model

use crate::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Identity of a service within a discovery source's namespace, e.g. `name` or `group/name`
pub type ServiceKey = String;

/// Services keyed by their identity
pub type ServiceMap = HashMap<ServiceKey, Service>;

/// A single backend endpoint of a service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    /// Port token; may be symbolic, so it is kept as text
    pub port: String,
    /// Backend specific metadata (hostname, task id, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Server {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether both entries address the same endpoint
    pub fn same_endpoint(&self, other: &Server) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A discoverable application and its endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub key: ServiceKey,
    pub name: String,
    /// Port the service is exposed on
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Descriptive metadata, consumers use it to decide what they claim
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Service {
    pub fn new(key: impl Into<String>, name: impl Into<String>, port: u16) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            port,
            protocol: None,
            servers: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_server(mut self, server: Server) -> Self {
        self.servers.push(server);
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the service is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(RegistryError::malformed(&self.key, "empty service key"));
        }

        let mut endpoints = HashSet::new();
        for server in &self.servers {
            if server.host.is_empty() {
                return Err(RegistryError::malformed(&self.key, "server with empty host"));
            }
            if server.port.is_empty() {
                return Err(RegistryError::malformed(
                    &self.key,
                    format!("server {} has an empty port", server.host),
                ));
            }
            if !endpoints.insert((server.host.as_str(), server.port.as_str())) {
                return Err(RegistryError::malformed(
                    &self.key,
                    format!("duplicate server {}", server),
                ));
            }
        }

        Ok(())
    }

    /// Produce the successor of this service from newer data for the same key.
    ///
    /// Every field is taken from `newer`. Servers that are still present keep
    /// their previous relative order, servers that appeared are appended in
    /// the order `newer` lists them, and vanished servers are dropped.
    pub fn merge_update(&self, newer: Service) -> Service {
        let Service {
            key,
            name,
            port,
            protocol,
            servers: mut incoming,
            metadata,
        } = newer;

        let mut servers = Vec::with_capacity(incoming.len());
        for previous in &self.servers {
            if let Some(pos) = incoming.iter().position(|s| s.same_endpoint(previous)) {
                servers.push(incoming.remove(pos));
            }
        }
        servers.extend(incoming);

        Service {
            key,
            name,
            port,
            protocol,
            servers,
            metadata,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]:{} -> ", self.name, self.key, self.port)?;
        if self.servers.is_empty() {
            return write!(f, "(no servers)");
        }
        for (i, server) in self.servers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", server)?;
        }
        Ok(())
    }
}
