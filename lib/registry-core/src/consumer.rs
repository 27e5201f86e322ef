//! Downstream consumers and the ordered chain that dispatches services to them

use crate::{RegistryError, Result, ServiceKey, ServiceMap};
use std::collections::HashSet;
use tracing::{debug, span, warn, Level};

/// Read-only view of the reconciled state handed to consumers
#[derive(Clone, Copy, Debug)]
pub struct AggregateView<'a> {
    /// Every visible service of this cycle, claimed or not
    pub services: &'a ServiceMap,
    pub expose_host_network: bool,
}

/// A downstream unit that claims the services it knows how to handle,
/// e.g. a generator of routing rules for one proxy flavour.
pub trait ServiceConsumer: Send {
    fn name(&self) -> &str {
        "UnnamedConsumer"
    }

    /// Act on `remaining` and return the keys this consumer takes ownership of.
    /// Keys claimed here are not offered to later consumers in this cycle.
    fn update(
        &mut self,
        aggregate: &AggregateView<'_>,
        remaining: &ServiceMap,
    ) -> anyhow::Result<HashSet<ServiceKey>>;
}

/// Keys one consumer claimed in a cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumerClaim {
    pub consumer: String,
    pub keys: HashSet<ServiceKey>,
}

/// Find the claim of the first consumer registered under `consumer`
pub fn claim_of<'a>(
    claims: &'a [ConsumerClaim],
    consumer: &str,
) -> Option<&'a HashSet<ServiceKey>> {
    claims
        .iter()
        .find(|claim| claim.consumer == consumer)
        .map(|claim| &claim.keys)
}

/// Outcome of offering one cycle's services to the chain
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// One entry per consumer that ran, in registration order
    pub claims: Vec<ConsumerClaim>,
    /// Keys no consumer claimed
    pub unclaimed: HashSet<ServiceKey>,
}

/// Consumers in registration order; earlier consumers take precedence
#[derive(Default)]
pub struct ConsumerChain {
    consumers: Vec<Box<dyn ServiceConsumer>>,
}

impl ConsumerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a consumer to the end of the chain
    pub fn push<C: ServiceConsumer + 'static>(&mut self, consumer: C) {
        self.consumers.push(Box::new(consumer));
    }

    pub fn push_boxed(&mut self, consumer: Box<dyn ServiceConsumer>) {
        self.consumers.push(consumer);
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Offer `candidates` to each consumer in order, removing what each claims.
    ///
    /// The first failing consumer aborts the rest of the chain; consumers
    /// that already ran keep their effects.
    pub fn dispatch(
        &mut self,
        aggregate: &AggregateView<'_>,
        candidates: ServiceMap,
    ) -> Result<DispatchOutcome> {
        let mut remaining = candidates;
        let mut outcome = DispatchOutcome::default();

        for consumer in self.consumers.iter_mut() {
            let name = consumer.name().to_string();
            let span = span!(Level::DEBUG, "consumer", name = %name);
            let _guard = span.enter();
            debug!("Offering {} services", remaining.len());

            let accepted = consumer
                .update(aggregate, &remaining)
                .map_err(|source| RegistryError::ConsumerFailed {
                    consumer: name.clone(),
                    source,
                })?;

            let mut claimed = HashSet::with_capacity(accepted.len());
            for key in accepted {
                if remaining.remove(&key).is_some() {
                    claimed.insert(key);
                } else {
                    warn!(key = %key, "Consumer accepted a service it was not offered, ignoring");
                }
            }
            debug!("Claimed {} services", claimed.len());
            outcome.claims.push(ConsumerClaim {
                consumer: name,
                keys: claimed,
            });
        }

        if !remaining.is_empty() {
            debug!("{} services left unclaimed", remaining.len());
        }
        outcome.unclaimed = remaining.into_keys().collect();
        Ok(outcome)
    }
}

/// Consumer that claims every offered service carrying all required metadata keys
/// and hands the claimed services to a callback.
pub struct MetadataConsumer<F> {
    name: String,
    required: Vec<String>,
    apply: F,
}

impl<F> MetadataConsumer<F>
where
    F: FnMut(&ServiceMap) -> anyhow::Result<()> + Send,
{
    pub fn new(name: impl Into<String>, required: Vec<String>, apply: F) -> Self {
        Self {
            name: name.into(),
            required,
            apply,
        }
    }
}

impl<F> ServiceConsumer for MetadataConsumer<F>
where
    F: FnMut(&ServiceMap) -> anyhow::Result<()> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(
        &mut self,
        _aggregate: &AggregateView<'_>,
        remaining: &ServiceMap,
    ) -> anyhow::Result<HashSet<ServiceKey>> {
        let matching: ServiceMap = remaining
            .iter()
            .filter(|(_, service)| {
                self.required
                    .iter()
                    .all(|key| service.metadata.contains_key(key))
            })
            .map(|(key, service)| (key.clone(), service.clone()))
            .collect();

        (self.apply)(&matching)?;
        Ok(matching.into_keys().collect())
    }
}
