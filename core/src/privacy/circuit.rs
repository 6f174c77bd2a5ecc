// Circuit Building — discovering relays and selecting a random path
//
// The builder advertises the local node as a relay, then for every circuit:
// asks discovery for a padded number of relays, collects a padded number of
// candidates in parallel (one task per slot, bounded by a deadline), shuffles
// them with a CSPRNG-seeded permutation and keeps the first `size`.

use super::padding::{RelayPadding, SizePolicy};
use crate::config::EchalotteConfig;
use crate::transport::{Discovery, RelayInfo, RelayStream, ONION_RELAY_NAMESPACE};
use async_trait::async_trait;
use futures::StreamExt;
use libp2p::PeerId;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

/// Default number of relays in a circuit
pub const DEFAULT_CIRCUIT_SIZE: usize = 5;

/// Default time allowed for collecting relay candidates
pub const DEFAULT_CIRCUIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("circuit size should be strictly positive")]
    InvalidCircuitSize,
    #[error("failed to advertise onion service: {0}")]
    AdvertiseFailed(#[source] anyhow::Error),
    #[error("failed to find enough onion relays in the network: {0}")]
    FindRelaysFailed(#[source] RelaySearchError),
}

/// Why relay collection failed
#[derive(Debug, Error)]
pub enum RelaySearchError {
    #[error("relay channel closed")]
    ChannelClosed,
    #[error("timed out waiting for relays")]
    TimedOut,
    #[error("discovery failed: {0}")]
    Discovery(#[source] anyhow::Error),
    #[error("relay collection task failed: {0}")]
    Task(#[source] JoinError),
}

/// Ordered relays a message traverses, first hop first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    hops: Vec<PeerId>,
}

impl Circuit {
    pub fn new(hops: Vec<PeerId>) -> Self {
        Self { hops }
    }

    pub fn hops(&self) -> &[PeerId] {
        &self.hops
    }

    /// Relay the message is handed to
    pub fn first_hop(&self) -> Option<&PeerId> {
        self.hops.first()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeerId> {
        self.hops.iter()
    }
}

impl<'a> IntoIterator for &'a Circuit {
    type Item = &'a PeerId;
    type IntoIter = std::slice::Iter<'a, PeerId>;

    fn into_iter(self) -> Self::IntoIter {
        self.hops.iter()
    }
}

/// Circuit building options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitOptions {
    /// Number of relays in the circuit
    pub size: usize,
    /// Time allowed for collecting relay candidates
    pub timeout: Duration,
}

impl Default for CircuitOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_CIRCUIT_SIZE,
            timeout: DEFAULT_CIRCUIT_TIMEOUT,
        }
    }
}

impl CircuitOptions {
    pub fn new(size: usize, timeout: Duration) -> Result<Self, CircuitError> {
        let options = Self { size, timeout };
        options.validate()?;
        Ok(options)
    }

    pub fn with_size(self, size: usize) -> Result<Self, CircuitError> {
        Self::new(size, self.timeout)
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Validate circuit options
    pub fn validate(&self) -> Result<(), CircuitError> {
        if self.size == 0 {
            return Err(CircuitError::InvalidCircuitSize);
        }
        Ok(())
    }
}

/// Anything that can hand out circuits
#[async_trait]
pub trait CircuitProvider: Send + Sync {
    async fn build(&self, options: &CircuitOptions) -> Result<Circuit, CircuitError>;
}

/// Builds random circuits between relays found through discovery
pub struct CircuitBuilder {
    discovery: Arc<dyn Discovery>,
    fanout_padding: Arc<dyn SizePolicy>,
    collection_padding: Arc<dyn SizePolicy>,
}

impl CircuitBuilder {
    /// Advertise the local node as an onion relay and create a builder
    /// backed by `discovery`.
    pub async fn new(discovery: Arc<dyn Discovery>) -> Result<Self, CircuitError> {
        // TODO: refresh the advertisement before the returned TTL expires so
        // unresponsive peers age out of relay discovery.
        let ttl = discovery
            .advertise(ONION_RELAY_NAMESPACE)
            .await
            .map_err(CircuitError::AdvertiseFailed)?;
        debug!("Advertised onion relay service (ttl {:?})", ttl);

        Ok(Self {
            discovery,
            fanout_padding: Arc::new(RelayPadding::DISCOVERY),
            collection_padding: Arc::new(RelayPadding::COLLECTION),
        })
    }

    /// Create a builder using the padding policies from `config`.
    pub async fn from_config(
        discovery: Arc<dyn Discovery>,
        config: &EchalotteConfig,
    ) -> Result<Self, CircuitError> {
        let builder = Self::new(discovery).await?;
        Ok(builder.with_padding(config.fanout_padding, config.collection_padding))
    }

    /// Replace the size obfuscation policies for the discovery fan-out and
    /// for the number of collected candidates.
    pub fn with_padding(
        mut self,
        fanout: impl SizePolicy + 'static,
        collection: impl SizePolicy + 'static,
    ) -> Self {
        self.fanout_padding = Arc::new(fanout);
        self.collection_padding = Arc::new(collection);
        self
    }

    /// Build a random circuit between relay peers.
    pub async fn build(&self, options: &CircuitOptions) -> Result<Circuit, CircuitError> {
        options.validate()?;
        let size = options.size;

        // Never reveal the exact circuit size in discovery requests.
        let limit = self.fanout_padding.padded_size(size).max(size);
        let relays = self
            .discovery
            .find_peers(ONION_RELAY_NAMESPACE, limit)
            .await
            .map_err(|e| CircuitError::FindRelaysFailed(RelaySearchError::Discovery(e)))?;

        let count = self.collection_padding.padded_size(size).max(size);
        let candidates = collect_relays(relays, count, options.timeout)
            .await
            .map_err(CircuitError::FindRelaysFailed)?;

        let circuit = select_relays(candidates, size);
        info!("Built onion circuit with {} hops", circuit.len());
        Ok(circuit)
    }
}

#[async_trait]
impl CircuitProvider for CircuitBuilder {
    async fn build(&self, options: &CircuitOptions) -> Result<Circuit, CircuitError> {
        CircuitBuilder::build(self, options).await
    }
}

/// Collect exactly `count` relays from `relays`.
///
/// One task waits per slot; every task shares the same deadline. All tasks
/// are joined before the outcome is inspected, and the first failing slot
/// decides the reported error.
async fn collect_relays(
    relays: RelayStream,
    count: usize,
    timeout: Duration,
) -> Result<Vec<RelayInfo>, RelaySearchError> {
    let relays = Arc::new(Mutex::new(relays));
    let deadline = Instant::now() + timeout;

    let mut tasks = JoinSet::new();
    for slot in 0..count {
        let relays = Arc::clone(&relays);
        tasks.spawn(async move {
            let next = timeout_at(deadline, async { relays.lock().await.next().await }).await;
            let outcome = match next {
                Ok(Some(relay)) => Ok(relay),
                Ok(None) => Err(RelaySearchError::ChannelClosed),
                Err(_) => Err(RelaySearchError::TimedOut),
            };
            (slot, outcome)
        });
    }

    let mut slots: Vec<Option<RelayInfo>> = vec![None; count];
    let mut failures: Vec<(usize, RelaySearchError)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, Ok(relay))) => slots[slot] = Some(relay),
            Ok((slot, Err(e))) => failures.push((slot, e)),
            Err(e) => failures.push((count, RelaySearchError::Task(e))),
        }
    }

    if let Some((_, error)) = failures.into_iter().min_by_key(|(slot, _)| *slot) {
        debug!("Relay collection failed: {}", error);
        return Err(error);
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Randomly select `size` relays, in shuffled order.
fn select_relays(mut relays: Vec<RelayInfo>, size: usize) -> Circuit {
    let mut rng = StdRng::from_entropy();
    relays.shuffle(&mut rng);

    Circuit::new(relays.into_iter().take(size).map(|r| r.peer_id).collect())
}
