// In-memory collaborators for tests and demos
//
// Everything here runs inside one process: discovery is fed from a list of
// relays, the network routes payloads between hosts attached to the same
// hub, and circuit providers return canned circuits.

use crate::privacy::{Circuit, CircuitError, CircuitOptions, CircuitProvider, RelaySearchError};
use crate::transport::{Discovery, Network, RelayInfo, RelayStream};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use libp2p::identity::Keypair;
use libp2p::PeerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// TTL reported for advertisements
pub const ADVERTISEMENT_TTL: Duration = Duration::from_secs(3600);

/// Discovery answering from a fixed set of relays.
///
/// Each `find_peers` call opens a fresh channel, queues up to `limit`
/// relays on it and closes it.
#[derive(Default)]
pub struct ChannelDiscovery {
    relays: Mutex<Vec<RelayInfo>>,
    advertised: Mutex<Vec<String>>,
    requested_limits: Mutex<Vec<usize>>,
}

impl ChannelDiscovery {
    pub fn new(relays: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            relays: Mutex::new(relays.into_iter().map(RelayInfo::from).collect()),
            ..Default::default()
        }
    }

    pub fn add_relay(&self, relay: RelayInfo) {
        self.relays.lock().push(relay);
    }

    /// Namespaces advertised so far
    pub fn advertised(&self) -> Vec<String> {
        self.advertised.lock().clone()
    }

    /// `limit` of every `find_peers` call so far
    pub fn requested_limits(&self) -> Vec<usize> {
        self.requested_limits.lock().clone()
    }
}

#[async_trait]
impl Discovery for ChannelDiscovery {
    async fn advertise(&self, namespace: &str) -> Result<Duration> {
        self.advertised.lock().push(namespace.to_string());
        Ok(ADVERTISEMENT_TTL)
    }

    async fn find_peers(&self, _namespace: &str, limit: usize) -> Result<RelayStream> {
        self.requested_limits.lock().push(limit);

        let (tx, rx) = mpsc::unbounded();
        for relay in self.relays.lock().iter().take(limit) {
            tx.unbounded_send(relay.clone())?;
        }

        Ok(rx.boxed())
    }
}

/// A payload received by a loopback peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: PeerId,
    pub protocol: String,
    pub payload: Vec<u8>,
}

/// Routes payloads between the networks that joined it
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inboxes: Arc<Mutex<HashMap<PeerId, mpsc::UnboundedSender<Delivery>>>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a peer; payloads sent to it arrive on the returned receiver.
    pub fn join(&self, keypair: Keypair) -> (Arc<LoopbackNetwork>, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded();
        self.inboxes.lock().insert(keypair.public().to_peer_id(), tx);

        let network = LoopbackNetwork {
            keypair,
            hub: self.clone(),
        };
        (Arc::new(network), rx)
    }

    /// Detach a peer; later sends to it fail.
    pub fn leave(&self, peer: &PeerId) {
        self.inboxes.lock().remove(peer);
    }
}

/// Network endpoint attached to a [`LoopbackHub`]
pub struct LoopbackNetwork {
    keypair: Keypair,
    hub: LoopbackHub,
}

#[async_trait]
impl Network for LoopbackNetwork {
    fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    async fn send(&self, peer: PeerId, protocol: &str, payload: Vec<u8>) -> Result<()> {
        let delivery = Delivery {
            from: self.local_peer_id(),
            protocol: protocol.to_string(),
            payload,
        };

        let inboxes = self.hub.inboxes.lock();
        let inbox = inboxes
            .get(&peer)
            .ok_or_else(|| anyhow!("peer {} is not reachable", peer))?;
        inbox.unbounded_send(delivery)?;
        Ok(())
    }
}

/// Always returns the same circuit
pub struct StaticCircuitProvider {
    circuit: Circuit,
}

impl StaticCircuitProvider {
    pub fn new(circuit: Circuit) -> Self {
        Self { circuit }
    }
}

#[async_trait]
impl CircuitProvider for StaticCircuitProvider {
    async fn build(&self, options: &CircuitOptions) -> Result<Circuit, CircuitError> {
        options.validate()?;
        Ok(self.circuit.clone())
    }
}

/// Fails a number of times before returning a circuit, or forever
pub struct FailingCircuitProvider {
    failures: Option<usize>,
    circuit: Circuit,
    attempts: AtomicUsize,
}

impl FailingCircuitProvider {
    pub fn always() -> Self {
        Self {
            failures: None,
            circuit: Circuit::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn then_succeed(failures: usize, circuit: Circuit) -> Self {
        Self {
            failures: Some(failures),
            circuit,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `build` calls so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CircuitProvider for FailingCircuitProvider {
    async fn build(&self, _options: &CircuitOptions) -> Result<Circuit, CircuitError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.failures {
            Some(failures) if attempt >= failures => Ok(self.circuit.clone()),
            _ => Err(CircuitError::FindRelaysFailed(RelaySearchError::ChannelClosed)),
        }
    }
}
