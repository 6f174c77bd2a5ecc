// Relay discovery — rendezvous interface for finding onion relays
//
// Relays advertise themselves under a well-known namespace; circuit builders
// query that namespace for candidates. The backing mechanism (rendezvous
// server, Kademlia provider records, ...) is up to the host.

use async_trait::async_trait;
use futures::stream::BoxStream;
use libp2p::{Multiaddr, PeerId};
use std::time::Duration;

/// Namespace advertised by onion relays
pub const ONION_RELAY_NAMESPACE: &str = "/libp2p/onion";

/// A relay candidate returned by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    pub peer_id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

impl RelayInfo {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            addrs: Vec::new(),
        }
    }
}

impl From<PeerId> for RelayInfo {
    fn from(peer_id: PeerId) -> Self {
        Self::new(peer_id)
    }
}

/// Candidates as they are discovered; the stream ends when discovery has
/// nothing more to offer.
pub type RelayStream = BoxStream<'static, RelayInfo>;

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Advertise the local node under `namespace`; returns the advertisement TTL.
    async fn advertise(&self, namespace: &str) -> anyhow::Result<Duration>;

    /// Find up to `limit` peers advertised under `namespace`.
    async fn find_peers(&self, namespace: &str, limit: usize) -> anyhow::Result<RelayStream>;
}
