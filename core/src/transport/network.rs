// Network capability — the slice of the host's libp2p node the onion layer uses

use async_trait::async_trait;
use libp2p::identity::Keypair;
use libp2p::PeerId;

#[async_trait]
pub trait Network: Send + Sync {
    /// Signing keypair the node's peer ID is derived from
    fn keypair(&self) -> &Keypair;

    fn local_peer_id(&self) -> PeerId {
        self.keypair().public().to_peer_id()
    }

    /// Open a stream to `peer` on `protocol`, write `payload` and close it.
    async fn send(&self, peer: PeerId, protocol: &str, payload: Vec<u8>) -> anyhow::Result<()>;
}
