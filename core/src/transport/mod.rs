// Transport module — collaborator interfaces the onion layer runs on
//
// Stream multiplexing, connection management and the network side of peer
// discovery belong to the host's libp2p stack. The onion layer only needs
// to advertise and find relays, and to push one encoded layer to a peer.

pub mod discovery;
pub mod network;

pub use discovery::{Discovery, RelayInfo, RelayStream, ONION_RELAY_NAMESPACE};
pub use network::Network;
