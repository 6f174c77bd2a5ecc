// Identity — per-node encryption keys and the typed store that holds them
//
// Peer identities and signing keys come from libp2p (`PeerId`, `Keypair`).
// Onion layers are sealed to a separate X25519 key that each node publishes
// in the directory.

mod keys;
mod store;

pub use keys::{peer_id_matches_keypair, EncryptionKeypair, ENCRYPTION_KEY_SIZE};
pub use store::KeyStore;
