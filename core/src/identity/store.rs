// Typed in-memory key store
//
// Entries are `EncryptionKeypair` values keyed by `PeerId`, so a stored key
// is always a well-formed Curve25519 pair and reads need no type checks.

use super::EncryptionKeypair;
use libp2p::PeerId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use x25519_dalek::{PublicKey, StaticSecret};

/// Per-identity encryption key storage
#[derive(Clone, Default)]
pub struct KeyStore {
    keys: Arc<RwLock<HashMap<PeerId, EncryptionKeypair>>>,
}

impl KeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the key pair for `peer_id`
    pub fn put(&self, peer_id: PeerId, keys: EncryptionKeypair) {
        self.keys.write().insert(peer_id, keys);
    }

    /// Key pair stored for `peer_id`
    pub fn get(&self, peer_id: &PeerId) -> Option<EncryptionKeypair> {
        self.keys.read().get(peer_id).cloned()
    }

    /// Public encryption key stored for `peer_id`
    pub fn public_key(&self, peer_id: &PeerId) -> Option<PublicKey> {
        self.keys.read().get(peer_id).map(|k| *k.public_key())
    }

    /// Secret encryption key stored for `peer_id`
    pub fn secret_key(&self, peer_id: &PeerId) -> Option<StaticSecret> {
        self.keys.read().get(peer_id).map(|k| k.secret_key().clone())
    }

    /// Whether a key pair is stored for `peer_id`
    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.keys.read().contains_key(peer_id)
    }

    /// Remove the key pair stored for `peer_id`
    pub fn remove(&self, peer_id: &PeerId) -> Option<EncryptionKeypair> {
        self.keys.write().remove(peer_id)
    }
}
