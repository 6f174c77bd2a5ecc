// Cryptographic key management

use libp2p::identity::Keypair;
use libp2p::PeerId;
use x25519_dalek::{PublicKey, StaticSecret};

/// Size of a Curve25519 encryption key (bytes)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Per-node X25519 key pair used to open onion layers addressed to us
#[derive(Clone)]
pub struct EncryptionKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl EncryptionKeypair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        Self::from_secret(secret)
    }

    /// Rebuild a key pair from its secret half
    pub fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Key other peers seal layers to
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Key used to open sealed layers
    pub fn secret_key(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for EncryptionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeypair")
            .field("public", &bs58::encode(self.public.as_bytes()).into_string())
            .finish_non_exhaustive()
    }
}

/// Whether `peer_id` is the identity of `keypair`
pub fn peer_id_matches_keypair(peer_id: &PeerId, keypair: &Keypair) -> bool {
    keypair.public().to_peer_id() == *peer_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let a = EncryptionKeypair::generate();
        let b = EncryptionKeypair::generate();

        assert_eq!(a.public_key().as_bytes().len(), ENCRYPTION_KEY_SIZE);
        assert_ne!(a.public_key().as_bytes(), b.public_key().as_bytes());
    }

    #[test]
    fn test_from_secret_restores_public_key() {
        let keys = EncryptionKeypair::generate();
        let restored = EncryptionKeypair::from_secret(StaticSecret::from(keys.secret_key().to_bytes()));

        assert_eq!(keys.public_key().as_bytes(), restored.public_key().as_bytes());
    }

    #[test]
    fn test_debug_hides_secret() {
        let keys = EncryptionKeypair::generate();
        let debug = format!("{:?}", keys);

        assert!(debug.contains("public"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_peer_id_matches_keypair() {
        let keypair = Keypair::generate_ed25519();
        let other = Keypair::generate_ed25519();

        assert!(peer_id_matches_keypair(&keypair.public().to_peer_id(), &keypair));
        assert!(!peer_id_matches_keypair(&other.public().to_peer_id(), &keypair));
    }
}
