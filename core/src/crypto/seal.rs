// Sealed boxes: anonymous X25519 + XChaCha20-Poly1305 encryption
//
// Flow:
// 1. Generate an ephemeral X25519 keypair (one per sealed message)
// 2. ECDH: ephemeral_secret × recipient_public → shared_secret
// 3. KDF: Blake3::derive_key(shared_secret) → symmetric_key
// 4. Nonce: SHA-256(ephemeral_public ‖ recipient_public)[0..24]
// 5. Output: ephemeral_public ‖ XChaCha20-Poly1305(symmetric_key, nonce, plaintext)
//
// Recipient reverses:
// 1. Derive its own public key from its static secret
// 2. Split the leading 32-byte ephemeral public key off the sealed bytes
// 3. ECDH + KDF + nonce derivation exactly as above
// 4. Decrypt and authenticate
//
// No sender key is involved, so a sealed box cannot be linked to its sender.
// The nonce is a function of both public keys and the ephemeral key is never
// reused, so a (key, nonce) pair never repeats.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Size of an X25519 public key (bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (bytes)
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag (bytes)
pub const TAG_SIZE: usize = 16;

/// Bytes added to the plaintext by [`seal`]
pub const SEAL_OVERHEAD: usize = PUBLIC_KEY_SIZE + TAG_SIZE;

/// KDF context string for sealed-box symmetric keys.
/// Changing this breaks compatibility with every relay on the network.
const KDF_CONTEXT: &str = "echalotte v1 sealed box layer key";

#[derive(Debug, Error)]
pub enum SealError {
    #[error("could not decrypt ciphertext")]
    CouldNotDecrypt,
    #[error("invalid recipient public key: low-order point")]
    InvalidPublicKey,
    #[error("encryption failed")]
    EncryptionFailed,
}

fn derive_key(shared_secret: &[u8]) -> [u8; 32] {
    blake3::derive_key(KDF_CONTEXT, shared_secret)
}

/// Nonce = first 24 bytes of SHA-256(ephemeral_public ‖ recipient_public)
fn derive_nonce(ephemeral_public: &PublicKey, recipient_public: &PublicKey) -> [u8; NONCE_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(ephemeral_public.as_bytes());
    hasher.update(recipient_public.as_bytes());
    let digest = hasher.finalize();

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

/// Seal `plaintext` to `recipient` with a throw-away ephemeral key.
///
/// The output is `ephemeral_public ‖ ciphertext` and is
/// [`SEAL_OVERHEAD`] bytes longer than the plaintext.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let shared_secret = ephemeral_secret.diffie_hellman(recipient);
    if !shared_secret.was_contributory() {
        return Err(SealError::InvalidPublicKey);
    }

    let mut symmetric_key = derive_key(shared_secret.as_bytes());
    let nonce = derive_nonce(&ephemeral_public, recipient);

    let cipher = XChaCha20Poly1305::new_from_slice(&symmetric_key)
        .map_err(|_| SealError::EncryptionFailed);
    symmetric_key.zeroize();

    let ciphertext = cipher?
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| SealError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(PUBLIC_KEY_SIZE + ciphertext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed box with the recipient's X25519 static secret.
///
/// Any failure (truncated input, wrong key, tampered bytes) is reported
/// as [`SealError::CouldNotDecrypt`].
pub fn open(recipient_secret: &StaticSecret, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(SealError::CouldNotDecrypt);
    }

    let recipient_public = PublicKey::from(recipient_secret);

    let (ephemeral_bytes, ciphertext) = sealed.split_at(PUBLIC_KEY_SIZE);
    let ephemeral_bytes: [u8; PUBLIC_KEY_SIZE] = ephemeral_bytes
        .try_into()
        .map_err(|_| SealError::CouldNotDecrypt)?;
    let ephemeral_public = PublicKey::from(ephemeral_bytes);

    let shared_secret = recipient_secret.diffie_hellman(&ephemeral_public);
    if !shared_secret.was_contributory() {
        return Err(SealError::CouldNotDecrypt);
    }

    let mut symmetric_key = derive_key(shared_secret.as_bytes());
    let nonce = derive_nonce(&ephemeral_public, &recipient_public);

    let cipher = XChaCha20Poly1305::new_from_slice(&symmetric_key)
        .map_err(|_| SealError::CouldNotDecrypt);
    symmetric_key.zeroize();

    cipher?
        .decrypt(XNonce::from_slice(&nonce), ciphertext)
        .map_err(|_| SealError::CouldNotDecrypt)
}
