// Onion Messages — layered sign-then-seal envelopes
//
// The sender signs the plaintext once, then wraps the signed message in one
// sealed layer per hop, innermost (destination) first. Each relay peels one
// layer and learns only the next hop; the destination alone sees the sender.
//
// Signing happens before any encryption, so authenticity never depends on a
// relay's encryption key staying secret.

use crate::crypto::{self, SealError};
use crate::identity::peer_id_matches_keypair;
use libp2p::identity::{
    DecodingError, Keypair, ParseError, PublicKey as SigningPublicKey, SigningError,
};
use libp2p::PeerId;
use prost::Message;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

#[derive(Debug, Error)]
pub enum OnionError {
    #[error("could not sign message: {0}")]
    CouldNotSign(#[source] SigningError),
    #[error("could not encrypt layer: {0}")]
    CouldNotEncrypt(#[source] SealError),
    #[error("could not decrypt ciphertext")]
    CouldNotDecrypt(#[source] SealError),
    #[error("invalid message sender: {0}")]
    InvalidSender(#[source] SenderError),
    #[error("invalid message signature")]
    InvalidSignature,
    #[error("invalid message recipient: ID doesn't match ours")]
    InvalidRecipient,
    #[error("cannot decapsulate: private key doesn't match recipient")]
    DecapsulateKeyMismatch,
    #[error("cannot decapsulate: last hop reached")]
    DecapsulateOnLastHop,
    #[error("could not marshal/unmarshal message: {0}")]
    Marshal(#[from] prost::DecodeError),
}

/// Why the sender fields of a last-hop message were rejected
#[derive(Debug, Error)]
pub enum SenderError {
    #[error("sender ID doesn't parse: {0}")]
    PeerId(#[from] ParseError),
    #[error("sender public key doesn't decode: {0}")]
    PublicKey(#[from] DecodingError),
    #[error("sender ID doesn't match public key")]
    KeyMismatch,
}

impl From<SenderError> for OnionError {
    fn from(error: SenderError) -> Self {
        OnionError::InvalidSender(error)
    }
}

/// One onion layer.
///
/// An empty `to` marks the innermost layer: it carries the plaintext
/// `content` plus the sender's `from`/`from_public_key`/`signature`. Every
/// other layer only carries the next hop in `to` and the sealed inner layer
/// in `content`.
#[derive(Clone, PartialEq, Message)]
pub struct OnionMessage {
    /// Next hop peer ID (empty on the last hop)
    #[prost(bytes = "vec", tag = "1")]
    pub to: Vec<u8>,
    /// Sender peer ID
    #[prost(bytes = "vec", tag = "2")]
    pub from: Vec<u8>,
    /// Sender signing public key (libp2p protobuf encoding)
    #[prost(bytes = "vec", tag = "3")]
    pub from_public_key: Vec<u8>,
    /// Plaintext on the last hop, sealed inner layer otherwise
    #[prost(bytes = "vec", tag = "4")]
    pub content: Vec<u8>,
    /// Sender signature over the plaintext `content`
    #[prost(bytes = "vec", tag = "5")]
    pub signature: Vec<u8>,
}

impl OnionMessage {
    /// Create the innermost, signed layer of a new message.
    pub fn new(from: &PeerId, signing_key: &Keypair, content: Vec<u8>) -> Result<Self, OnionError> {
        let signature = signing_key
            .sign(&content)
            .map_err(OnionError::CouldNotSign)?;

        Ok(Self {
            to: Vec::new(),
            from: from.to_bytes(),
            from_public_key: signing_key.public().encode_protobuf(),
            content,
            signature,
        })
    }

    /// Check that this layer is meant for `local_peer_id`.
    ///
    /// On the last hop this verifies the sender identity and signature
    /// instead, since there is no recipient left to check.
    pub fn validate(&self, local_peer_id: &PeerId) -> Result<(), OnionError> {
        if self.is_last_hop() {
            return self.validate_last_hop();
        }

        self.validate_intermediate_hop(local_peer_id)
    }

    fn validate_last_hop(&self) -> Result<(), OnionError> {
        let from = PeerId::from_bytes(&self.from).map_err(SenderError::from)?;
        let from_key = SigningPublicKey::try_decode_protobuf(&self.from_public_key)
            .map_err(SenderError::from)?;

        if from_key.to_peer_id() != from {
            return Err(SenderError::KeyMismatch.into());
        }

        if !from_key.verify(&self.content, &self.signature) {
            return Err(OnionError::InvalidSignature);
        }

        Ok(())
    }

    fn validate_intermediate_hop(&self, local_peer_id: &PeerId) -> Result<(), OnionError> {
        match PeerId::from_bytes(&self.to) {
            Ok(to) if to == *local_peer_id => Ok(()),
            _ => Err(OnionError::InvalidRecipient),
        }
    }

    /// True when this is the innermost layer.
    pub fn is_last_hop(&self) -> bool {
        self.to.is_empty()
    }

    /// Next hop, if this is not the last layer and `to` parses.
    pub fn next_hop(&self) -> Option<PeerId> {
        if self.is_last_hop() {
            return None;
        }
        PeerId::from_bytes(&self.to).ok()
    }

    /// Sender of a last-hop message, if `from` parses.
    pub fn sender(&self) -> Option<PeerId> {
        PeerId::from_bytes(&self.from).ok()
    }

    /// Wrap this message in a new layer addressed to `to`.
    ///
    /// `encryption_key` is the hop's published X25519 key. Wrapping the
    /// destination first and the first relay last yields a message that can
    /// be handed to the first relay.
    pub fn encapsulate(&self, to: &PeerId, encryption_key: &PublicKey) -> Result<Self, OnionError> {
        let inner = self.encode_to_vec();
        let content = crypto::seal(encryption_key, &inner).map_err(OnionError::CouldNotEncrypt)?;

        Ok(Self {
            to: to.to_bytes(),
            content,
            ..Default::default()
        })
    }

    /// Peel one layer with our signing key and X25519 secret.
    ///
    /// The caller checks [`is_last_hop`](Self::is_last_hop) on the result
    /// to decide between delivering and forwarding.
    pub fn decapsulate(
        &self,
        signing_key: &Keypair,
        encryption_key: &StaticSecret,
    ) -> Result<Self, OnionError> {
        if self.is_last_hop() {
            return Err(OnionError::DecapsulateOnLastHop);
        }

        let to = PeerId::from_bytes(&self.to).map_err(|_| OnionError::DecapsulateKeyMismatch)?;
        if !peer_id_matches_keypair(&to, signing_key) {
            return Err(OnionError::DecapsulateKeyMismatch);
        }

        let inner = crypto::open(encryption_key, &self.content).map_err(OnionError::CouldNotDecrypt)?;

        Ok(Self::decode(inner.as_slice())?)
    }
}
