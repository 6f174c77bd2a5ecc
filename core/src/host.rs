// Onion host — sending and relaying onion messages on top of a network node
//
// The host owns the node's encryption key, publishes it in the directory,
// and turns plaintext into layered messages routed through a fresh circuit.
// Inbound layers are either delivered locally or forwarded to the next hop.

use crate::config::EchalotteConfig;
use crate::directory::{Directory, PublicKeyValidator, ValidatorError};
use crate::identity::{EncryptionKeypair, KeyStore};
use crate::message::{decode_message, encode_message, CodecError, PROTOCOL_ID};
use crate::privacy::{
    Circuit, CircuitError, CircuitProvider, OnionError, OnionMessage, SenderError,
};
use crate::transport::Network;
use libp2p::identity::Keypair;
use libp2p::PeerId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no encryption key registered for the local peer")]
    MissingEncryptionKey,
    #[error("circuit has no relays")]
    EmptyCircuit,
    #[error("message has no valid next hop")]
    InvalidNextHop,
    #[error("directory error: {0}")]
    Directory(#[source] anyhow::Error),
    #[error("network error: {0}")]
    Network(#[source] anyhow::Error),
    #[error(transparent)]
    Record(#[from] ValidatorError),
    #[error(transparent)]
    Circuit(#[from] CircuitError),
    #[error(transparent)]
    Onion(#[from] OnionError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Outcome of handling an inbound onion layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// We were the destination; the sender's signature has been verified
    Delivered { from: PeerId, content: Vec<u8> },
    /// We were a relay and passed the inner layer on
    Forwarded { next_hop: PeerId },
}

/// A network node able to send, relay and receive onion messages
pub struct OnionHost {
    network: Arc<dyn Network>,
    directory: Arc<dyn Directory>,
    circuits: Arc<dyn CircuitProvider>,
    keys: KeyStore,
    validator: PublicKeyValidator,
    config: EchalotteConfig,
}

impl OnionHost {
    /// Register an encryption key for the local peer, then wait until a
    /// first circuit can be built.
    ///
    /// Circuit building is retried every `readiness_retry_interval` until
    /// it succeeds. Drop the returned future to give up.
    pub async fn connect(
        network: Arc<dyn Network>,
        directory: Arc<dyn Directory>,
        circuits: Arc<dyn CircuitProvider>,
        config: EchalotteConfig,
    ) -> Result<Self, HostError> {
        let host = Self {
            network,
            directory,
            circuits,
            keys: KeyStore::new(),
            validator: PublicKeyValidator,
            config,
        };

        host.register_encryption_key().await?;
        host.wait_until_ready().await;

        info!("Onion host {} ready", host.local_peer_id());
        Ok(host)
    }

    async fn register_encryption_key(&self) -> Result<(), HostError> {
        let local = self.local_peer_id();
        if self.keys.get(&local).is_none() {
            self.keys.put(local, EncryptionKeypair::generate());
        }
        let public_key = self.encryption_key()?;

        let record = self
            .validator
            .create_record(self.network.keypair(), &public_key)?;
        self.directory
            .put_value(&self.validator.create_key(&local), record)
            .await
            .map_err(HostError::Directory)?;

        debug!("Published encryption key for {}", local);
        Ok(())
    }

    async fn wait_until_ready(&self) {
        let mut attempt = 1u32;
        loop {
            match self.circuits.build(&self.config.circuit).await {
                Ok(_) => return,
                Err(e) => {
                    warn!(
                        "Onion host not ready yet (attempt {}): {}; retrying in {:?}",
                        attempt, e, self.config.readiness_retry_interval
                    );
                }
            }
            tokio::time::sleep(self.config.readiness_retry_interval).await;
            attempt = attempt.saturating_add(1);
        }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.network.local_peer_id()
    }

    pub fn keypair(&self) -> &Keypair {
        self.network.keypair()
    }

    pub fn config(&self) -> &EchalotteConfig {
        &self.config
    }

    /// Our published encryption key
    pub fn encryption_key(&self) -> Result<PublicKey, HostError> {
        self.keys
            .public_key(&self.local_peer_id())
            .ok_or(HostError::MissingEncryptionKey)
    }

    /// Secret half of our encryption key
    pub fn decryption_key(&self) -> Result<StaticSecret, HostError> {
        self.keys
            .secret_key(&self.local_peer_id())
            .ok_or(HostError::MissingEncryptionKey)
    }

    /// Look up the encryption key `peer` published in the directory.
    pub async fn peer_encryption_key(&self, peer: &PeerId) -> Result<PublicKey, HostError> {
        let value = self
            .directory
            .get_value(&self.validator.create_key(peer))
            .await
            .map_err(HostError::Directory)?;

        Ok(self.validator.encryption_key(&value)?)
    }

    /// Send `content` to `to` through a freshly built circuit.
    ///
    /// Returns the circuit the message was routed through.
    pub async fn send_message(&self, to: &PeerId, content: Vec<u8>) -> Result<Circuit, HostError> {
        let circuit = self.circuits.build(&self.config.circuit).await?;
        let first_hop = *circuit.first_hop().ok_or(HostError::EmptyCircuit)?;

        let local = self.local_peer_id();
        let mut message = OnionMessage::new(&local, self.network.keypair(), content)?;

        let destination_key = self.peer_encryption_key(to).await?;
        message = message.encapsulate(to, &destination_key)?;

        for relay in circuit.iter().rev() {
            let relay_key = self.peer_encryption_key(relay).await?;
            message = message.encapsulate(relay, &relay_key)?;
        }

        let bytes = encode_message(&message, self.config.max_message_size)?;
        self.network
            .send(first_hop, PROTOCOL_ID, bytes)
            .await
            .map_err(HostError::Network)?;

        debug!("Sent onion message through {} relays", circuit.len());
        Ok(circuit)
    }

    /// Handle one onion layer read from a `PROTOCOL_ID` stream.
    pub async fn handle_message(&self, bytes: &[u8]) -> Result<Inbound, HostError> {
        let message = decode_message(bytes, self.config.max_message_size)?;
        let local = self.local_peer_id();
        message.validate(&local)?;

        let inner = message.decapsulate(self.network.keypair(), &self.decryption_key()?)?;

        if inner.is_last_hop() {
            inner.validate(&local)?;
            let from = PeerId::from_bytes(&inner.from)
                .map_err(|e| OnionError::from(SenderError::from(e)))?;

            info!("Delivered onion message from {}", from);
            return Ok(Inbound::Delivered {
                from,
                content: inner.content,
            });
        }

        let next_hop = inner.next_hop().ok_or(HostError::InvalidNextHop)?;
        let bytes = encode_message(&inner, self.config.max_message_size)?;
        self.network
            .send(next_hop, PROTOCOL_ID, bytes)
            .await
            .map_err(HostError::Network)?;

        debug!("Forwarded onion message to {}", next_hop);
        Ok(Inbound::Forwarded { next_hop })
    }
}
