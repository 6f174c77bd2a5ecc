// Public key validator — policing encryption key records in the directory
//
// Records live under `/enc/<base58 peer ID>`. A record is only accepted when
// it is signed by the peer named in its key, and replicas of the same key
// are reconciled by keeping the most recently published record.

use super::record::{KeyType, PublicKeyRecord};
use crate::identity::ENCRYPTION_KEY_SIZE;
use libp2p::identity::{Keypair, PublicKey as SigningPublicKey, SigningError};
use libp2p::PeerId;
use prost::Message;
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;
use x25519_dalek::PublicKey;

/// Namespace used for storing encryption public keys on the directory
pub const ENCRYPTION_NAMESPACE: &str = "enc";

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("invalid DHT key format")]
    InvalidKeyFormat,
    #[error("invalid DHT key namespace")]
    InvalidNamespace,
    #[error("invalid sender signature")]
    InvalidSenderSignature,
    #[error("invalid key data: {0}")]
    InvalidKeyData(String),
    #[error("could not sign record: {0}")]
    CouldNotSign(#[source] SigningError),
    #[error("could not marshal/unmarshal record: {0}")]
    Marshal(#[from] prost::DecodeError),
    #[error("no valid record among {0} candidates")]
    NoValidRecord(usize),
}

/// Validation hooks a directory runs on writes and reads.
pub trait RecordValidator: Send + Sync {
    /// Accept or reject `value` for storage under `key`.
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidatorError>;

    /// Index of the authoritative record among diverging replicas.
    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidatorError>;
}

/// Validates public keys used for node-to-node encryption before they are
/// stored in the directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicKeyValidator;

impl PublicKeyValidator {
    /// Namespaced directory key for `peer_id`'s encryption key
    pub fn create_key(&self, peer_id: &PeerId) -> String {
        format!("/{}/{}", ENCRYPTION_NAMESPACE, peer_id.to_base58())
    }

    /// Signed record publishing `encryption_key`, timestamped now
    pub fn create_record(
        &self,
        signing_key: &Keypair,
        encryption_key: &PublicKey,
    ) -> Result<Vec<u8>, ValidatorError> {
        self.create_record_at(signing_key, encryption_key, SystemTime::now())
    }

    /// Signed record publishing `encryption_key` with an explicit timestamp
    pub fn create_record_at(
        &self,
        signing_key: &Keypair,
        encryption_key: &PublicKey,
        created_at: SystemTime,
    ) -> Result<Vec<u8>, ValidatorError> {
        let mut record = PublicKeyRecord {
            key_type: KeyType::Curve25519 as i32,
            created_at: Some(created_at.into()),
            data: encryption_key.as_bytes().to_vec(),
            ..Default::default()
        };

        record.signature = signing_key
            .sign(&record.signing_bytes())
            .map_err(ValidatorError::CouldNotSign)?;
        record.signature_key = signing_key.public().encode_protobuf();

        Ok(record.encode_to_vec())
    }

    /// Extract the peer ID from a key of the form `/enc/<peer ID>`
    pub fn peer_id_from_key(&self, key: &str) -> Result<PeerId, ValidatorError> {
        let key = key.strip_prefix('/').ok_or(ValidatorError::InvalidKeyFormat)?;

        let (namespace, encoded) = key
            .split_once('/')
            .ok_or(ValidatorError::InvalidKeyFormat)?;
        if namespace.is_empty() {
            return Err(ValidatorError::InvalidKeyFormat);
        }
        if namespace != ENCRYPTION_NAMESPACE {
            return Err(ValidatorError::InvalidNamespace);
        }

        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| ValidatorError::InvalidKeyFormat)?;
        PeerId::from_bytes(&bytes).map_err(|_| ValidatorError::InvalidKeyFormat)
    }

    /// Decode a record fetched from the directory into the published key
    pub fn encryption_key(&self, value: &[u8]) -> Result<PublicKey, ValidatorError> {
        let record = PublicKeyRecord::decode(value)?;
        Self::key_data(&record)
    }

    fn key_data(record: &PublicKeyRecord) -> Result<PublicKey, ValidatorError> {
        if KeyType::try_from(record.key_type).is_err() {
            return Err(ValidatorError::InvalidKeyData(format!(
                "unsupported key type {}",
                record.key_type
            )));
        }

        let bytes: [u8; ENCRYPTION_KEY_SIZE] = record.data.as_slice().try_into().map_err(|_| {
            ValidatorError::InvalidKeyData(format!("expected {} bytes", ENCRYPTION_KEY_SIZE))
        })?;

        // Curve25519 has twist security, so any 32-byte value is a usable key.
        Ok(PublicKey::from(bytes))
    }

    fn validate_record(&self, peer_id: &PeerId, record: &PublicKeyRecord) -> Result<(), ValidatorError> {
        let signature_key = SigningPublicKey::try_decode_protobuf(&record.signature_key)
            .map_err(|_| ValidatorError::InvalidSenderSignature)?;

        if signature_key.to_peer_id() != *peer_id {
            return Err(ValidatorError::InvalidSenderSignature);
        }

        if !signature_key.verify(&record.signing_bytes(), &record.signature) {
            return Err(ValidatorError::InvalidSenderSignature);
        }

        Self::key_data(record).map(|_| ())
    }
}

impl RecordValidator for PublicKeyValidator {
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidatorError> {
        let peer_id = self.peer_id_from_key(key)?;
        let record = PublicKeyRecord::decode(value)?;
        self.validate_record(&peer_id, &record)
    }

    /// Select the most recently published encryption key.
    ///
    /// Candidates that fail to decode or validate are skipped. Ties keep
    /// the earliest candidate.
    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidatorError> {
        let peer_id = self.peer_id_from_key(key)?;

        let mut best: Option<(usize, PublicKeyRecord)> = None;
        for (index, value) in values.iter().enumerate() {
            let record = match PublicKeyRecord::decode(value.as_slice()) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Skipping undecodable record {} for {}: {}", index, key, e);
                    continue;
                }
            };
            if let Err(e) = self.validate_record(&peer_id, &record) {
                debug!("Skipping invalid record {} for {}: {}", index, key, e);
                continue;
            }

            let newer = match &best {
                Some((_, current)) => record.cmp_created_at(current).is_gt(),
                None => true,
            };
            if newer {
                best = Some((index, record));
            }
        }

        best.map(|(index, _)| index)
            .ok_or(ValidatorError::NoValidRecord(values.len()))
    }
}
