// Directory — replicated key-value store publishing per-node encryption keys
//
// The real directory is a DHT owned by the host; this module only defines
// the interface the onion layer needs, the record format and validator it
// plugs into the DHT, and an in-memory implementation for tests and demos.

pub mod record;
pub mod validator;

pub use record::{KeyType, PublicKeyRecord};
pub use validator::{PublicKeyValidator, RecordValidator, ValidatorError, ENCRYPTION_NAMESPACE};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Key-value directory the host publishes and looks up encryption keys in
#[async_trait]
pub trait Directory: Send + Sync {
    async fn put_value(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn get_value(&self, key: &str) -> Result<Vec<u8>>;
}

/// In-memory directory with pluggable validation.
///
/// Every replica written for a key is kept. Writes run
/// [`RecordValidator::validate`] and reads resolve the replicas with
/// [`RecordValidator::select`], the way a DHT with a record validator does.
#[derive(Clone)]
pub struct MemoryDirectory {
    validator: Arc<dyn RecordValidator>,
    records: Arc<RwLock<HashMap<String, Vec<Vec<u8>>>>>,
}

impl MemoryDirectory {
    pub fn new(validator: Arc<dyn RecordValidator>) -> Self {
        Self {
            validator,
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Directory validating encryption key records
    pub fn for_public_keys() -> Self {
        Self::new(Arc::new(PublicKeyValidator))
    }

    /// Store a replica without validation, as a diverging or malicious
    /// replica would.
    pub fn insert_replica(&self, key: &str, value: Vec<u8>) {
        self.records
            .write()
            .entry(key.to_string())
            .or_default()
            .push(value);
    }

    /// Number of replicas held for `key`
    pub fn replica_count(&self, key: &str) -> usize {
        self.records.read().get(key).map_or(0, Vec::len)
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::for_public_keys()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn put_value(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.validator.validate(key, &value)?;
        self.insert_replica(key, value);
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Vec<u8>> {
        let records = self.records.read();
        let replicas = records
            .get(key)
            .ok_or_else(|| anyhow!("no record found for {}", key))?;

        let index = self.validator.select(key, replicas)?;
        Ok(replicas[index].clone())
    }
}
