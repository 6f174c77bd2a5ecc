// Directory records — signed publication of a node's encryption key
//
// Field numbers are part of the wire format shared with other
// implementations and must not change.

use prost::{Enumeration, Message};
use prost_types::Timestamp;
use std::cmp::Ordering;

/// The type of encryption key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum KeyType {
    Curve25519 = 0,
}

/// An encryption public key, signed by the publishing peer.
#[derive(Clone, PartialEq, Message)]
pub struct PublicKeyRecord {
    #[prost(enumeration = "KeyType", tag = "1")]
    pub key_type: i32,
    #[prost(message, optional, tag = "2")]
    pub created_at: Option<Timestamp>,
    /// Raw encryption key bytes
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
    /// Signer's public key (libp2p protobuf encoding)
    #[prost(bytes = "vec", tag = "10")]
    pub signature_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "11")]
    pub signature: Vec<u8>,
}

impl PublicKeyRecord {
    /// Bytes covered by the signature: the record with both signature
    /// fields cleared.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let unsigned = Self {
            signature_key: Vec::new(),
            signature: Vec::new(),
            ..self.clone()
        };
        unsigned.encode_to_vec()
    }

    /// Compare publication times; a missing timestamp is the oldest.
    pub fn cmp_created_at(&self, other: &Self) -> Ordering {
        created_at_key(self.created_at.as_ref()).cmp(&created_at_key(other.created_at.as_ref()))
    }
}

fn created_at_key(timestamp: Option<&Timestamp>) -> (i64, i32) {
    timestamp.map_or((i64::MIN, i32::MIN), |t| (t.seconds, t.nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(seconds: i64, nanos: i32) -> PublicKeyRecord {
        PublicKeyRecord {
            key_type: KeyType::Curve25519 as i32,
            created_at: Some(Timestamp { seconds, nanos }),
            data: vec![7; 32],
            ..Default::default()
        }
    }

    #[test]
    fn test_signing_bytes_ignore_signature_fields() {
        let unsigned = record_at(10, 0);
        let signed = PublicKeyRecord {
            signature_key: vec![1; 36],
            signature: vec![2; 64],
            ..unsigned.clone()
        };

        assert_eq!(signed.signing_bytes(), unsigned.encode_to_vec());
    }

    #[test]
    fn test_field_numbers() {
        let record = PublicKeyRecord {
            key_type: KeyType::Curve25519 as i32,
            created_at: None,
            data: vec![0xAA],
            signature_key: vec![0xBB],
            signature: vec![0xCC],
        };

        // Proto3 omits the zero enum; remaining fields are tagged 3, 10 and 11.
        let bytes = record.encode_to_vec();
        assert_eq!(bytes, vec![0x1A, 0x01, 0xAA, 0x52, 0x01, 0xBB, 0x5A, 0x01, 0xCC]);
    }

    #[test]
    fn test_created_at_ordering() {
        assert_eq!(record_at(10, 0).cmp_created_at(&record_at(9, 999)), Ordering::Greater);
        assert_eq!(record_at(10, 1).cmp_created_at(&record_at(10, 2)), Ordering::Less);
        assert_eq!(record_at(10, 5).cmp_created_at(&record_at(10, 5)), Ordering::Equal);

        let undated = PublicKeyRecord::default();
        assert_eq!(undated.cmp_created_at(&record_at(0, 0)), Ordering::Less);
    }

    #[test]
    fn test_default_key_type_is_curve25519() {
        let record = PublicKeyRecord::default();
        assert_eq!(record.key_type(), KeyType::Curve25519);
    }
}
