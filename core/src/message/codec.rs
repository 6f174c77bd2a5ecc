// Message codec — protobuf serialization with size limits to prevent abuse
//
// One onion layer travels per stream on `PROTOCOL_ID`; the stream is closed
// once the encoded layer has been written, so no length prefix is needed.

use crate::privacy::OnionMessage;
use prost::Message;
use thiserror::Error;

/// Stream protocol for onion layers
pub const PROTOCOL_ID: &str = "/echalotte/v1.0.0";

/// Maximum encoded layer size: 256 KB
/// This prevents memory exhaustion from malicious oversized messages.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("could not marshal/unmarshal message: {0}")]
    Marshal(#[from] prost::DecodeError),
}

/// Serialize an onion layer for the wire
pub fn encode_message(message: &OnionMessage, max_size: usize) -> Result<Vec<u8>, CodecError> {
    let size = message.encoded_len();
    if size > max_size {
        return Err(CodecError::TooLarge { size, max: max_size });
    }

    Ok(message.encode_to_vec())
}

/// Deserialize an onion layer read from the wire
pub fn decode_message(bytes: &[u8], max_size: usize) -> Result<OnionMessage, CodecError> {
    if bytes.len() > max_size {
        return Err(CodecError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }

    Ok(OnionMessage::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_decode_as_empty() {
        let message = OnionMessage {
            to: vec![1, 2, 3],
            content: vec![9; 40],
            ..Default::default()
        };

        let bytes = encode_message(&message, MAX_MESSAGE_SIZE).unwrap();
        let restored = decode_message(&bytes, MAX_MESSAGE_SIZE).unwrap();

        assert_eq!(restored, message);
        assert!(restored.from.is_empty());
        assert!(restored.from_public_key.is_empty());
        assert!(restored.signature.is_empty());
    }

    #[test]
    fn test_empty_bytes_decode_as_empty_message() {
        let restored = decode_message(&[], MAX_MESSAGE_SIZE).unwrap();
        assert!(restored.is_last_hop());
        assert!(restored.content.is_empty());
    }

    #[test]
    fn test_reject_oversized_encode() {
        let message = OnionMessage {
            content: vec![0u8; 1024],
            ..Default::default()
        };

        let result = encode_message(&message, 512);
        assert!(matches!(result, Err(CodecError::TooLarge { max: 512, .. })));
    }

    #[test]
    fn test_reject_oversized_decode() {
        let big_bytes = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let result = decode_message(&big_bytes, MAX_MESSAGE_SIZE);
        assert!(matches!(result, Err(CodecError::TooLarge { .. })));
    }

    #[test]
    fn test_reject_garbage() {
        let result = decode_message(&[0xFF; 6], MAX_MESSAGE_SIZE);
        assert!(matches!(result, Err(CodecError::Marshal(_))));
    }
}
