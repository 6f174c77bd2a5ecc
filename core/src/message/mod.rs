// Message module — wire encoding for onion layers

pub mod codec;

pub use codec::{decode_message, encode_message, CodecError, MAX_MESSAGE_SIZE, PROTOCOL_ID};
