// Echalotte Core — anonymous onion routing over a peer-to-peer network
//
// A sender wraps a signed message in one sealed layer per relay of a
// randomly built circuit. Each relay learns only the next hop; only the
// destination learns who wrote the message.

pub mod config;
pub mod crypto;
pub mod directory;
pub mod host;
pub mod identity;
pub mod message;
pub mod privacy;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, EchalotteConfig};
pub use crypto::{open, seal, SealError};
pub use directory::{
    Directory, MemoryDirectory, PublicKeyRecord, PublicKeyValidator, RecordValidator,
    ValidatorError,
};
pub use host::{HostError, Inbound, OnionHost};
pub use identity::{EncryptionKeypair, KeyStore};
pub use message::{decode_message, encode_message, CodecError, PROTOCOL_ID};
pub use privacy::{
    Circuit, CircuitBuilder, CircuitError, CircuitOptions, CircuitProvider, OnionError,
    OnionMessage, RelayPadding, SizePolicy,
};
pub use transport::{Discovery, Network, RelayInfo, RelayStream, ONION_RELAY_NAMESPACE};
