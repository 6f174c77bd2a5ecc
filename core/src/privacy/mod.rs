// Privacy — onion layering and circuit building
//
// Provides layered encryption of messages, random circuit selection among
// discovered relays, and size obfuscation of discovery requests.

pub mod circuit;
pub mod onion;
pub mod padding;

pub use circuit::{
    Circuit, CircuitBuilder, CircuitError, CircuitOptions, CircuitProvider, RelaySearchError,
    DEFAULT_CIRCUIT_SIZE, DEFAULT_CIRCUIT_TIMEOUT,
};
pub use onion::{OnionError, OnionMessage, SenderError};
pub use padding::{PaddingError, RelayPadding, SizePolicy};
