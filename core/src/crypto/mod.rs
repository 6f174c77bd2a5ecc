// Cryptography module — anonymous sealed boxes for onion layers

pub mod seal;

pub use seal::{open, seal, SealError, SEAL_OVERHEAD};
