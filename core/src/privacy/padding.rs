// Relay Padding — hiding the circuit size from discovery observers
//
// The circuit builder never asks the network for exactly the number of relays
// it needs. Both the discovery fan-out and the number of collected candidates
// are inflated and randomized, so an observer of discovery traffic cannot
// recover the circuit size.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaddingError {
    #[error("Invalid padding configuration: {0}")]
    InvalidConfig(String),
}

/// A function from requested circuit size to the size exposed on the network
pub trait SizePolicy: Send + Sync {
    fn padded_size(&self, size: usize) -> usize;
}

impl<F> SizePolicy for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    fn padded_size(&self, size: usize) -> usize {
        self(size)
    }
}

/// Padding scheme options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayPadding {
    /// Expose the requested size unchanged
    None,
    /// `multiplier * size + U(0, jitter * size)`, drawn from the OS CSPRNG
    Scaled { multiplier: usize, jitter: usize },
}

impl RelayPadding {
    /// Discovery fan-out: `4n + U(0, 2n)`
    pub const DISCOVERY: Self = Self::Scaled {
        multiplier: 4,
        jitter: 2,
    };

    /// Candidates collected before selection: `2n + U(0, n)`
    pub const COLLECTION: Self = Self::Scaled {
        multiplier: 2,
        jitter: 1,
    };

    /// Validate padding configuration
    pub fn validate(&self) -> Result<(), PaddingError> {
        match self {
            Self::Scaled { multiplier: 0, .. } => Err(PaddingError::InvalidConfig(
                "multiplier must be greater than 0".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Smallest and largest value [`padded_size`](SizePolicy::padded_size)
    /// can return for `size`
    pub fn bounds(&self, size: usize) -> (usize, usize) {
        match *self {
            Self::None => (size, size),
            Self::Scaled { multiplier, jitter } => {
                let base = multiplier.saturating_mul(size);
                let spread = jitter.saturating_mul(size);
                (base, base.saturating_add(spread.saturating_sub(1)))
            }
        }
    }
}

impl SizePolicy for RelayPadding {
    fn padded_size(&self, size: usize) -> usize {
        match *self {
            Self::None => size,
            Self::Scaled { multiplier, jitter } => {
                let base = multiplier.saturating_mul(size);
                let spread = jitter.saturating_mul(size);
                if spread == 0 {
                    return base;
                }
                base.saturating_add(OsRng.gen_range(0..spread))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_no_padding() {
        assert_eq!(RelayPadding::None.padded_size(5), 5);
        assert_eq!(RelayPadding::None.bounds(5), (5, 5));
    }

    #[test]
    fn test_discovery_padding_range() {
        for size in 1..20 {
            let (min, max) = RelayPadding::DISCOVERY.bounds(size);
            assert_eq!(min, 4 * size);
            assert_eq!(max, 6 * size - 1);

            for _ in 0..50 {
                let padded = RelayPadding::DISCOVERY.padded_size(size);
                assert!(padded >= min && padded <= max);
            }
        }
    }

    #[test]
    fn test_collection_padding_range() {
        for _ in 0..100 {
            let padded = RelayPadding::COLLECTION.padded_size(5);
            assert!((10..15).contains(&padded));
        }
    }

    #[test]
    fn test_padding_is_randomized() {
        let seen: HashSet<usize> = (0..200)
            .map(|_| RelayPadding::DISCOVERY.padded_size(5))
            .collect();
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let padding = RelayPadding::Scaled {
            multiplier: 3,
            jitter: 0,
        };
        assert_eq!(padding.padded_size(4), 12);
    }

    #[test]
    fn test_closure_policy() {
        let policy = |size: usize| size + 1;
        assert_eq!(policy.padded_size(5), 6);
    }

    #[test]
    fn test_validate() {
        assert!(RelayPadding::DISCOVERY.validate().is_ok());
        assert!(RelayPadding::None.validate().is_ok());
        assert!(RelayPadding::Scaled {
            multiplier: 0,
            jitter: 3
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&RelayPadding::DISCOVERY).unwrap();
        let restored: RelayPadding = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, RelayPadding::DISCOVERY);
    }
}
