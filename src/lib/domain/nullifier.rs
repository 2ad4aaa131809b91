use std::fmt;

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

/// A nullifier marks one yield claim as spent.
/// nullifier = Poseidon(commitment, salt, claim_timestamp)
///
/// The ledger only checks that a nullifier is fresh; tying it to the claimed
/// commitment is the yield circuit's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nullifier(pub B256);

impl Nullifier {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }

    pub fn to_field(&self) -> U256 {
        U256::from_be_bytes(self.0 .0)
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<B256> for Nullifier {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<Nullifier> for B256 {
    fn from(value: Nullifier) -> Self {
        value.0
    }
}
