use std::fmt;
use std::str::FromStr;

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::nullifier::Nullifier;
use crate::crypto::poseidon::{commit, ensure_canonical, poseidon3};

/// A deposit commitment: `Poseidon(balanceWhole, salt)`.
///
/// Serialized as a `0x`-prefixed 32-byte big-endian hex string, the same
/// encoding used in ledger events and as a circuit public signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub B256);

impl Commitment {
    /// Compute the commitment binding `balance_whole` to `salt`.
    pub fn deposit(balance_whole: U256, salt: U256) -> Result<Self, ValidationError> {
        ensure_canonical(balance_whole)
            .map_err(|e| ValidationError::out_of_field("balance", e))?;
        ensure_canonical(salt).map_err(|e| ValidationError::out_of_field("salt", e))?;
        Ok(Self(commit(&[balance_whole, salt])?))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }

    /// The commitment as a field element.
    pub fn to_field(&self) -> U256 {
        U256::from_be_bytes(self.0 .0)
    }

    /// Parse a decimal field-element string as emitted in public signals.
    pub fn from_signal(signal: &str) -> Result<Self, ValidationError> {
        let value = U256::from_str_radix(signal, 10).map_err(|_| ValidationError::Malformed {
            key: "commitment".into(),
            value: signal.into(),
        })?;
        ensure_canonical(value).map_err(|e| ValidationError::out_of_field("commitment", e))?;
        Ok(Self(B256::from(value)))
    }

    /// Nullifier for a claim made against this commitment at `claim_timestamp`.
    /// nullifier = Poseidon(commitment, salt, claim_timestamp)
    pub fn nullifier(&self, salt: U256, claim_timestamp: u64) -> Nullifier {
        let hash = poseidon3(
            self.0,
            B256::from(salt),
            B256::from(U256::from(claim_timestamp)),
        );
        Nullifier(hash)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Commitment {
    type Err = ValidationError;

    /// Accepts the `0x` hex form only; decimal signals go through
    /// [`Commitment::from_signal`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: B256 = s.parse().map_err(|_| ValidationError::Malformed {
            key: "commitment".into(),
            value: s.into(),
        })?;
        ensure_canonical(U256::from_be_bytes(bytes.0))
            .map_err(|e| ValidationError::out_of_field("commitment", e))?;
        Ok(Self(bytes))
    }
}

impl From<B256> for Commitment {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<Commitment> for B256 {
    fn from(value: Commitment) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_commitment_deterministic() {
        let salt = U256::from(0x1234_5678u64);
        let c1 = Commitment::deposit(U256::from(100u64), salt).unwrap();
        let c2 = Commitment::deposit(U256::from(100u64), salt).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_deposit_commitment_binds_balance_and_salt() {
        let salt = U256::from(7u64);
        let base = Commitment::deposit(U256::from(100u64), salt).unwrap();
        assert_ne!(base, Commitment::deposit(U256::from(101u64), salt).unwrap());
        assert_ne!(
            base,
            Commitment::deposit(U256::from(100u64), U256::from(8u64)).unwrap()
        );
    }

    #[test]
    fn test_hex_and_signal_forms_agree() {
        let c = Commitment::deposit(U256::from(100u64), U256::from(99u64)).unwrap();
        let hex = c.to_string();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
        assert_eq!(hex.parse::<Commitment>().unwrap(), c);

        let decimal = c.to_field().to_string();
        assert_eq!(Commitment::from_signal(&decimal).unwrap(), c);
    }

    #[test]
    fn test_small_commitment_keeps_leading_zeros() {
        let c = Commitment(B256::from(U256::from(1u64)));
        assert_eq!(
            c.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_from_signal_rejects_garbage() {
        assert!(Commitment::from_signal("0xabc").is_err());
        assert!(Commitment::from_signal("-5").is_err());
    }

    #[test]
    fn test_hex_and_signal_forms_reject_same_values() {
        use crate::crypto::poseidon::FIELD_MODULUS;

        let hex = B256::from(FIELD_MODULUS).to_string();
        assert!(matches!(
            hex.parse::<Commitment>(),
            Err(ValidationError::OutOfField { field: "commitment", .. })
        ));
        assert!(Commitment::from_signal(&FIELD_MODULUS.to_string()).is_err());

        let top = FIELD_MODULUS - U256::from(1u64);
        assert_eq!(
            B256::from(top).to_string().parse::<Commitment>().unwrap(),
            Commitment::from_signal(&top.to_string()).unwrap()
        );
    }

    #[test]
    fn test_nullifier_depends_on_claim_time() {
        let salt = U256::from(5u64);
        let c = Commitment::deposit(U256::from(10u64), salt).unwrap();
        assert_eq!(c.nullifier(salt, 1_000), c.nullifier(salt, 1_000));
        assert_ne!(c.nullifier(salt, 1_000), c.nullifier(salt, 1_001));
        assert_ne!(c.nullifier(salt, 1_000), c.nullifier(U256::from(6u64), 1_000));
    }
}
