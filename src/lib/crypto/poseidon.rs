use alloy_primitives::{B256, U256};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};

/// BN254 scalar field modulus. Every value hashed or passed to a circuit must be
/// strictly below it.
pub const FIELD_MODULUS: U256 = U256::from_limbs([
    0x43e1f593f0000001,
    0x2833e84879b97091,
    0xb85045b68181585d,
    0x30644e72e131a029,
]);

/// Widest Poseidon instance the circom parameters ship with.
const MAX_ARITY: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("value {0} is not a canonical BN254 field element")]
    OutOfField(U256),

    #[error("unsupported Poseidon arity: {0}")]
    Arity(usize),
}

/// Whether `value` is already reduced modulo the field prime.
pub fn is_canonical(value: U256) -> bool {
    value < FIELD_MODULUS
}

/// Reject values that would be silently reduced by the field.
pub fn ensure_canonical(value: U256) -> Result<U256, FieldError> {
    if is_canonical(value) {
        Ok(value)
    } else {
        Err(FieldError::OutOfField(value))
    }
}

/// Convert B256 to BN254 field element.
fn b256_to_fr(value: B256) -> Fr {
    Fr::from_be_bytes_mod_order(value.as_ref())
}

/// Convert BN254 field element to B256.
fn fr_to_b256(value: Fr) -> B256 {
    let big_int = value.into_bigint();
    let bytes = big_int.to_bytes_be();
    B256::from_slice(&bytes)
}

fn hash_fields(inputs: &[Fr]) -> B256 {
    let mut hasher =
        Poseidon::<Fr>::new_circom(inputs.len()).expect("Failed to create Poseidon hasher");
    let result = hasher
        .hash(inputs)
        .expect("Failed to compute Poseidon hash");
    fr_to_b256(result)
}

/// Poseidon hash over an ordered tuple of integers, matching circomlib's
/// `Poseidon(n)` template input for input.
///
/// The tuple order is part of the contract with the circuits: `commit([a, b])`
/// and `commit([b, a])` are different commitments.
pub fn commit(values: &[U256]) -> Result<B256, FieldError> {
    if values.is_empty() || values.len() > MAX_ARITY {
        return Err(FieldError::Arity(values.len()));
    }
    let inputs = values
        .iter()
        .map(|v| ensure_canonical(*v).map(|v| b256_to_fr(B256::from(v))))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hash_fields(&inputs))
}

/// Poseidon hash with 2 inputs (deposit commitment, issuer commitment).
pub fn poseidon2(a: B256, b: B256) -> B256 {
    hash_fields(&[b256_to_fr(a), b256_to_fr(b)])
}

/// Poseidon hash with 3 inputs (claim nullifier).
pub fn poseidon3(a: B256, b: B256, c: B256) -> B256 {
    hash_fields(&[b256_to_fr(a), b256_to_fr(b), b256_to_fr(c)])
}

/// Poseidon hash with 6 inputs (credential hash).
pub fn poseidon6(values: [B256; 6]) -> B256 {
    let inputs = values.map(b256_to_fr);
    hash_fields(&inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modulus_matches_arkworks() {
        assert_eq!(FIELD_MODULUS, U256::from_limbs(Fr::MODULUS.0));
    }

    #[test]
    fn test_commit_matches_fixed_arity_helper() {
        let a = U256::from(100u64);
        let b = U256::from(0xdead_beefu64);
        let via_commit = commit(&[a, b]).unwrap();
        let via_helper = poseidon2(B256::from(a), B256::from(b));
        assert_eq!(via_commit, via_helper);
    }

    #[test]
    fn test_commit_deterministic() {
        let values = [U256::from(1u64), U256::from(2u64)];
        assert_eq!(commit(&values).unwrap(), commit(&values).unwrap());
    }

    #[test]
    fn test_commit_order_matters() {
        let a = U256::from(1u64);
        let b = U256::from(2u64);
        assert_ne!(commit(&[a, b]).unwrap(), commit(&[b, a]).unwrap());
    }

    #[test]
    fn test_commit_known_vector() {
        // circomlibjs: poseidon([1, 2])
        let expected: U256 =
            "7853200120776062878684798364095072458815029376092732009249414926327459813530"
                .parse()
                .unwrap();
        let hash = commit(&[U256::from(1u64), U256::from(2u64)]).unwrap();
        assert_eq!(U256::from_be_bytes(hash.0), expected);
    }

    #[test]
    fn test_commit_rejects_out_of_field() {
        let err = commit(&[FIELD_MODULUS, U256::ZERO]).unwrap_err();
        assert_eq!(err, FieldError::OutOfField(FIELD_MODULUS));
        assert!(commit(&[FIELD_MODULUS - U256::from(1u64)]).is_ok());
    }

    #[test]
    fn test_commit_rejects_bad_arity() {
        assert_eq!(commit(&[]).unwrap_err(), FieldError::Arity(0));
        let too_many = vec![U256::from(1u64); MAX_ARITY + 1];
        assert_eq!(commit(&too_many).unwrap_err(), FieldError::Arity(13));
    }

    #[test]
    fn test_poseidon6_input_sensitivity() {
        let vals: [B256; 6] = core::array::from_fn(|i| B256::repeat_byte(i as u8 + 1));
        let mut changed = vals;
        changed[5] = B256::repeat_byte(0x7F);
        assert_ne!(poseidon6(vals), poseidon6(changed));
    }

    #[test]
    fn test_poseidon3_input_sensitivity() {
        let a = B256::repeat_byte(0x01);
        let b = B256::repeat_byte(0x02);
        assert_ne!(
            poseidon3(a, b, B256::repeat_byte(0x03)),
            poseidon3(a, b, B256::repeat_byte(0x04))
        );
    }
}
