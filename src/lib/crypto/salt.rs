use alloy_primitives::U256;
use rand::Rng;

/// Draw a uniformly random 253-bit salt.
///
/// The top 3 bits are cleared so the value is always below the BN254 modulus
/// and enters the circuit unreduced.
pub fn random_salt() -> U256 {
    random_salt_with(&mut rand::thread_rng())
}

/// Same as [`random_salt`] with a caller-supplied RNG.
pub fn random_salt_with<R: Rng + ?Sized>(rng: &mut R) -> U256 {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    bytes[0] &= 0x1F;
    U256::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::crypto::poseidon::is_canonical;

    #[test]
    fn test_salt_is_canonical() {
        for _ in 0..256 {
            assert!(is_canonical(random_salt()));
        }
    }

    #[test]
    fn test_salt_no_collisions_over_samples() {
        let samples: HashSet<U256> = (0..1000).map(|_| random_salt()).collect();
        assert_eq!(samples.len(), 1000);
    }

    #[test]
    fn test_seeded_rng_reproducible() {
        let a = random_salt_with(&mut StdRng::seed_from_u64(7));
        let b = random_salt_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
