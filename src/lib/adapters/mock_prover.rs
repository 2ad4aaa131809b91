use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{keccak256, U256};

use crate::crypto::poseidon::FIELD_MODULUS;
use crate::domain::inputs::{CircuitId, InputSet};
use crate::domain::proof::{Groth16Proof, ProofBundle, PublicSignals};
use crate::ports::prover::{ProofService, ProverError};

/// In-process stand-in for the proving system.
///
/// Proving re-checks every circuit relation on the witness and fails the way
/// the real prover does when one is unsatisfied. The "proof" is a keyed digest
/// of the circuit and its public signals, so `verify` rejects proofs whose
/// signals were altered.
#[derive(Default)]
pub struct MockProver {
    delay: Option<Duration>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockProver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `full_prove` call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make subsequent `full_prove` calls fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `full_prove` calls received.
    pub fn prove_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn digest(circuit: CircuitId, signals: &PublicSignals, slot: u8) -> String {
        let mut preimage = Vec::with_capacity(1 + 32 * (signals.len() + 1));
        preimage.push(slot);
        preimage.extend_from_slice(circuit.name().as_bytes());
        for s in &signals.0 {
            preimage.extend_from_slice(&s.to_be_bytes::<32>());
        }
        let word = U256::from_be_bytes(keccak256(&preimage).0);
        (word % FIELD_MODULUS).to_string()
    }

    fn proof_for(circuit: CircuitId, signals: &PublicSignals) -> Groth16Proof {
        let d = |slot| Self::digest(circuit, signals, slot);
        Groth16Proof {
            pi_a: vec![d(0), d(1), "1".into()],
            pi_b: vec![[d(2), d(3)], [d(4), d(5)], ["1".into(), "0".into()]],
            pi_c: vec![d(6), d(7), "1".into()],
            protocol: "groth16".into(),
            curve: "bn128".into(),
        }
    }
}

impl ProofService for MockProver {
    async fn full_prove(&self, inputs: &InputSet) -> Result<ProofBundle, ProverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProverError::ProofGenerationFailure("mock prover set to fail".into()));
        }

        let circuit = inputs.circuit();
        // Witness generation: every constraint must hold.
        InputSet::from_signals(circuit, &inputs.to_signals()).map_err(|e| {
            ProverError::ProofGenerationFailure(format!("{circuit}: unsatisfied constraint: {e}"))
        })?;

        let public_signals = inputs.public_signals();
        Ok(ProofBundle {
            proof: Self::proof_for(circuit, &public_signals),
            public_signals,
        })
    }

    async fn verify(
        &self,
        circuit: CircuitId,
        public_signals: &PublicSignals,
        proof: &Groth16Proof,
    ) -> Result<bool, ProverError> {
        if public_signals.len() != circuit.public_signal_count() {
            return Ok(false);
        }
        Ok(*proof == Self::proof_for(circuit, public_signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inputs::{DepositInputs, YieldInputs};
    use crate::domain::record::DepositRecord;
    use crate::domain::yield_rule::SECONDS_PER_YEAR;

    const T0: u64 = 1_700_000_000;

    fn deposit() -> InputSet {
        InputSet::Deposit(DepositInputs::new(U256::from(100u64), U256::from(42u64)).unwrap())
    }

    #[tokio::test]
    async fn proof_verifies_against_own_signals() {
        let prover = MockProver::new();
        let bundle = prover.full_prove(&deposit()).await.unwrap();
        assert!(prover
            .verify(CircuitId::DepositCommitment, &bundle.public_signals, &bundle.proof)
            .await
            .unwrap());
        assert_eq!(prover.prove_calls(), 1);
    }

    #[tokio::test]
    async fn tampered_signals_fail_verification() {
        let prover = MockProver::new();
        let rec = DepositRecord::new(U256::from(100u64), U256::from(7u64), T0).unwrap();
        let claim = rec.claim(T0 + SECONDS_PER_YEAR, 500).unwrap();
        let set = InputSet::Yield(YieldInputs::new(&rec, &claim, 500).unwrap());
        let bundle = prover.full_prove(&set).await.unwrap();

        let mut inflated = bundle.public_signals.clone();
        inflated.0[5] = U256::from(6u64);
        assert!(!prover
            .verify(CircuitId::YieldClaim, &inflated, &bundle.proof)
            .await
            .unwrap());
        // same signals, wrong circuit
        assert!(!prover
            .verify(CircuitId::DepositCommitment, &bundle.public_signals, &bundle.proof)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unsatisfiable_witness_fails_to_prove() {
        let prover = MockProver::new();
        let mut inputs = DepositInputs::new(U256::from(100u64), U256::from(42u64)).unwrap();
        inputs.amount = U256::from(101u64);
        let err = prover.full_prove(&InputSet::Deposit(inputs)).await.unwrap_err();
        assert!(matches!(err, ProverError::ProofGenerationFailure(_)));
    }

    #[tokio::test]
    async fn failing_mode() {
        let prover = MockProver::new();
        prover.set_failing(true);
        assert!(prover.full_prove(&deposit()).await.is_err());
        prover.set_failing(false);
        assert!(prover.full_prove(&deposit()).await.is_ok());
    }
}
