use std::future::Future;

use crate::domain::inputs::{CircuitId, InputSet};
use crate::domain::proof::{Groth16Proof, ProofBundle, PublicSignals};

/// Port for ZK proof generation and verification.
///
/// Proving is opaque: the service receives a validated [`InputSet`] and either
/// returns a proof or fails without side effects. Dropping the returned future
/// cancels the request.
///
/// Implementations:
/// - `SnarkjsProver` (shells out to `snarkjs groth16 fullprove` / `verify`)
/// - `MockProver` for testing
pub trait ProofService: Send + Sync {
    fn full_prove(
        &self,
        inputs: &InputSet,
    ) -> impl Future<Output = Result<ProofBundle, ProverError>> + Send;

    fn verify(
        &self,
        circuit: CircuitId,
        public_signals: &PublicSignals,
        proof: &Groth16Proof,
    ) -> impl Future<Output = Result<bool, ProverError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    #[error("proof generation failed: {0}")]
    ProofGenerationFailure(String),

    #[error("verification failed to run: {0}")]
    VerificationError(String),

    #[error("circuit artifact missing: {0}")]
    ArtifactNotFound(String),

    #[error("prover binary not found: {0}")]
    BinaryNotFound(String),

    #[error("malformed prover output: {0}")]
    MalformedOutput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
