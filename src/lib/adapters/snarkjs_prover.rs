use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use crate::domain::inputs::{CircuitId, InputSet};
use crate::domain::proof::{Groth16Proof, ProofBundle, PublicSignals};
use crate::ports::prover::{ProofService, ProverError};

/// SnarkjsProver generates Groth16 proofs by shelling out to the snarkjs CLI.
///
/// For each request it:
/// 1. Writes the circuit inputs to `input.json` in a fresh temp directory
/// 2. Runs `snarkjs groth16 fullprove` against `<circuit>.wasm` and
///    `<circuit>_final.zkey`
/// 3. Reads back `proof.json` and `public.json`
///
/// The child process is killed if the returned future is dropped, and the
/// temp directory is removed either way.
pub struct SnarkjsProver {
    /// Path to the snarkjs executable
    snarkjs: PathBuf,
    /// Directory holding the compiled circuit artifacts
    artifacts_dir: PathBuf,
}

impl SnarkjsProver {
    pub fn new(snarkjs: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            snarkjs: snarkjs.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    fn artifact(&self, circuit: CircuitId, suffix: &str) -> Result<PathBuf, ProverError> {
        let path = self.artifacts_dir.join(format!("{}{suffix}", circuit.name()));
        if !path.exists() {
            return Err(ProverError::ArtifactNotFound(path.display().to_string()));
        }
        Ok(path)
    }

    async fn run(
        &self,
        args: &[&Path],
        cwd: &Path,
        subcommand: &[&str],
    ) -> Result<Output, ProverError> {
        Command::new(&self.snarkjs)
            .args(subcommand)
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ProverError::BinaryNotFound(self.snarkjs.display().to_string())
                }
                _ => ProverError::IoError(e),
            })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProverError> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProverError::MalformedOutput(format!("{}: {e}", path.display())))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ProverError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| ProverError::MalformedOutput(format!("{}: {e}", path.display())))?;
    std::fs::write(path, bytes)?;
    Ok(())
}

impl ProofService for SnarkjsProver {
    async fn full_prove(&self, inputs: &InputSet) -> Result<ProofBundle, ProverError> {
        let circuit = inputs.circuit();
        let wasm = self.artifact(circuit, ".wasm")?;
        let zkey = self.artifact(circuit, "_final.zkey")?;

        let work = tempfile::tempdir()?;
        let input_path = work.path().join("input.json");
        let proof_path = work.path().join("proof.json");
        let public_path = work.path().join("public.json");
        write_json(&input_path, &inputs.to_signals())?;

        debug!(%circuit, dir = %work.path().display(), "Running snarkjs fullprove");
        let output = self
            .run(
                &[
                    input_path.as_path(),
                    wasm.as_path(),
                    zkey.as_path(),
                    proof_path.as_path(),
                    public_path.as_path(),
                ],
                work.path(),
                &["groth16", "fullprove"],
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(ProverError::ProofGenerationFailure(format!(
                "snarkjs fullprove failed for {circuit}: {stderr}{stdout}"
            )));
        }

        let proof: Groth16Proof = read_json(&proof_path)?;
        let public_signals: PublicSignals = read_json(&public_path)?;
        if public_signals.len() != circuit.public_signal_count() {
            return Err(ProverError::MalformedOutput(format!(
                "{circuit} produced {} public signals, expected {}",
                public_signals.len(),
                circuit.public_signal_count()
            )));
        }

        Ok(ProofBundle {
            proof,
            public_signals,
        })
    }

    async fn verify(
        &self,
        circuit: CircuitId,
        public_signals: &PublicSignals,
        proof: &Groth16Proof,
    ) -> Result<bool, ProverError> {
        let vkey = self.artifact(circuit, "_vkey.json")?;

        let work = tempfile::tempdir()?;
        let proof_path = work.path().join("proof.json");
        let public_path = work.path().join("public.json");
        write_json(&proof_path, proof)?;
        write_json(&public_path, public_signals)?;

        let output = self
            .run(
                &[vkey.as_path(), public_path.as_path(), proof_path.as_path()],
                work.path(),
                &["groth16", "verify"],
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() && stdout.contains("OK") {
            return Ok(true);
        }
        if stdout.contains("Invalid proof") || stderr.contains("Invalid proof") {
            return Ok(false);
        }
        Err(ProverError::VerificationError(format!(
            "snarkjs verify failed for {circuit}: {stderr}{stdout}"
        )))
    }
}
