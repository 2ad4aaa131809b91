use alloy_primitives::{Bytes, U256};
use alloy::sol_types::SolValue;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::ValidationError;

/// Ordered public signals of a proof, as field elements.
///
/// On the wire (snarkjs `public.json`, verifier calldata) each signal is a
/// decimal string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicSignals(pub Vec<U256>);

impl PublicSignals {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<U256> {
        self.0.get(index).copied()
    }
}

impl Serialize for PublicSignals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|v| v.to_string()))
    }
}

impl<'de> Deserialize<'de> for PublicSignals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| U256::from_str_radix(s, 10).map_err(serde::de::Error::custom))
            .collect::<Result<Vec<_>, _>>()
            .map(PublicSignals)
    }
}

/// Groth16 proof in snarkjs JSON layout (projective coordinates as decimal
/// strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<[String; 2]>,
    pub pi_c: Vec<String>,
    pub protocol: String,
    pub curve: String,
}

/// Proof plus the public signals it was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBundle {
    pub proof: Groth16Proof,
    pub public_signals: PublicSignals,
}

fn coord(values: &[String], index: usize, name: &str) -> Result<U256, ValidationError> {
    let raw = values.get(index).ok_or_else(|| ValidationError::MissingInput(format!("{name}[{index}]")))?;
    U256::from_str_radix(raw, 10).map_err(|_| ValidationError::Malformed {
        key: format!("{name}[{index}]"),
        value: raw.clone(),
    })
}

impl ProofBundle {
    /// ABI-encode as `(uint256[2], uint256[2][2], uint256[2], uint256[])` for the
    /// Solidity verifier.
    ///
    /// The G2 point `pi_b` is written with each coordinate pair reversed, the
    /// order the EVM pairing precompile expects.
    pub fn to_calldata(&self) -> Result<Bytes, ValidationError> {
        let p = &self.proof;
        let a = [coord(&p.pi_a, 0, "pi_a")?, coord(&p.pi_a, 1, "pi_a")?];
        let b0 = p
            .pi_b
            .first()
            .ok_or_else(|| ValidationError::MissingInput("pi_b[0]".into()))?;
        let b1 = p
            .pi_b
            .get(1)
            .ok_or_else(|| ValidationError::MissingInput("pi_b[1]".into()))?;
        let b = [
            [coord(b0, 1, "pi_b[0]")?, coord(b0, 0, "pi_b[0]")?],
            [coord(b1, 1, "pi_b[1]")?, coord(b1, 0, "pi_b[1]")?],
        ];
        let c = [coord(&p.pi_c, 0, "pi_c")?, coord(&p.pi_c, 1, "pi_c")?];
        let signals = self.public_signals.0.clone();
        Ok((a, b, c, signals).abi_encode_params().into())
    }
}
