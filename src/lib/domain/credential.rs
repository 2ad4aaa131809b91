use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use crate::crypto::poseidon::{commit, poseidon2};

/// KYC attributes bound to a holder secret and an issuer salt.
///
/// Never leaves the holder: only [`IssuerCommitment`] is disclosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(rename = "isKYCed", with = "flag")]
    pub is_kyced: bool,
    /// ISO 3166-1 numeric
    pub country_code: u16,
    #[serde(with = "flag")]
    pub is_accredited: bool,
    /// Unix timestamp after which the credential is unusable
    pub expiry: u64,
    #[serde(with = "super::decimal")]
    pub user_secret: U256,
    #[serde(with = "super::decimal")]
    pub credential_salt: U256,
}

impl Credential {
    /// credentialHash = Poseidon(isKYCed, countryCode, isAccredited, expiry, userSecret, salt)
    pub fn credential_hash(&self) -> Result<B256, ValidationError> {
        Ok(commit(&[
            U256::from(self.is_kyced as u8),
            U256::from(self.country_code),
            U256::from(self.is_accredited as u8),
            U256::from(self.expiry),
            self.user_secret,
            self.credential_salt,
        ])?)
    }

    /// issuerCommitment = Poseidon(credentialHash, salt)
    pub fn issuer_commitment(&self) -> Result<IssuerCommitment, ValidationError> {
        let credential_hash = self.credential_hash()?;
        Ok(IssuerCommitment(poseidon2(
            credential_hash,
            B256::from(self.credential_salt),
        )))
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry <= now
    }
}

/// The public anchor a verifier checks a KYC proof against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuerCommitment(pub B256);

impl IssuerCommitment {
    pub fn to_field(&self) -> U256 {
        U256::from_be_bytes(self.0 .0)
    }
}

/// A credential together with the commitment the issuer vouches for.
///
/// On disk: `{"credential": {..}, "signature": {"issuerCommitment": "<decimal>"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCredential {
    pub credential: Credential,
    #[serde(rename = "signature", with = "signature")]
    pub issuer_commitment: IssuerCommitment,
}

/// Circuit flags travel as the integers 0 and 1.
mod flag {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(de::Error::custom(format!("flag must be 0 or 1, got {other}"))),
        }
    }
}

mod signature {
    use alloy_primitives::{B256, U256};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::IssuerCommitment;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Signature {
        #[serde(with = "crate::domain::decimal")]
        issuer_commitment: U256,
    }

    pub fn serialize<S: Serializer>(
        value: &IssuerCommitment,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        Signature {
            issuer_commitment: value.to_field(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IssuerCommitment, D::Error> {
        let sig = Signature::deserialize(deserializer)?;
        Ok(IssuerCommitment(B256::from(sig.issuer_commitment)))
    }
}

/// Holder secret derived from the wallet address, read as a 160-bit integer.
pub fn generate_user_secret(holder: Address) -> U256 {
    U256::from_be_slice(holder.as_slice())
}
