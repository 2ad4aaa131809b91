use alloy_primitives::U256;

use crate::crypto::poseidon::FieldError;

/// Caller-local input errors. Proof generation is never attempted once one of
/// these is raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} = {value} is not representable in the circuit field")]
    OutOfField { field: &'static str, value: U256 },

    #[error("amount {amount} has {remainder} base units below one whole token")]
    PrecisionLoss { amount: U256, remainder: U256 },

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("deposit amount is zero whole units")]
    EmptyDeposit,

    #[error("claimed yield {claimed} does not match accrued yield {expected}")]
    YieldMismatch { claimed: U256, expected: U256 },

    #[error("no whole units of yield have accrued yet")]
    NothingAccrued,

    #[error("current time {current} precedes deposit time {deposit}")]
    TimestampOrder { deposit: u64, current: u64 },

    #[error("credential expired at {expiry} (now {now})")]
    CredentialExpired { expiry: u64, now: u64 },

    #[error("credential country {credential} is not the allowed country {allowed}")]
    CountryMismatch { credential: u16, allowed: u16 },

    #[error("credential is not KYC-approved")]
    NotKyced,

    #[error("issuer commitment does not match the credential")]
    IssuerCommitmentMismatch,

    #[error("commitment does not open to the stored balance and salt")]
    CommitmentMismatch,

    #[error("nullifier was not derived from the claimed commitment")]
    NullifierMismatch,

    #[error("missing circuit input: {0}")]
    MissingInput(String),

    #[error("unexpected circuit input: {0}")]
    UnexpectedInput(String),

    #[error("malformed value for {key}: {value:?}")]
    Malformed { key: String, value: String },

    #[error("input set targets {found}, expected {expected}")]
    CircuitMismatch { expected: String, found: String },

    #[error("field error: {0}")]
    Field(#[from] FieldError),
}

impl ValidationError {
    pub(crate) fn out_of_field(field: &'static str, err: FieldError) -> Self {
        match err {
            FieldError::OutOfField(value) => Self::OutOfField { field, value },
            other => Self::Field(other),
        }
    }
}
