use alloy::primitives::{Address, Bytes, U256};
use std::future::Future;

use super::TxReceipt;
use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;

/// A yield payout request, already proven off-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeClaim {
    pub commitment: Commitment,
    pub nullifier: Nullifier,
    /// Base units paid to `recipient`
    pub amount: U256,
    pub recipient: Address,
    /// ABI-encoded Groth16 proof
    pub proof: Bytes,
}

/// State transitions recorded by a ledger, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    DepositCommitted {
        commitment: Commitment,
        amount: U256,
        timestamp: u64,
    },
    YieldClaimed {
        nullifier: Nullifier,
        recipient: Address,
        amount: U256,
        timestamp: u64,
    },
    Paused,
    Unpaused,
    YieldRateUpdated {
        old: u32,
        new: u32,
    },
}

/// Port for the commitment/nullifier ledger.
///
/// Registration and consumption are check-and-set operations: under concurrent
/// duplicates exactly one call succeeds. Registered commitments and used
/// nullifiers never revert.
///
/// Proofs are opaque to the ledger. Implementations backed by a verifier
/// contract check them; the in-memory ledger trusts its caller.
///
/// Implementations:
/// - `InMemoryLedger` (simulation/testing)
/// - `EthereumLedger` (alloy, vault contract)
pub trait Ledger: Send + Sync {
    fn is_commitment_used(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    fn is_nullifier_used(
        &self,
        nullifier: Nullifier,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Register a deposit of `amount` base units under `commitment`.
    fn register_deposit(
        &self,
        amount: U256,
        commitment: Commitment,
        proof: &Bytes,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    /// Mark the claim's nullifier used and pay out. Both happen or neither does.
    fn consume_yield(
        &self,
        claim: &ConsumeClaim,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    /// Current annual yield rate in basis points.
    fn yield_rate(&self) -> impl Future<Output = Result<u32, LedgerError>> + Send;

    fn is_paused(&self) -> impl Future<Output = Result<bool, LedgerError>> + Send;
}

/// Operator controls. While paused every state-changing ledger call fails.
pub trait LedgerAdmin: Send + Sync {
    fn pause(&self) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    fn unpause(&self) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;

    fn set_yield_rate(
        &self,
        rate_bps: u32,
    ) -> impl Future<Output = Result<TxReceipt, LedgerError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("commitment already registered: {0}")]
    AlreadyExists(Commitment),

    #[error("nullifier already used: {0}")]
    AlreadyUsed(Nullifier),

    #[error("commitment not registered: {0}")]
    NotRegistered(Commitment),

    #[error("ledger is paused")]
    Paused,

    #[error("deposit {amount} outside [{min}, {max}]")]
    DepositOutOfRange { amount: U256, min: U256, max: U256 },

    #[error("pool holds {available}, payout needs {requested}")]
    InsufficientPool { requested: U256, available: U256 },

    #[error("yield rate {0} bps exceeds 10000")]
    InvalidRate(u32),

    #[error("caller is not the ledger operator")]
    Unauthorized,

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl LedgerError {
    /// Duplicate registration or consumption. Retrying cannot succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::AlreadyExists(_) | LedgerError::AlreadyUsed(_))
    }

    /// Refusals or failures that may succeed on a later retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Paused
                | LedgerError::InsufficientPool { .. }
                | LedgerError::Rpc(_)
                | LedgerError::TransactionFailed(_)
        )
    }

    /// The submission may still have been applied: the transport failed or the
    /// receipt never arrived.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, LedgerError::Rpc(_) | LedgerError::TransactionFailed(_))
    }
}
