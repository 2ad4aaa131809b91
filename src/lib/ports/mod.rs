pub mod ledger;
pub mod prover;
pub mod store;

use alloy::primitives::B256;

/// Minimal transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub success: bool,
}
