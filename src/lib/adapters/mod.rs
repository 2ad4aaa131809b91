pub mod ethereum;
pub mod file_store;
pub mod memory_ledger;
pub mod memory_store;
pub mod mock_prover;
pub mod snarkjs_prover;
