use std::future::Future;

use crate::domain::commitment::Commitment;
use crate::domain::record::DepositRecord;

/// Port for the holder's private deposit records.
///
/// The ledger only ever sees commitments; this store keeps the openings needed
/// to claim yield later.
///
/// Implementations:
/// - `InMemoryRecordStore` (testing)
/// - `FileRecordStore` (JSON file)
pub trait RecordStore: Send + Sync {
    fn save(
        &self,
        record: DepositRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<DepositRecord, StoreError>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<DepositRecord>, StoreError>> + Send;

    fn remove(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already stored for commitment: {0}")]
    Duplicate(Commitment),

    #[error("no record for commitment: {0}")]
    NotFound(Commitment),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
