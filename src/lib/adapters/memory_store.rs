use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::commitment::Commitment;
use crate::domain::record::DepositRecord;
use crate::ports::store::{RecordStore, StoreError};

/// In-memory implementation of `RecordStore` for tests and the demo.
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<Commitment, DepositRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    async fn save(&self, record: DepositRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.commitment) {
            return Err(StoreError::Duplicate(record.commitment));
        }
        records.insert(record.commitment, record);
        Ok(())
    }

    async fn get(&self, commitment: Commitment) -> Result<DepositRecord, StoreError> {
        self.records
            .lock()
            .await
            .get(&commitment)
            .cloned()
            .ok_or(StoreError::NotFound(commitment))
    }

    async fn list(&self) -> Result<Vec<DepositRecord>, StoreError> {
        let mut all: Vec<_> = self.records.lock().await.values().cloned().collect();
        all.sort_by_key(|r| r.deposit_timestamp);
        Ok(all)
    }

    async fn remove(&self, commitment: Commitment) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .remove(&commitment)
            .ok_or(StoreError::NotFound(commitment))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn record(salt: u64, ts: u64) -> DepositRecord {
        DepositRecord::new(U256::from(100u64), U256::from(salt), ts).unwrap()
    }

    #[tokio::test]
    async fn save_and_get() {
        let store = InMemoryRecordStore::new();
        let r = record(1, 10);
        store.save(r.clone()).await.unwrap();
        assert_eq!(store.get(r.commitment).await.unwrap(), r);
    }

    #[tokio::test]
    async fn duplicate_rejected() {
        let store = InMemoryRecordStore::new();
        let r = record(1, 10);
        store.save(r.clone()).await.unwrap();
        assert!(matches!(
            store.save(r).await.unwrap_err(),
            StoreError::Duplicate(_)
        ));
    }

    #[tokio::test]
    async fn list_ordered_by_deposit_time() {
        let store = InMemoryRecordStore::new();
        store.save(record(2, 20)).await.unwrap();
        store.save(record(1, 10)).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].deposit_timestamp, 10);
        assert_eq!(listed[1].deposit_timestamp, 20);
    }

    #[tokio::test]
    async fn remove_unknown_fails() {
        let store = InMemoryRecordStore::new();
        let r = record(1, 10);
        assert!(matches!(
            store.remove(r.commitment).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
