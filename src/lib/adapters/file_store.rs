use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::domain::commitment::Commitment;
use crate::domain::record::DepositRecord;
use crate::ports::store::{RecordStore, StoreError};

/// `RecordStore` persisted as a JSON array in a single file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous contents intact.
pub struct FileRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<DepositRecord>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, records: &[DepositRecord]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;
        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tokio::fs::write(tmp.path(), bytes).await?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    async fn save(&self, record: DepositRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        if records.iter().any(|r| r.commitment == record.commitment) {
            return Err(StoreError::Duplicate(record.commitment));
        }
        records.push(record);
        self.persist(&records).await
    }

    async fn get(&self, commitment: Commitment) -> Result<DepositRecord, StoreError> {
        let _guard = self.lock.lock().await;
        self.load()
            .await?
            .into_iter()
            .find(|r| r.commitment == commitment)
            .ok_or(StoreError::NotFound(commitment))
    }

    async fn list(&self) -> Result<Vec<DepositRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.sort_by_key(|r| r.deposit_timestamp);
        Ok(records)
    }

    async fn remove(&self, commitment: Commitment) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.commitment != commitment);
        if records.len() == before {
            return Err(StoreError::NotFound(commitment));
        }
        self.persist(&records).await
    }
}
