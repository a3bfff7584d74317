use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::core::errors::StoreResult;
use crate::core::types::HistoryRecord;

/// Persistent record of past translations
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, record: HistoryRecord) -> StoreResult<()>;

    /// All records, most recent first
    async fn list_recent(&self) -> StoreResult<Vec<HistoryRecord>>;
}

/// In-process history, lost on restart
#[derive(Default)]
pub struct MemoryHistory {
    records: RwLock<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn save(&self, record: HistoryRecord) -> StoreResult<()> {
        debug!(
            "Saving history record {} -> {}",
            record.source_language, record.target_language
        );
        self.records.write().push(record);
        Ok(())
    }

    async fn list_recent(&self) -> StoreResult<Vec<HistoryRecord>> {
        // Later insertions win ties on equal timestamps
        let mut records: Vec<HistoryRecord> = self.records.read().iter().rev().cloned().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}
