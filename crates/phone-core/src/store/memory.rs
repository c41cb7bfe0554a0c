use std::sync::RwLock;

use super::{upsert, MessageRecord, MessageStore, StoreError};

/// In-process store; contents are lost when dropped.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<MessageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageStore for MemoryStore {
    fn put(&self, record: MessageRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        upsert(&mut records, record);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<MessageRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.clone())
    }
}
