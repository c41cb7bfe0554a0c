//! Completed-message records and the key-value store contract they are written to.

mod journal;
mod memory;


use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use journal::JournalStore;
pub use memory::MemoryStore;

/// Current time as Unix epoch seconds.
pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Text a session completed, as persisted by a [`MessageStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub created_at: u64,
}

impl MessageRecord {
    pub fn new(session_id: &str, content: &str) -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let created_at = now_epoch();
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{session_id}:{created_at}:{seq}"),
            session_id: session_id.to_string(),
            content: content.to_string(),
            created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Minimal key-value contract for completed messages.
///
/// `put` upserts by `record.id`; `get_all` returns records in first-insertion order.
pub trait MessageStore: Send + Sync {
    fn put(&self, record: MessageRecord) -> Result<(), StoreError>;
    fn get_all(&self) -> Result<Vec<MessageRecord>, StoreError>;
}

/// Upsert `record` into `records`, keeping the position of an existing id.
pub(crate) fn upsert(records: &mut Vec<MessageRecord>, record: MessageRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}
