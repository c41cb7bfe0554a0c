//! Append-only JSON-lines journal.
//!
//! Each `put` appends one line. Reading replays the file top to bottom; a
//! later line with the same id replaces the earlier one. Replay stops at the
//! first line that fails to parse (a torn write at the tail).
//!
//! Opening the file for append trims a torn tail back to the last complete
//! line, and a failed write drops the open handle, so the next `put` reopens
//! and trims before appending.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::{upsert, MessageRecord, MessageStore, StoreError};

pub struct JournalStore {
    path: PathBuf,
    /// Kept open in append mode to avoid repeated open/close per entry.
    file: Mutex<Option<File>>,
}

impl JournalStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        trim_torn_tail(&file, &self.path)?;
        Ok(file)
    }
}

/// Truncate everything after the last newline.
fn trim_torn_tail(file: &File, path: &Path) -> io::Result<()> {
    let data = fs::read(path)?;
    let good_len = data.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    if good_len < data.len() {
        debug!(
            path = %path.display(),
            dropped = data.len() - good_len,
            "journal torn tail trimmed"
        );
        file.set_len(good_len as u64)?;
    }
    Ok(())
}

impl MessageStore for JournalStore {
    fn put(&self, record: MessageRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut guard = self.file.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = match guard.take() {
            Some(f) => f,
            None => self.open_file()?,
        };
        // On failure the handle is dropped; reopening trims the partial line
        file.write_all(&line)?;
        file.flush()?;
        *guard = Some(file);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<MessageRecord>, StoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<MessageRecord>(line) {
                Ok(record) => upsert(&mut records, record),
                Err(e) => {
                    debug!(path = %self.path.display(), error = %e, "journal replay stopped");
                    break;
                }
            }
        }
        Ok(records)
    }
}
