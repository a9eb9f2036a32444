use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::domain::{UpdateLogEntry, UpdateStatus};
use crate::ports::UpdateLogStore;

#[derive(Default)]
struct Journal {
    next_id: u64,
    entries: VecDeque<UpdateLogEntry>,
}

/// In-process update journal. Entries live until [`UpdateLogStore::clear`].
#[derive(Default)]
pub struct InMemoryUpdateLog {
    inner: Mutex<Journal>,
}

impl InMemoryUpdateLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpdateLogStore for InMemoryUpdateLog {
    fn begin(&self, mut entry: UpdateLogEntry) -> u64 {
        let mut journal = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        journal.next_id += 1;
        entry.id = journal.next_id;
        entry.status = UpdateStatus::InProgress;
        journal.entries.push_front(entry);
        journal.next_id
    }

    fn complete(
        &self,
        id: u64,
        status: UpdateStatus,
        message: &str,
        new_image_id: Option<String>,
    ) -> Option<UpdateLogEntry> {
        let mut journal = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = journal.entries.iter_mut().find(|e| e.id == id)?;
        entry.status = status;
        entry.message = message.to_string();
        if new_image_id.is_some() {
            entry.new_image_id = new_image_id;
        }
        Some(entry.clone())
    }

    fn list(&self) -> Vec<UpdateLogEntry> {
        let journal = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        journal.entries.iter().cloned().collect()
    }

    fn clear(&self) {
        let mut journal = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        journal.entries.clear();
    }
}
