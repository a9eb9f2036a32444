use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::UpdateCheck;

/// Default time an update check stays valid, in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Best-effort TTL cache of update checks keyed by raw image name.
///
/// An entry is only served while it is younger than the TTL *and* was
/// recorded against the same local image ID; a changed ID means the image
/// was pulled or rolled back since the check.
pub struct UpdateCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, UpdateCheck>>,
}

impl UpdateCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get_fresh(
        &self,
        image: &str,
        local_image_id: &str,
        now: DateTime<Utc>,
    ) -> Option<UpdateCheck> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(image)
            .filter(|e| now.signed_duration_since(e.checked_at) < self.ttl)
            .filter(|e| e.local_image_id == local_image_id)
            .cloned()
    }

    /// Last write wins; concurrent passes over the same image may overwrite each other.
    pub fn insert(&self, image: &str, check: UpdateCheck) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(image.to_string(), check);
    }

    pub fn invalidate(&self, image: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(image);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UpdateCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}
