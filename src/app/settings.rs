use std::sync::{Mutex, PoisonError};

use crate::domain::Settings;
use crate::ports::SettingsStore;

/// Settings held for the lifetime of the process.
#[derive(Default)]
pub struct InMemorySettings {
    inner: Mutex<Settings>,
}

impl InMemorySettings {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

impl SettingsStore for InMemorySettings {
    fn get(&self) -> Settings {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, settings: Settings) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = settings;
    }
}
