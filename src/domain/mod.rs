use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod snapshot;

pub use snapshot::{ContainerConfig, ContainerSnapshot, CreateContainerBody, EndpointSettings};

/// A container as reported by the daemon's list endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub image_id: String,
    pub state: String,
    pub status: String,
}

impl ContainerSummary {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// A locally stored image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocalImage {
    pub id: String,
    pub repo_tags: Vec<String>,
    pub repo_digests: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DaemonInfo {
    pub name: String,
    pub server_version: String,
    pub operating_system: String,
    pub containers: u64,
    pub containers_running: u64,
    pub images: u64,
}

/// Result of one update check, also the value stored in the update cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateCheck {
    pub has_update: bool,
    pub checked_at: DateTime<Utc>,
    pub remote_digest: Option<String>,
    pub local_digest: Option<String>,
    pub local_image_id: String,
    pub latest_digest: Option<String>,
    pub is_pinned_version: bool,
    pub error: Option<String>,
}

impl UpdateCheck {
    /// A check that found nothing to compare (empty or digest-only image).
    #[must_use]
    pub fn nothing_to_compare(local_image_id: &str) -> Self {
        UpdateCheck {
            has_update: false,
            checked_at: Utc::now(),
            remote_digest: None,
            local_digest: None,
            local_image_id: local_image_id.to_string(),
            latest_digest: None,
            is_pinned_version: false,
            error: None,
        }
    }
}

/// Detection result for a single container.
#[derive(Clone, Debug, Serialize)]
pub struct ContainerCheck {
    pub container: ContainerSummary,
    pub check: UpdateCheck,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStatus {
    InProgress,
    Success,
    Failed,
}

/// One recreation attempt in the update journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateLogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub container_name: String,
    pub old_image: String,
    pub old_image_id: String,
    pub new_image: String,
    pub new_image_id: Option<String>,
    pub status: UpdateStatus,
    pub message: String,
}

/// Outcome of recreating one container.
#[derive(Clone, Debug, Serialize)]
pub struct RecreateOutcome {
    pub container_name: String,
    pub success: bool,
    pub image_changed: bool,
    pub tag_changed: bool,
    pub self_update: bool,
    pub message: String,
    pub entry: UpdateLogEntry,
}

/// Per-container result of an "update all" run.
#[derive(Debug)]
pub struct BatchItem {
    pub container_name: String,
    pub outcome: Result<RecreateOutcome, String>,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub items: Vec<BatchItem>,
    pub self_update_skipped: bool,
    pub self_update_container_name: Option<String>,
}

impl BatchOutcome {
    #[must_use]
    pub fn failures(&self) -> usize {
        self.items
            .iter()
            .filter(|i| !matches!(&i.outcome, Ok(o) if o.success))
            .count()
    }
}

/// Scheduler settings owned by the settings store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub check_interval_minutes: u64,
    pub auto_update: bool,
    pub last_check: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            check_interval_minutes: 60,
            auto_update: false,
            last_check: None,
        }
    }
}

/// Progress event emitted while an image is being pulled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullProgress {
    pub id: Option<String>,
    pub status: String,
    pub progress: Option<String>,
}
