//! In-place recreation of a container on a new image.
//!
//! The replacement is created under a temporary name before the original is
//! touched, then the two swap names. Any failure after the original has been
//! stopped puts the original back, so a container is never left missing.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::detector::UpdateDetector;
use super::self_guard::SelfGuard;
use crate::docker::DockerError;
use crate::domain::{
    BatchItem, BatchOutcome, ContainerSnapshot, PullProgress, RecreateOutcome, UpdateLogEntry,
    UpdateStatus,
};
use crate::ports::{DockerPort, UpdateLogStore};
use crate::registry::{ImageReference, is_digest_reference};

/// Image to recreate with: the current name verbatim, or the same
/// repository on `target_tag`.
#[must_use]
pub fn target_image(current: &str, target_tag: Option<&str>) -> String {
    match target_tag.filter(|t| !t.is_empty()) {
        Some(tag) => ImageReference::parse(current).with_tag(tag).to_image_name(),
        None => current.to_string(),
    }
}

/// Which parts of the cut-over have been applied and must be undone.
#[derive(Default)]
struct CutOver {
    original_renamed: bool,
}

struct Swapped {
    new_image_id: Option<String>,
    note: Option<String>,
}

pub struct Recreator {
    docker: Arc<dyn DockerPort>,
    detector: Arc<UpdateDetector>,
    guard: Arc<SelfGuard>,
    log: Arc<dyn UpdateLogStore>,
    concurrency: usize,
}

impl Recreator {
    pub fn new(
        docker: Arc<dyn DockerPort>,
        detector: Arc<UpdateDetector>,
        guard: Arc<SelfGuard>,
        log: Arc<dyn UpdateLogStore>,
    ) -> Self {
        Self {
            docker,
            detector,
            guard,
            log,
            concurrency: 1,
        }
    }

    /// Number of containers "update all" recreates at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Recreate one container, optionally moving it to `target_tag`.
    ///
    /// # Errors
    /// Returns an error only if the container cannot be inspected. Every
    /// later failure is reported through an unsuccessful outcome and a
    /// failed journal entry.
    pub async fn update_container(
        &self,
        container_id: &str,
        target_tag: Option<&str>,
    ) -> Result<RecreateOutcome, DockerError> {
        let snapshot = self.docker.inspect_container(container_id).await?;
        let old_image = snapshot.image_name().to_string();
        let new_image = target_image(&old_image, target_tag);
        let tag_changed =
            ImageReference::parse(&old_image).tag != ImageReference::parse(&new_image).tag;

        let entry_id = self.log.begin(UpdateLogEntry {
            id: 0,
            timestamp: Utc::now(),
            container_name: snapshot.name.clone(),
            old_image: old_image.clone(),
            old_image_id: snapshot.image_id.clone(),
            new_image: new_image.clone(),
            new_image_id: None,
            status: UpdateStatus::InProgress,
            message: format!("Updating {} to {new_image}", snapshot.name),
        });

        let outcome = if self.guard.is_self(&snapshot.id).await {
            self.pull_for_self(&snapshot, &new_image, entry_id, tag_changed)
                .await
        } else {
            match self.swap(&snapshot, &new_image).await {
                Ok(swapped) => {
                    let image_changed = swapped
                        .new_image_id
                        .as_deref()
                        .is_some_and(|id| id != snapshot.image_id);
                    let mut message = if image_changed {
                        format!("Updated {} to {new_image}", snapshot.name)
                    } else {
                        format!("Recreated {}; image unchanged", snapshot.name)
                    };
                    if let Some(note) = swapped.note {
                        message = format!("{message} ({note})");
                    }
                    info!(
                        container = %snapshot.name,
                        image = %new_image,
                        image_changed,
                        "recreated"
                    );
                    self.finish(
                        &snapshot,
                        entry_id,
                        UpdateStatus::Success,
                        message,
                        swapped.new_image_id,
                        image_changed,
                        tag_changed,
                        false,
                    )
                }
                Err(message) => {
                    error!(container = %snapshot.name, "{message}");
                    self.finish(
                        &snapshot,
                        entry_id,
                        UpdateStatus::Failed,
                        message,
                        None,
                        false,
                        tag_changed,
                        false,
                    )
                }
            }
        };

        let cache = self.detector.cache();
        cache.invalidate(&old_image);
        cache.invalidate(&new_image);

        Ok(outcome)
    }

    /// The updater's own container is never stopped: only pull the image
    /// and leave the restart to the operator.
    async fn pull_for_self(
        &self,
        snapshot: &ContainerSnapshot,
        new_image: &str,
        entry_id: u64,
        tag_changed: bool,
    ) -> RecreateOutcome {
        warn!(container = %snapshot.name, "refusing to recreate own container");
        match self
            .docker
            .pull_image(new_image, Some(progress_logger(new_image)))
            .await
        {
            Ok(()) => {
                let message = format!(
                    "Pulled {new_image}. {} runs this updater; \
                     restart it manually to apply the update",
                    snapshot.name
                );
                self.finish(
                    snapshot,
                    entry_id,
                    UpdateStatus::Success,
                    message,
                    None,
                    false,
                    tag_changed,
                    true,
                )
            }
            Err(e) => self.finish(
                snapshot,
                entry_id,
                UpdateStatus::Failed,
                format!("Pull failed: {e}"),
                None,
                false,
                tag_changed,
                true,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        snapshot: &ContainerSnapshot,
        entry_id: u64,
        status: UpdateStatus,
        message: String,
        new_image_id: Option<String>,
        image_changed: bool,
        tag_changed: bool,
        self_update: bool,
    ) -> RecreateOutcome {
        let entry = self
            .log
            .complete(entry_id, status, &message, new_image_id)
            .unwrap_or_else(|| UpdateLogEntry {
                id: entry_id,
                timestamp: Utc::now(),
                container_name: snapshot.name.clone(),
                old_image: snapshot.image_name().to_string(),
                old_image_id: snapshot.image_id.clone(),
                new_image: String::new(),
                new_image_id: None,
                status,
                message: message.clone(),
            });
        RecreateOutcome {
            container_name: snapshot.name.clone(),
            success: status == UpdateStatus::Success,
            image_changed,
            tag_changed,
            self_update,
            message,
            entry,
        }
    }

    async fn swap(
        &self,
        snapshot: &ContainerSnapshot,
        new_image: &str,
    ) -> Result<Swapped, String> {
        self.docker
            .pull_image(new_image, Some(progress_logger(new_image)))
            .await
            .map_err(|e| format!("Pull failed: {e}"))?;

        let stamp = Utc::now().timestamp();
        let temp_name = format!("{}-update-{stamp}", snapshot.name);
        let backup_name = format!("{}-old-{stamp}", snapshot.name);

        let new_id = self
            .docker
            .create_container(&temp_name, &snapshot.to_create_body(new_image))
            .await
            .map_err(|e| format!("Create failed: {e}"))?;
        debug!(container = %snapshot.name, new_id = %new_id, "replacement created");

        let mut state = CutOver::default();
        if let Err(e) = self.cut_over(snapshot, &new_id, &backup_name, &mut state).await {
            let restored = match self.roll_back(snapshot, &new_id, &state).await {
                Ok(()) => "original container restored".to_string(),
                Err(re) => format!(
                    "restoring the original also failed ({re}); it may be left as {backup_name}"
                ),
            };
            return Err(format!("Update failed: {e}; {restored}"));
        }

        let note = match self.docker.remove_container(&snapshot.id, true).await {
            Ok(()) => None,
            Err(e) => {
                warn!(container = %backup_name, error = %e, "could not remove previous container");
                Some(format!("previous container left as {backup_name}"))
            }
        };

        let new_image_id = match self.docker.inspect_container(&new_id).await {
            Ok(new) => Some(new.image_id),
            Err(e) => {
                warn!(container = %snapshot.name, error = %e, "could not inspect replacement");
                None
            }
        };

        Ok(Swapped { new_image_id, note })
    }

    async fn cut_over(
        &self,
        snapshot: &ContainerSnapshot,
        new_id: &str,
        backup_name: &str,
        state: &mut CutOver,
    ) -> Result<(), DockerError> {
        tolerate_not_modified(self.docker.stop_container(&snapshot.id).await)?;
        self.docker
            .rename_container(&snapshot.id, backup_name)
            .await?;
        state.original_renamed = true;
        self.docker.rename_container(new_id, &snapshot.name).await?;
        tolerate_not_modified(self.docker.start_container(new_id).await)
    }

    async fn roll_back(
        &self,
        snapshot: &ContainerSnapshot,
        new_id: &str,
        state: &CutOver,
    ) -> Result<(), DockerError> {
        warn!(container = %snapshot.name, "rolling back to original container");
        self.docker.remove_container(new_id, true).await?;
        if state.original_renamed {
            self.docker
                .rename_container(&snapshot.id, &snapshot.name)
                .await?;
        }
        if snapshot.running {
            tolerate_not_modified(self.docker.start_container(&snapshot.id).await)?;
        }
        Ok(())
    }

    /// Recreate every running container with a detected update, skipping
    /// digest-only images and the updater's own container.
    ///
    /// # Errors
    /// Returns an error only if the running containers cannot be listed.
    pub async fn update_all(&self) -> Result<BatchOutcome, DockerError> {
        let containers = self.docker.list_containers(false).await?;
        let mut outcome = BatchOutcome::default();
        let mut plan = Vec::new();

        for container in containers.into_iter().filter(|c| c.is_running()) {
            if container.image.is_empty() || is_digest_reference(&container.image) {
                debug!(container = %container.name, "skipping digest-only image");
                continue;
            }
            if self.guard.is_self(&container.id).await {
                info!(container = %container.name, "skipping own container");
                outcome.self_update_skipped = true;
                outcome.self_update_container_name = Some(container.name.clone());
                continue;
            }
            let check = self
                .detector
                .check_image(&container.image, &container.image_id)
                .await;
            if !check.has_update {
                continue;
            }
            let target_tag = check.is_pinned_version.then_some("latest");
            plan.push((container, target_tag));
        }

        outcome.items = stream::iter(plan)
            .map(|(container, target_tag)| async move {
                let result = self
                    .update_container(&container.id, target_tag)
                    .await
                    .map_err(|e| e.to_string());
                BatchItem {
                    container_name: container.name,
                    outcome: result,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        Ok(outcome)
    }
}

fn tolerate_not_modified(result: Result<(), DockerError>) -> Result<(), DockerError> {
    match result {
        Err(e) if e.is_not_modified() => Ok(()),
        other => other,
    }
}

/// Channel whose events are logged at debug level until the pull finishes.
fn progress_logger(image: &str) -> UnboundedSender<PullProgress> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PullProgress>();
    let image = image.to_string();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!(
                image = %image,
                layer = ?event.id,
                progress = ?event.progress,
                "{}",
                event.status
            );
        }
    });
    tx
}
