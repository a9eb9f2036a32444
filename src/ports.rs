use async_trait::async_trait;
use mockall::automock;
use tokio::sync::mpsc::UnboundedSender;

use crate::docker::DockerError;
use crate::domain::{
    ContainerSnapshot, ContainerSummary, CreateContainerBody, DaemonInfo, LocalImage, PullProgress,
    Settings, UpdateLogEntry, UpdateStatus,
};
use crate::registry::{ImageReference, RegistryError};

/// Operations consumed from the container daemon.
#[automock]
#[async_trait]
pub trait DockerPort: Send + Sync {
    async fn info(&self) -> Result<DaemonInfo, DockerError>;
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError>;
    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, DockerError>;
    async fn start_container(&self, id: &str) -> Result<(), DockerError>;
    async fn stop_container(&self, id: &str) -> Result<(), DockerError>;
    async fn restart_container(&self, id: &str) -> Result<(), DockerError>;
    async fn remove_container(&self, id: &str, force: bool) -> Result<(), DockerError>;
    /// Returns the new container's ID.
    async fn create_container(
        &self,
        name: &str,
        body: &CreateContainerBody,
    ) -> Result<String, DockerError>;
    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), DockerError>;
    /// Resolves once the pull has completed. Progress events go to `progress` if given.
    async fn pull_image(
        &self,
        image: &str,
        progress: Option<UnboundedSender<PullProgress>>,
    ) -> Result<(), DockerError>;
    /// Raw combined stdout/stderr bytes, multiplexed unless the container has a TTY.
    async fn container_logs(
        &self,
        id: &str,
        tail: Option<u64>,
        since: Option<i64>,
    ) -> Result<Vec<u8>, DockerError>;
    async fn list_images(&self) -> Result<Vec<LocalImage>, DockerError>;
}

/// Operations consumed from an image registry.
#[automock]
#[async_trait]
pub trait RegistryPort: Send + Sync {
    async fn manifest_digest(&self, image: &ImageReference) -> Result<String, RegistryError>;
    /// Advisory only: failures yield an empty list.
    async fn list_tags(&self, image: &ImageReference) -> Vec<String>;
}

/// Append-only journal of recreation attempts, newest first.
pub trait UpdateLogStore: Send + Sync {
    /// Record a new in-progress entry and return its ID. The entry's own
    /// `id`/`status` fields are overwritten.
    fn begin(&self, entry: UpdateLogEntry) -> u64;
    fn complete(
        &self,
        id: u64,
        status: UpdateStatus,
        message: &str,
        new_image_id: Option<String>,
    ) -> Option<UpdateLogEntry>;
    fn list(&self) -> Vec<UpdateLogEntry>;
    fn clear(&self);
}

pub trait SettingsStore: Send + Sync {
    fn get(&self) -> Settings;
    fn set(&self, settings: Settings);
}
