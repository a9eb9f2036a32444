use thiserror::Error;

use crate::docker::DockerError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum DockerUpdateMgrError {
    #[error("Docker daemon error: {0}")]
    Docker(#[from] DockerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
