//! Wire shapes of the Docker Engine API responses we consume, and their
//! mapping onto domain types.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::{
    ContainerConfig, ContainerSnapshot, ContainerSummary, DaemonInfo, EndpointSettings, LocalImage,
    PullProgress,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerListItem {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(rename = "ImageID", default)]
    pub image_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: String,
}

impl From<ContainerListItem> for ContainerSummary {
    fn from(item: ContainerListItem) -> Self {
        let name = item
            .names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_else(|| item.id.chars().take(12).collect());
        ContainerSummary {
            id: item.id,
            name,
            image: item.image,
            image_id: item.image_id,
            state: item.state,
            status: item.status,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ImageListItem {
    pub id: String,
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(default)]
    pub repo_digests: Option<Vec<String>>,
}

impl From<ImageListItem> for LocalImage {
    fn from(item: ImageListItem) -> Self {
        LocalImage {
            id: item.id,
            repo_tags: item.repo_tags.unwrap_or_default(),
            repo_digests: item.repo_digests.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InfoResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server_version: String,
    #[serde(default)]
    pub operating_system: String,
    #[serde(default)]
    pub containers: u64,
    #[serde(default)]
    pub containers_running: u64,
    #[serde(default)]
    pub images: u64,
}

impl From<InfoResponse> for DaemonInfo {
    fn from(info: InfoResponse) -> Self {
        DaemonInfo {
            name: info.name,
            server_version: info.server_version,
            operating_system: info.operating_system,
            containers: info.containers,
            containers_running: info.containers_running,
            images: info.images,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerState {
    #[serde(default)]
    pub running: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NetworkSettings {
    #[serde(default)]
    pub networks: Option<HashMap<String, EndpointSettings>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InspectResponse {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub state: Option<ContainerState>,
    #[serde(default)]
    pub config: Option<ContainerConfig>,
    #[serde(default)]
    pub host_config: Option<Value>,
    #[serde(default)]
    pub network_settings: Option<NetworkSettings>,
}

impl From<InspectResponse> for ContainerSnapshot {
    fn from(resp: InspectResponse) -> Self {
        ContainerSnapshot {
            name: resp.name.trim_start_matches('/').to_string(),
            id: resp.id,
            image_id: resp.image,
            running: resp.state.is_some_and(|s| s.running),
            config: resp.config.unwrap_or_default(),
            host_config: resp.host_config.unwrap_or(Value::Object(Default::default())),
            endpoints: resp
                .network_settings
                .and_then(|n| n.networks)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateResponse {
    pub id: String,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

/// One line of the JSON stream returned by `POST /images/create`.
#[derive(Debug, Deserialize)]
pub(crate) struct PullMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PullMessage {
    pub fn into_progress(self) -> PullProgress {
        PullProgress {
            id: self.id,
            status: self.status.unwrap_or_default(),
            progress: self.progress,
        }
    }
}
