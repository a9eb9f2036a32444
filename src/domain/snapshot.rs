//! Recreation-relevant settings captured from a container at update time.
//!
//! Field names follow the Docker Engine API so the same structs serve both
//! the inspect response and the create request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The `Config` block of an inspected container.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domainname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub attach_stdin: bool,
    #[serde(default)]
    pub attach_stdout: bool,
    #[serde(default)]
    pub attach_stderr: bool,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub open_stdin: bool,
    #[serde(default)]
    pub stdin_once: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed_ports: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Value>,
}

/// Per-network endpoint settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointSettings {
    #[serde(rename = "IPAMConfig", default, skip_serializing_if = "Option::is_none")]
    pub ipam_config: Option<Value>,
    #[serde(rename = "Links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(rename = "Aliases", default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(rename = "DriverOpts", default, skip_serializing_if = "Option::is_none")]
    pub driver_opts: Option<HashMap<String, String>>,
    // Assigned by the daemon; never sent back on create.
    #[serde(rename = "NetworkID", default, skip_serializing)]
    pub network_id: Option<String>,
    #[serde(rename = "EndpointID", default, skip_serializing)]
    pub endpoint_id: Option<String>,
    #[serde(rename = "IPAddress", default, skip_serializing)]
    pub ip_address: Option<String>,
    #[serde(rename = "Gateway", default, skip_serializing)]
    pub gateway: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkingConfig {
    pub endpoints_config: HashMap<String, EndpointSettings>,
}

/// Body of `POST /containers/create`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerBody {
    #[serde(flatten)]
    pub config: ContainerConfig,
    pub host_config: Value,
    pub networking_config: NetworkingConfig,
}

/// Everything needed to reproduce a container. Always captured fresh.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerSnapshot {
    pub id: String,
    pub name: String,
    /// ID of the image the container currently runs.
    pub image_id: String,
    pub running: bool,
    pub config: ContainerConfig,
    /// Passed through untouched so no host setting is lost.
    pub host_config: Value,
    pub endpoints: HashMap<String, EndpointSettings>,
}

impl ContainerSnapshot {
    /// Image name the container was created from, falling back to its
    /// image ID when the config carries none.
    #[must_use]
    pub fn image_name(&self) -> &str {
        self.config.image.as_deref().unwrap_or(&self.image_id)
    }

    /// Build a create request reproducing this container on `image`.
    #[must_use]
    pub fn to_create_body(&self, image: &str) -> CreateContainerBody {
        let mut config = self.config.clone();
        config.image = Some(image.to_string());

        // The daemon aliases every container by its short ID; the replacement gets its own.
        let short_id: String = self.id.chars().take(12).collect();
        let endpoints_config = self
            .endpoints
            .iter()
            .map(|(network, endpoint)| {
                let mut endpoint = endpoint.clone();
                if let Some(aliases) = endpoint.aliases.as_mut() {
                    aliases.retain(|a| *a != short_id);
                }
                (network.clone(), endpoint)
            })
            .collect();

        CreateContainerBody {
            config,
            host_config: self.host_config.clone(),
            networking_config: NetworkingConfig { endpoints_config },
        }
    }
}
