#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use docker_update_mgr::app::self_guard::SelfGuard;
use docker_update_mgr::domain::{ContainerConfig, ContainerSnapshot, ContainerSummary, LocalImage};
use docker_update_mgr::ports::DockerPort;

pub const NO_CGROUP: &str = "/nonexistent/docker-update-mgr/cgroup";

pub fn summary(id: &str, name: &str, image: &str, image_id: &str) -> ContainerSummary {
    ContainerSummary {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        image_id: image_id.to_string(),
        state: "running".to_string(),
        status: "Up 2 hours".to_string(),
    }
}

pub fn snapshot(id: &str, name: &str, image: &str, image_id: &str) -> ContainerSnapshot {
    ContainerSnapshot {
        id: id.to_string(),
        name: name.to_string(),
        image_id: image_id.to_string(),
        running: true,
        config: ContainerConfig {
            image: Some(image.to_string()),
            env: Some(vec!["TZ=UTC".to_string()]),
            ..ContainerConfig::default()
        },
        host_config: serde_json::json!({ "RestartPolicy": { "Name": "unless-stopped" } }),
        endpoints: HashMap::new(),
    }
}

pub fn local_image(id: &str, tag: &str, digest: &str) -> LocalImage {
    let repository = tag.rsplit_once(':').map_or(tag, |(repo, _)| repo);
    LocalImage {
        id: id.to_string(),
        repo_tags: vec![tag.to_string()],
        repo_digests: vec![format!("{repository}@{digest}")],
    }
}

/// A guard that never recognizes any container as its own.
pub fn outside_guard(docker: Arc<dyn DockerPort>) -> Arc<SelfGuard> {
    Arc::new(SelfGuard::with_hostname(docker, NO_CGROUP, None))
}

/// Ordered record of the daemon calls a mock received.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
