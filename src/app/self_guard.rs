//! Detection of the container this process runs in, so updates never stop
//! or remove it.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::docker::DockerError;
use crate::ports::DockerPort;

/// Default cgroup membership file of the current process.
pub const DEFAULT_CGROUP_PATH: &str = "/proc/self/cgroup";

static CONTAINER_ID_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn container_id_regex() -> Option<&'static Regex> {
    CONTAINER_ID_RE
        .get_or_init(|| Regex::new(r"[0-9a-f]{64}").ok())
        .as_ref()
}

/// Extract a 64-hex container ID from cgroup membership contents.
#[must_use]
pub fn container_id_from_cgroup(contents: &str) -> Option<String> {
    let re = container_id_regex()?;
    contents
        .lines()
        .find_map(|line| re.find(line).map(|m| m.as_str().to_string()))
}

/// Two container IDs refer to the same container when either is a prefix
/// of the other (short 12-char IDs vs full 64-char IDs).
#[must_use]
pub fn ids_match(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.starts_with(b) || b.starts_with(a))
}

pub struct SelfGuard {
    docker: Arc<dyn DockerPort>,
    cgroup_path: PathBuf,
    hostname: Option<String>,
    own_id: OnceCell<Option<String>>,
}

impl SelfGuard {
    pub fn new(docker: Arc<dyn DockerPort>, cgroup_path: impl AsRef<Path>) -> Self {
        let hostname = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned());
        Self::with_hostname(docker, cgroup_path, hostname)
    }

    pub fn with_hostname(
        docker: Arc<dyn DockerPort>,
        cgroup_path: impl AsRef<Path>,
        hostname: Option<String>,
    ) -> Self {
        Self {
            docker,
            cgroup_path: cgroup_path.as_ref().to_path_buf(),
            hostname,
            own_id: OnceCell::new(),
        }
    }

    /// ID of the container this process runs in, if any. Resolved once per
    /// process lifetime; a failed daemon lookup is retried on the next call.
    pub async fn own_container_id(&self) -> Option<String> {
        match self.own_id.get_or_try_init(|| self.resolve_own_id()).await {
            Ok(id) => id.clone(),
            Err(e) => {
                debug!(error = %e, "hostname fallback could not list containers");
                None
            }
        }
    }

    async fn resolve_own_id(&self) -> Result<Option<String>, DockerError> {
        if let Ok(contents) = tokio::fs::read_to_string(&self.cgroup_path).await
            && let Some(id) = container_id_from_cgroup(&contents)
        {
            info!(container = %id, "running inside container (cgroup)");
            return Ok(Some(id));
        }

        // Docker sets the hostname to the short container ID by default.
        let Some(hostname) = self.hostname.as_deref().filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        let id = self
            .docker
            .list_containers(false)
            .await?
            .into_iter()
            .find(|c| c.id.starts_with(hostname))
            .map(|c| c.id);
        if let Some(id) = &id {
            info!(container = %id, "running inside container (hostname)");
        }
        Ok(id)
    }

    /// Whether `container_id` is the container this process runs in.
    pub async fn is_self(&self, container_id: &str) -> bool {
        match self.own_container_id().await {
            Some(own) => ids_match(container_id, &own),
            None => false,
        }
    }
}
