use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::UpdateCache;
use crate::domain::{ContainerCheck, ContainerSummary, LocalImage, UpdateCheck};
use crate::ports::{DockerPort, RegistryPort};
use crate::registry::{ImageReference, is_digest_reference, is_pinned_version};

/// Decides whether a newer image exists for a container's image.
pub struct UpdateDetector {
    docker: Arc<dyn DockerPort>,
    registry: Arc<dyn RegistryPort>,
    cache: Arc<UpdateCache>,
}

impl UpdateDetector {
    pub fn new(
        docker: Arc<dyn DockerPort>,
        registry: Arc<dyn RegistryPort>,
        cache: Arc<UpdateCache>,
    ) -> Self {
        Self {
            docker,
            registry,
            cache,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<UpdateCache> {
        &self.cache
    }

    /// Check one image. Never fails: registry problems end up in `error`.
    pub async fn check_image(&self, image_name: &str, local_image_id: &str) -> UpdateCheck {
        if image_name.is_empty() || is_digest_reference(image_name) {
            return UpdateCheck::nothing_to_compare(local_image_id);
        }

        if let Some(hit) = self
            .cache
            .get_fresh(image_name, local_image_id, Utc::now())
        {
            debug!(image = image_name, "update cache hit");
            return hit;
        }

        let reference = ImageReference::parse(image_name);
        let is_pinned = is_pinned_version(&reference.tag);

        let remote_digest = match self.registry.manifest_digest(&reference).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!(image = image_name, error = %e, "update check failed");
                return UpdateCheck {
                    is_pinned_version: is_pinned,
                    error: Some(e.to_string()),
                    ..UpdateCheck::nothing_to_compare(local_image_id)
                };
            }
        };

        let local_digest = match self.docker.list_images().await {
            Ok(images) => find_local_digest(&images, image_name, local_image_id, &reference),
            Err(e) => {
                warn!(image = image_name, error = %e, "could not list local images");
                None
            }
        };

        let mut has_update = local_digest
            .as_deref()
            .is_some_and(|local| local != remote_digest);

        let mut latest_digest = None;
        if !has_update && is_pinned && reference.is_docker_hub() {
            match self.registry.manifest_digest(&reference.with_tag("latest")).await {
                Ok(latest) => {
                    if latest != remote_digest {
                        has_update = true;
                    }
                    latest_digest = Some(latest);
                }
                Err(e) => debug!(image = image_name, error = %e, "latest digest unavailable"),
            }
        }

        let check = UpdateCheck {
            has_update,
            checked_at: Utc::now(),
            remote_digest: Some(remote_digest),
            local_digest,
            local_image_id: local_image_id.to_string(),
            latest_digest,
            is_pinned_version: is_pinned,
            error: None,
        };
        self.cache.insert(image_name, check.clone());
        check
    }

    pub async fn check_container(&self, container: &ContainerSummary) -> ContainerCheck {
        ContainerCheck {
            container: container.clone(),
            check: self
                .check_image(&container.image, &container.image_id)
                .await,
        }
    }

    /// Check every container concurrently; results keep the input order.
    pub async fn check_containers(&self, containers: &[ContainerSummary]) -> Vec<ContainerCheck> {
        join_all(containers.iter().map(|c| self.check_container(c))).await
    }
}

/// Locate the local copy of `image_name` and return the registry digest it
/// was pulled with.
fn find_local_digest(
    images: &[LocalImage],
    image_name: &str,
    local_image_id: &str,
    reference: &ImageReference,
) -> Option<String> {
    let implicit_latest = format!("{image_name}:latest");
    let bare_local_id = local_image_id.trim_start_matches("sha256:");

    let image = images.iter().find(|img| {
        img.repo_tags
            .iter()
            .any(|t| t == image_name || *t == implicit_latest)
            || img.id == local_image_id
            || img.id.trim_start_matches("sha256:") == bare_local_id
    })?;

    let repository = crate::registry::split_name_tag(image_name).0;
    let matching = image.repo_digests.iter().find(|d| {
        d.split_once('@').is_some_and(|(repo, _)| {
            repo == repository || ImageReference::parse(repo).repository == reference.repository
        })
    });

    matching
        .or_else(|| image.repo_digests.first())
        .and_then(|d| d.split_once('@'))
        .map(|(_, digest)| digest.to_string())
}
