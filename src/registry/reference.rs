use serde::Serialize;
use std::fmt;

/// Host of the public Docker Hub registry.
pub const DOCKER_HUB_REGISTRY: &str = "registry-1.docker.io";

const DEFAULT_TAG: &str = "latest";

/// The (registry, repository, tag) triple identifying an image.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    /// Parse an image name such as `nginx`, `ghcr.io/org/app` or
    /// `myregistry.io:5000/app:v1.2.3`. Total over any input.
    #[must_use]
    pub fn parse(image: &str) -> Self {
        let (path, tag) = split_name_tag(image);
        let tag = tag.unwrap_or(DEFAULT_TAG);

        let (registry, repository) = match path.split_once('/') {
            Some((first, rest)) if first.contains('.') || first.contains(':') => (first, rest),
            _ => (DOCKER_HUB_REGISTRY, path),
        };

        let repository = if registry == DOCKER_HUB_REGISTRY && !repository.contains('/') {
            format!("library/{repository}")
        } else {
            repository.to_string()
        };

        ImageReference {
            registry: registry.to_string(),
            repository,
            tag: tag.to_string(),
        }
    }

    #[must_use]
    pub fn is_docker_hub(&self) -> bool {
        self.registry == DOCKER_HUB_REGISTRY
    }

    /// Same registry and repository, different tag.
    #[must_use]
    pub fn with_tag(&self, tag: &str) -> Self {
        ImageReference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: tag.to_string(),
        }
    }

    /// Render the reference the way a user would type it: Hub images drop
    /// the registry host and the implicit `library/` namespace.
    #[must_use]
    pub fn to_image_name(&self) -> String {
        if self.is_docker_hub() {
            let repo = self
                .repository
                .strip_prefix("library/")
                .unwrap_or(&self.repository);
            format!("{repo}:{}", self.tag)
        } else {
            format!("{}/{}:{}", self.registry, self.repository, self.tag)
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Split `name[:tag]` on the last colon, unless that colon belongs to a
/// registry port (i.e. it is followed by a slash).
#[must_use]
pub fn split_name_tag(image: &str) -> (&str, Option<&str>) {
    match image.rfind(':') {
        Some(idx) if !image[idx + 1..].contains('/') => (&image[..idx], Some(&image[idx + 1..])),
        _ => (image, None),
    }
}

/// True for references that pin an image by content rather than by tag,
/// e.g. `sha256:<hex>` image IDs or `repo@sha256:<hex>`.
#[must_use]
pub fn is_digest_reference(image: &str) -> bool {
    image.starts_with("sha256:") || image.contains('@')
}
