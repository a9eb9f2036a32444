use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::RegistryError;
use super::reference::ImageReference;
use super::tags::sort_tags;
use crate::ports::RegistryPort;

const HUB_AUTH_URL: &str = "https://auth.docker.io/token";
const HUB_AUTH_SERVICE: &str = "registry.docker.io";

/// Default per-request timeout for registry calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Manifest media types accepted when resolving a digest. Listing the
/// index/list types makes multi-arch images resolve to their index digest.
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.oci.image.manifest.v1+json, \
application/vnd.oci.image.index.v1+json";

const DIGEST_HEADER: &str = "Docker-Content-Digest";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Registry v2 HTTP client.
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    auth_url: String,
    /// Origin every `/v2/` request goes to. `None` means
    /// `https://{registry}` of the image being looked up.
    base_url: Option<String>,
}

impl RegistryClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            client: build_client(timeout)?,
            auth_url: HUB_AUTH_URL.to_string(),
            base_url: None,
        })
    }

    /// A client that sends every request to `base_url` (e.g.
    /// `http://127.0.0.1:5000`) instead of the image's own registry. Hub
    /// pull tokens come from `{base_url}/token`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_base_url(timeout: Duration, base_url: &str) -> Result<Self, RegistryError> {
        let base_url = base_url.trim_end_matches('/');
        Ok(Self {
            client: build_client(timeout)?,
            auth_url: format!("{base_url}/token"),
            base_url: Some(base_url.to_string()),
        })
    }

    fn v2_url(&self, image: &ImageReference, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/v2/{}/{path}", image.repository),
            None => format!("https://{}/v2/{}/{path}", image.registry, image.repository),
        }
    }

    /// Obtain an anonymous pull token. Only Docker Hub needs one; other
    /// registries get an empty token and an unauthenticated request.
    ///
    /// # Errors
    /// Returns an error if the auth endpoint fails or returns no token.
    pub async fn pull_token(&self, image: &ImageReference) -> Result<String, RegistryError> {
        if !image.is_docker_hub() {
            return Ok(String::new());
        }

        let scope = format!("repository:{}:pull", image.repository);
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("service", HUB_AUTH_SERVICE)
            .append_pair("scope", &scope)
            .finish();
        let resp = self
            .client
            .get(format!("{}?{query}", self.auth_url))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(RegistryError::Token(format!("status {}", resp.status())));
        }

        let body: TokenResponse = resp.json().await?;
        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RegistryError::Token("response carried no token".to_string()))
    }

    async fn authorized_get(
        &self,
        image: &ImageReference,
        url: &str,
    ) -> Result<RequestBuilder, RegistryError> {
        let token = self.pull_token(image).await?;
        let mut request = self.client.get(url);
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    async fn fetch_tags(&self, image: &ImageReference) -> Result<Vec<String>, RegistryError> {
        let url = self.v2_url(image, "tags/list");
        let resp = self.authorized_get(image, &url).await?.send().await?;
        if !resp.status().is_success() {
            return Err(RegistryError::from_status(resp.status()));
        }
        let list: TagList = resp.json().await?;
        Ok(list.tags.unwrap_or_default())
    }
}

fn build_client(timeout: Duration) -> Result<Client, RegistryError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("docker-update-mgr/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

#[async_trait]
impl RegistryPort for RegistryClient {
    async fn manifest_digest(&self, image: &ImageReference) -> Result<String, RegistryError> {
        let url = self.v2_url(image, &format!("manifests/{}", image.tag));
        debug!(%image, "fetching manifest digest");

        let resp = self
            .authorized_get(image, &url)
            .await?
            .header(header::ACCEPT, MANIFEST_ACCEPT)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(RegistryError::from_status(resp.status()));
        }

        resp.headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(RegistryError::MissingDigest)
    }

    async fn list_tags(&self, image: &ImageReference) -> Vec<String> {
        match self.fetch_tags(image).await {
            Ok(tags) => sort_tags(tags),
            Err(e) => {
                warn!(%image, error = %e, "tag listing failed");
                Vec::new()
            }
        }
    }
}
