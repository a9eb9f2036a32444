//! Docker Engine API client over the daemon's unix socket.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode, header};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::error::DockerError;
use super::models::{
    ContainerListItem, CreateResponse, ErrorBody, ImageListItem, InfoResponse, InspectResponse,
    PullMessage,
};
use crate::domain::{
    ContainerSnapshot, ContainerSummary, CreateContainerBody, DaemonInfo, LocalImage, PullProgress,
};
use crate::ports::DockerPort;
use crate::registry::split_name_tag;

/// Default location of the daemon socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// API version every request is pinned to. 1.44 accepts multiple networks on create.
const API_VERSION: &str = "/v1.44";

pub struct DockerEngine {
    socket_path: PathBuf,
}

impl DockerEngine {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response<Incoming>, DockerError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| DockerError::Connect {
                path: self.socket_path.display().to_string(),
                source,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("docker connection closed: {e}");
            }
        });

        let builder = Request::builder()
            .method(method)
            .uri(format!("http://localhost{API_VERSION}{path}"))
            .header(header::HOST, "localhost");
        let request = match body {
            Some(bytes) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(bytes)))?,
            None => builder.body(Full::new(Bytes::new()))?,
        };

        Ok(sender.send_request(request).await?)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes, DockerError> {
        let response = self.send(method, path, body).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        check_status(status, &bytes)?;
        Ok(bytes)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DockerError> {
        let bytes = self.request(Method::GET, path, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DockerError> {
        let payload = serde_json::to_vec(body)?;
        let bytes = self.request(Method::POST, path, Some(payload)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_empty(&self, path: &str) -> Result<(), DockerError> {
        self.request(Method::POST, path, None).await?;
        Ok(())
    }
}

fn check_status(status: StatusCode, body: &[u8]) -> Result<(), DockerError> {
    if status.is_success() {
        return Ok(());
    }
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());

    match status {
        StatusCode::NOT_FOUND => Err(DockerError::NotFound(message)),
        other => Err(DockerError::Api {
            status: other.as_u16(),
            message,
        }),
    }
}

fn query(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        serializer.append_pair(k, v);
    }
    serializer.finish()
}

/// Handle one newline-delimited message of the pull stream.
fn handle_pull_line(
    line: &[u8],
    progress: Option<&UnboundedSender<PullProgress>>,
) -> Result<(), DockerError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(());
    }
    let message: PullMessage = serde_json::from_slice(line)?;
    if let Some(error) = message.error {
        return Err(DockerError::Pull(error));
    }
    if let Some(tx) = progress {
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(message.into_progress());
    }
    Ok(())
}

#[async_trait]
impl DockerPort for DockerEngine {
    async fn info(&self) -> Result<DaemonInfo, DockerError> {
        let info: InfoResponse = self.get_json("/info").await?;
        Ok(info.into())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let path = format!("/containers/json?all={all}");
        let items: Vec<ContainerListItem> = self.get_json(&path).await?;
        Ok(items.into_iter().map(ContainerSummary::from).collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, DockerError> {
        let resp: InspectResponse = self.get_json(&format!("/containers/{id}/json")).await?;
        Ok(resp.into())
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.post_empty(&format!("/containers/{id}/start")).await
    }

    async fn stop_container(&self, id: &str) -> Result<(), DockerError> {
        self.post_empty(&format!("/containers/{id}/stop")).await
    }

    async fn restart_container(&self, id: &str) -> Result<(), DockerError> {
        self.post_empty(&format!("/containers/{id}/restart")).await
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), DockerError> {
        self.request(Method::DELETE, &format!("/containers/{id}?force={force}"), None)
            .await?;
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        body: &CreateContainerBody,
    ) -> Result<String, DockerError> {
        let path = format!("/containers/create?{}", query(&[("name", name)]));
        let resp: CreateResponse = self.post_json(&path, body).await?;
        for warning in resp.warnings.unwrap_or_default() {
            warn!(container = name, "create warning: {warning}");
        }
        Ok(resp.id)
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), DockerError> {
        let path = format!("/containers/{id}/rename?{}", query(&[("name", new_name)]));
        self.post_empty(&path).await
    }

    async fn pull_image(
        &self,
        image: &str,
        progress: Option<UnboundedSender<PullProgress>>,
    ) -> Result<(), DockerError> {
        // Without an explicit tag the daemon pulls every tag of the repository.
        let params = if image.contains('@') {
            query(&[("fromImage", image)])
        } else {
            let (name, tag) = split_name_tag(image);
            query(&[("fromImage", name), ("tag", tag.unwrap_or("latest"))])
        };

        let response = self
            .send(Method::POST, &format!("/images/create?{params}"), None)
            .await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.into_body().collect().await?.to_bytes();
            return check_status(status, &bytes);
        }

        let mut body = response.into_body();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(frame) = body.frame().await {
            let frame = frame?;
            if let Some(data) = frame.data_ref() {
                buffer.extend_from_slice(data);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    handle_pull_line(&line, progress.as_ref())?;
                }
            }
        }
        handle_pull_line(&buffer, progress.as_ref())?;
        debug!(image, "pull complete");
        Ok(())
    }

    async fn container_logs(
        &self,
        id: &str,
        tail: Option<u64>,
        since: Option<i64>,
    ) -> Result<Vec<u8>, DockerError> {
        let tail = tail.map_or_else(|| "all".to_string(), |t| t.to_string());
        let since = since.unwrap_or(0).to_string();
        let params = query(&[
            ("stdout", "true"),
            ("stderr", "true"),
            ("tail", &tail),
            ("since", &since),
        ]);
        let bytes = self
            .request(Method::GET, &format!("/containers/{id}/logs?{params}"), None)
            .await?;
        Ok(bytes.to_vec())
    }

    async fn list_images(&self) -> Result<Vec<LocalImage>, DockerError> {
        let items: Vec<ImageListItem> = self.get_json("/images/json").await?;
        Ok(items.into_iter().map(LocalImage::from).collect())
    }
}
