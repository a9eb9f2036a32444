use thiserror::Error;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Failed to connect to docker socket {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Docker API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("No such object: {0}")]
    NotFound(String),

    #[error("Failed to decode daemon response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Image pull failed: {0}")]
    Pull(String),
}

impl DockerError {
    /// The daemon answers 304 when a container is already in the requested state.
    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, DockerError::Api { status: 304, .. })
    }
}

impl From<hyper::Error> for DockerError {
    fn from(err: hyper::Error) -> Self {
        DockerError::Http(err.to_string())
    }
}

impl From<hyper::http::Error> for DockerError {
    fn from(err: hyper::http::Error) -> Self {
        DockerError::Http(err.to_string())
    }
}
