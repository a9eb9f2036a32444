use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Registry request timed out")]
    Timeout,

    #[error("Registry fetch failed with status {0}")]
    Fetch(StatusCode),

    #[error("Registry response did not include a Docker-Content-Digest header")]
    MissingDigest,

    #[error("Failed to obtain pull token: {0}")]
    Token(String),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RegistryError::Timeout
        } else {
            RegistryError::Network(err)
        }
    }
}

impl RegistryError {
    /// Map a non-success manifest/tag response status onto the error taxonomy.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => RegistryError::Unauthorized,
            StatusCode::NOT_FOUND => RegistryError::NotFound,
            other => RegistryError::Fetch(other),
        }
    }
}
