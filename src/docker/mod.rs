pub mod client;
pub mod error;
pub mod logs;
pub(crate) mod models;

pub use client::{DEFAULT_SOCKET_PATH, DockerEngine};
pub use error::DockerError;
pub use logs::{LogLine, LogStream, demux, plain_lines};
