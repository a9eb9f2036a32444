pub mod app;
pub mod args;
pub mod docker;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod registry;
pub mod start;
pub mod utils;

pub use args::Args;
pub use errors::DockerUpdateMgrError;
pub use start::run_app;
