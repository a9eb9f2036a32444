pub mod client;
pub mod error;
pub mod reference;
pub mod tags;

pub use client::RegistryClient;
pub use error::RegistryError;
pub use reference::{DOCKER_HUB_REGISTRY, ImageReference, is_digest_reference, split_name_tag};
pub use tags::{is_pinned_version, sort_tags};
