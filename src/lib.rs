pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::github::{GitHubRepository, RepoRef};
pub use crate::app::pipelines::ApplicationPipeline;
pub use crate::config::{LocalStorage, TomlConfig};
pub use crate::core::etl::EtlEngine;
pub use crate::utils::error::{EtlError, Result};
