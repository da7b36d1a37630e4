//! Shared types, error model, and configuration for helpsync.
//!
//! This crate is the foundation depended on by all other helpsync crates.
//! It provides:
//! - [`HelpsyncError`] — the unified error type
//! - Domain types ([`ArticleRef`], [`Credentials`], [`RunId`], [`RunReport`])
//! - Configuration ([`AppConfig`], [`RunParams`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CredentialsConfig, PacingConfig, PipelineSettings, RunParams, RunRequest,
    SourceConfig, UploadConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{HelpsyncError, Result};
pub use types::{Article, ArticleRef, Credentials, RunId, RunReport, RunStatus, SourceMode};
