//! Application configuration for helpsync.
//!
//! User config lives at `~/.helpsync/helpsync.toml`. Request values override
//! config file values, which override hardcoded defaults. Secrets are never
//! stored in the file; the config names the environment variables that hold
//! them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HelpsyncError, Result};
use crate::types::{Credentials, SourceMode};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "helpsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".helpsync";

// ---------------------------------------------------------------------------
// Config structs (matching helpsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Knowledge-base API credentials (env var names, never the values).
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Article source (help center) settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Upload destination settings.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Pacing delays between pipeline steps.
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// `[credentials]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Name of the env var holding the KB API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the KB project id.
    #[serde(default = "default_project_id_env")]
    pub project_id_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            project_id_env: default_project_id_env(),
        }
    }
}

fn default_api_key_env() -> String {
    "HELPSYNC_KB_API_KEY".into()
}
fn default_project_id_env() -> String {
    "HELPSYNC_KB_PROJECT_ID".into()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Listing mode: "sitemap" or "api".
    #[serde(default = "default_mode")]
    pub mode: SourceMode,

    /// Help-center origin, e.g. `https://support.example.com`.
    /// Required for API mode and for the default sitemap URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Explicit sitemap URL; defaults to `<base_url>/hc/sitemap.xml`.
    #[serde(default)]
    pub sitemap_url: Option<String>,

    /// Path fragment an article URL must contain (sitemap mode only).
    #[serde(default = "default_sitemap_filter")]
    pub sitemap_filter: String,

    /// Help-center locale used in API paths.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Name of the env var holding the help-center API token (optional;
    /// some help centers serve articles without authentication).
    #[serde(default = "default_source_token_env")]
    pub token_env: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            base_url: None,
            sitemap_url: None,
            sitemap_filter: default_sitemap_filter(),
            locale: default_locale(),
            token_env: default_source_token_env(),
        }
    }
}

fn default_mode() -> SourceMode {
    SourceMode::Sitemap
}
fn default_sitemap_filter() -> String {
    "/articles/".into()
}
fn default_locale() -> String {
    "en-us".into()
}
fn default_source_token_env() -> String {
    "HELPSYNC_SOURCE_TOKEN".into()
}

/// `[upload]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Base URL of the knowledge-base ingestion API.
    #[serde(default = "default_upload_base_url")]
    pub base_url: String,

    /// Maximum chunk size hint passed to the ingestion endpoint.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u32,

    /// Overwrite existing documents with the same filename.
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: default_upload_base_url(),
            max_chunk_size: default_max_chunk_size(),
            overwrite: default_true(),
        }
    }
}

fn default_upload_base_url() -> String {
    "https://api.example-kb.com".into()
}
fn default_max_chunk_size() -> u32 {
    1500
}
fn default_true() -> bool {
    true
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Staging directory for converted text artifacts.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Consecutive failures before the run aborts.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Number of staged tasks flushed to the upload queue at once.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent upload workers.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Default lookback window in days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Bypass the lookback filter on every run.
    #[serde(default)]
    pub always_force: bool,

    /// Keep staged files after upload instead of deleting them.
    #[serde(default)]
    pub retain_docs: bool,

    /// Skip the actual upload request (everything else runs normally).
    #[serde(default)]
    pub dry_run: bool,

    /// Log full error detail for per-item failures.
    #[serde(default)]
    pub debug: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            max_failures: default_max_failures(),
            batch_size: default_batch_size(),
            upload_concurrency: default_upload_concurrency(),
            lookback_days: default_lookback_days(),
            always_force: false,
            retain_docs: false,
            dry_run: false,
            debug: false,
        }
    }
}

fn default_staging_dir() -> String {
    "docs".into()
}
fn default_max_failures() -> u32 {
    5
}
fn default_batch_size() -> usize {
    5
}
fn default_upload_concurrency() -> usize {
    5
}
fn default_lookback_days() -> i64 {
    30
}

/// `[pacing]` section — fixed delays that throttle upstream requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Delay between reference-processing steps.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Delay after each batch drain.
    #[serde(default = "default_drain_delay_ms")]
    pub drain_delay_ms: u64,

    /// Settle delay after writing a staging artifact.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: default_item_delay_ms(),
            drain_delay_ms: default_drain_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

fn default_item_delay_ms() -> u64 {
    500
}
fn default_drain_delay_ms() -> u64 {
    2000
}
fn default_settle_delay_ms() -> u64 {
    2000
}

// ---------------------------------------------------------------------------
// Run parameters (runtime, merged from request + config + defaults)
// ---------------------------------------------------------------------------

/// Raw trigger-surface request: every field optional, resolved against the
/// config before a run starts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    /// KB API key.
    pub api_key: Option<String>,
    /// KB project id.
    pub project_id: Option<String>,
    /// Sitemap URL, or the literal `"api"` to force API listing.
    pub url: Option<String>,
    /// Bypass the lookback filter.
    pub force: Option<bool>,
    /// Lookback window in days.
    pub previous_days: Option<i64>,
}

/// Effective parameters for one import run.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Listing mode.
    pub mode: SourceMode,
    /// Sitemap URL (sitemap mode only).
    pub sitemap_url: Option<String>,
    /// Bypass the lookback filter.
    pub force: bool,
    /// Lookback window in days.
    pub lookback_days: i64,
    /// Upload credentials.
    pub credentials: Credentials,
}

impl RunParams {
    /// Resolve effective parameters with request → config/env → fallback
    /// precedence. Missing credentials are a hard validation error.
    pub fn resolve(request: &RunRequest, config: &AppConfig) -> Result<Self> {
        let api_key = request
            .api_key
            .clone()
            .or_else(|| env_nonempty(&config.credentials.api_key_env))
            .ok_or_else(|| HelpsyncError::validation("no API key provided"))?;

        let project_id = request
            .project_id
            .clone()
            .or_else(|| env_nonempty(&config.credentials.project_id_env))
            .ok_or_else(|| HelpsyncError::validation("no project ID provided"))?;

        // The literal "api" in the url slot selects API listing, matching
        // the trigger surfaces' single free-form source field.
        let (mode, sitemap_url) = match request.url.as_deref() {
            Some(u) if u.eq_ignore_ascii_case("api") => (SourceMode::Api, None),
            Some(u) => (SourceMode::Sitemap, Some(u.to_string())),
            None => match config.source.mode {
                SourceMode::Api => (SourceMode::Api, None),
                SourceMode::Sitemap => (SourceMode::Sitemap, config.default_sitemap_url()),
            },
        };

        if mode == SourceMode::Sitemap && sitemap_url.is_none() {
            return Err(HelpsyncError::validation(
                "no sitemap URL provided and none could be derived from the config",
            ));
        }

        Ok(Self {
            mode,
            sitemap_url,
            force: request.force.unwrap_or(config.pipeline.always_force),
            lookback_days: request
                .previous_days
                .unwrap_or(config.pipeline.lookback_days),
            credentials: Credentials {
                api_key,
                project_id,
            },
        })
    }
}

impl AppConfig {
    /// Explicit sitemap URL, or one derived from the help-center origin.
    pub fn default_sitemap_url(&self) -> Option<String> {
        self.source.sitemap_url.clone().or_else(|| {
            self.source
                .base_url
                .as_ref()
                .map(|base| format!("{}/hc/sitemap.xml", base.trim_end_matches('/')))
        })
    }

    /// Help-center API token from the configured env var, if set.
    pub fn source_token(&self) -> Option<String> {
        env_nonempty(&self.source.token_env)
    }
}

fn env_nonempty(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.helpsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HelpsyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.helpsync/helpsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HelpsyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HelpsyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HelpsyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HelpsyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HelpsyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("staging_dir"));
        assert!(toml_str.contains("HELPSYNC_KB_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.max_failures, 5);
        assert_eq!(parsed.pipeline.batch_size, 5);
        assert_eq!(parsed.pipeline.lookback_days, 30);
        assert_eq!(parsed.source.sitemap_filter, "/articles/");
    }

    #[test]
    fn sitemap_url_derived_from_base_url() {
        let mut config = AppConfig::default();
        assert_eq!(config.default_sitemap_url(), None);

        config.source.base_url = Some("https://support.example.com/".into());
        assert_eq!(
            config.default_sitemap_url().as_deref(),
            Some("https://support.example.com/hc/sitemap.xml")
        );

        config.source.sitemap_url = Some("https://cdn.example.com/custom.xml".into());
        assert_eq!(
            config.default_sitemap_url().as_deref(),
            Some("https://cdn.example.com/custom.xml")
        );
    }

    #[test]
    fn resolve_requires_credentials() {
        let mut config = AppConfig::default();
        // Point the env lookups at names nothing sets.
        config.credentials.api_key_env = "HELPSYNC_TEST_UNSET_KEY".into();
        config.credentials.project_id_env = "HELPSYNC_TEST_UNSET_PROJECT".into();

        let request = RunRequest {
            url: Some("https://support.example.com/hc/sitemap.xml".into()),
            ..Default::default()
        };
        let err = RunParams::resolve(&request, &config).unwrap_err();
        assert!(err.to_string().contains("no API key provided"));
    }

    #[test]
    fn resolve_request_overrides_config() {
        let mut config = AppConfig::default();
        config.pipeline.lookback_days = 30;
        config.source.base_url = Some("https://support.example.com".into());

        let request = RunRequest {
            api_key: Some("key".into()),
            project_id: Some("proj".into()),
            url: None,
            force: Some(true),
            previous_days: Some(7),
        };

        let params = RunParams::resolve(&request, &config).expect("resolve");
        assert_eq!(params.mode, SourceMode::Sitemap);
        assert_eq!(
            params.sitemap_url.as_deref(),
            Some("https://support.example.com/hc/sitemap.xml")
        );
        assert!(params.force);
        assert_eq!(params.lookback_days, 7);
        assert_eq!(params.credentials.project_id, "proj");
    }

    #[test]
    fn resolve_api_literal_selects_api_mode() {
        let config = AppConfig::default();
        let request = RunRequest {
            api_key: Some("key".into()),
            project_id: Some("proj".into()),
            url: Some("API".into()),
            ..Default::default()
        };

        let params = RunParams::resolve(&request, &config).expect("resolve");
        assert_eq!(params.mode, SourceMode::Api);
        assert!(params.sitemap_url.is_none());
    }

    #[test]
    fn resolve_sitemap_mode_without_url_fails() {
        let config = AppConfig::default();
        let request = RunRequest {
            api_key: Some("key".into()),
            project_id: Some("proj".into()),
            ..Default::default()
        };
        let err = RunParams::resolve(&request, &config).unwrap_err();
        assert!(err.to_string().contains("sitemap URL"));
    }
}
