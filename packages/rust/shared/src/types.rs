//! Core domain types for helpsync runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for import-run identifiers (time-sortable).
///
/// Also used to namespace each run's staging subdirectory so that two
/// concurrent runs against the same source cannot clobber each other's
/// staged files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Credentials for the knowledge-base ingestion API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// API key sent in the Authorization header.
    pub api_key: String,
    /// Target knowledge-base project.
    pub project_id: String,
}

// Manual Debug so the API key never lands in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("project_id", &self.project_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SourceMode
// ---------------------------------------------------------------------------

/// How article URLs are discovered: crawling the help-center sitemap, or
/// paging the help-center REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Sitemap,
    Api,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sitemap => write!(f, "sitemap"),
            Self::Api => write!(f, "api"),
        }
    }
}

impl std::str::FromStr for SourceMode {
    type Err = crate::HelpsyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sitemap" => Ok(Self::Sitemap),
            "api" => Ok(Self::Api),
            other => Err(crate::HelpsyncError::validation(format!(
                "unknown source mode {other:?} (expected \"sitemap\" or \"api\")"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ArticleRef / Article
// ---------------------------------------------------------------------------

/// A discovered article, before its content has been fetched.
///
/// Produced by the article source, consumed once by the staging writer;
/// never persisted beyond the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRef {
    /// Canonical article URL.
    pub url: String,
    /// Numeric article id, when the source already knows it (API mode).
    pub id: Option<u64>,
    /// Title, when the source already knows it (API mode).
    pub title: Option<String>,
    /// Last-modified timestamp used by the lookback filter.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ArticleRef {
    /// Build a reference from a bare URL (sitemap mode).
    pub fn from_url(url: impl Into<String>, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            url: url.into(),
            id: None,
            title: None,
            last_modified,
        }
    }

    /// The last path segment of the URL, used to derive the staged filename.
    pub fn slug(&self) -> &str {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.url)
    }
}

/// Full article content as returned by the help-center API.
#[derive(Debug, Clone, Deserialize)]
pub struct Article {
    /// Article title (raw HTML allowed).
    pub title: String,
    /// Article body as raw HTML.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Run status / report
// ---------------------------------------------------------------------------

/// Terminal status of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The filtered listing was empty; nothing was staged or uploaded.
    NoItems,
    /// All processed items completed without tripping the failure threshold.
    Completed,
    /// The consecutive-failure threshold was reached; remaining items were
    /// skipped. Soft outcome, not an error.
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "no items found"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted: too many failures"),
        }
    }
}

/// Summary of a completed import run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier (also the staging subdirectory name).
    pub run_id: RunId,
    /// Terminal status.
    pub status: RunStatus,
    /// References produced by the listing after filtering.
    pub discovered: usize,
    /// Artifacts written to the staging directory.
    pub staged: usize,
    /// Documents accepted by the upload API.
    pub uploaded: usize,
    /// Per-item failures (fetch, write, or upload).
    pub failed: usize,
    /// Items dropped by the minimal-content policy or missing an article id.
    pub skipped: usize,
    /// Total elapsed time.
    #[serde(skip)]
    pub elapsed: std::time::Duration,
}
