//! Staging writer: fetch, convert, and persist one article.
//!
//! Each run stages into its own subdirectory (`<staging_root>/<run_id>/`),
//! so concurrent runs against the same source cannot clobber each other's
//! files. A staged artifact is `<slug>.txt` holding `<title>\n\n<body>` as
//! plain text.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use helpsync_extract::ExtractOptions;
use helpsync_shared::{ArticleRef, Credentials, HelpsyncError, Result};
use helpsync_source::ArticleSource;

use crate::pacer::Pacer;
use crate::run_state::RunState;

/// Converted bodies at or below this length carry no real content
/// (empty paragraphs, stray whitespace markup) and are dropped.
const MIN_BODY_LEN: usize = 3;

// ---------------------------------------------------------------------------
// UploadTask
// ---------------------------------------------------------------------------

/// A staged document ready for upload. Immutable once created; ownership
/// moves from the orchestrator into the upload queue.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// Document filename presented to the upload API.
    pub filename: String,
    /// Location of the staged artifact on disk.
    pub path: PathBuf,
    /// Credentials the upload worker will use.
    pub credentials: Credentials,
}

/// Result of staging one article.
#[derive(Debug)]
pub enum StageOutcome {
    /// Artifact written; task ready for the queue.
    Staged(UploadTask),
    /// Converted body was below the minimal-content threshold.
    /// Not a failure.
    Skipped,
}

// ---------------------------------------------------------------------------
// StagingWriter
// ---------------------------------------------------------------------------

/// Converts fetched articles into staged text artifacts.
pub struct StagingWriter {
    dir: PathBuf,
    pacer: Pacer,
    extract: ExtractOptions,
}

impl StagingWriter {
    /// Writer staging into `dir` (created lazily on first write).
    pub fn new(dir: PathBuf, pacer: Pacer) -> Self {
        Self {
            dir,
            pacer,
            extract: ExtractOptions::default(),
        }
    }

    /// The run's staging directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch one article, convert it to text, and persist the artifact.
    ///
    /// Returns [`StageOutcome::Skipped`] for below-threshold content.
    /// Returns [`HelpsyncError::Aborted`] if the run tripped its failure
    /// threshold while this operation was in flight; the written artifact
    /// is discarded by the caller, no upload is attempted.
    #[instrument(skip_all, fields(url = %article.url))]
    pub async fn stage(
        &self,
        source: &dyn ArticleSource,
        article: &ArticleRef,
        credentials: &Credentials,
        state: &RunState,
    ) -> Result<StageOutcome> {
        let content = source.fetch(article).await?;

        let title = helpsync_extract::to_text(&content.title, &self.extract);
        let body = helpsync_extract::to_text(&content.body, &self.extract);

        if body.len() <= MIN_BODY_LEN {
            debug!(body_len = body.len(), "below minimal-content threshold, skipping");
            return Ok(StageOutcome::Skipped);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HelpsyncError::io(&self.dir, e))?;

        let filename = format!("{}.txt", article.slug());
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, format!("{title}\n\n{body}"))
            .await
            .map_err(|e| HelpsyncError::io(&path, e))?;

        self.pacer.after_write().await;

        // The run may have tripped while we were fetching or writing.
        if !state.should_continue() {
            return Err(HelpsyncError::Aborted);
        }

        debug!(%filename, "article staged");
        Ok(StageOutcome::Staged(UploadTask {
            filename,
            path,
            credentials: credentials.clone(),
        }))
    }
}
