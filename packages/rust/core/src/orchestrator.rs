//! End-to-end import run: list → stage (per item) → batched upload → report.
//!
//! One invocation walks the filtered article list in source order, staging
//! each item and buffering the resulting tasks. Buffered tasks are flushed
//! to the upload queue in batches; each flush waits on the queue's drain
//! barrier before iteration resumes, which bounds both upload concurrency
//! and the number of staged-but-not-uploaded files. The run's failure
//! tracker is consulted before every item; a tripped breaker ends the run
//! with the soft `Aborted` status, while a listing failure escapes as a
//! hard error.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use helpsync_shared::{
    AppConfig, HelpsyncError, Result, RunId, RunParams, RunReport, RunStatus,
};
use helpsync_source::{ArticleSource, RecencyWindow};
use helpsync_upload::DocumentSink;

use crate::pacer::Pacer;
use crate::queue::UploadQueue;
use crate::run_state::RunState;
use crate::staging::{StageOutcome, StagingWriter, UploadTask};

// ---------------------------------------------------------------------------
// ImportConfig
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from the app config.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Root under which each run stages into its own subdirectory.
    pub staging_root: PathBuf,
    /// Consecutive failures before the run aborts.
    pub max_failures: u32,
    /// Tasks flushed to the upload queue at once.
    pub batch_size: usize,
    /// Concurrent upload workers.
    pub upload_concurrency: usize,
    /// Keep staged files after upload.
    pub retain_docs: bool,
    /// Log full error detail for per-item failures.
    pub debug: bool,
    /// Pacing delays.
    pub pacer: Pacer,
}

impl From<&AppConfig> for ImportConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            staging_root: PathBuf::from(&config.pipeline.staging_dir),
            max_failures: config.pipeline.max_failures,
            batch_size: config.pipeline.batch_size.max(1),
            upload_concurrency: config.pipeline.upload_concurrency.max(1),
            retain_docs: config.pipeline.retain_docs,
            debug: config.pipeline.debug,
            pacer: Pacer::from(&config.pacing),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status to a trigger surface.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each reference is processed.
    fn item(&self, current: usize, total: usize, url: &str);
    /// Called once with the terminal report.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _current: usize, _total: usize, _url: &str) {}
    fn done(&self, _report: &RunReport) {}
}

/// Point-in-time view of a running import, for fire-and-forget surfaces
/// that acknowledge immediately and expose progress via a poll endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSnapshot {
    /// Current phase label.
    pub phase: String,
    /// References processed so far.
    pub current: usize,
    /// Total references discovered.
    pub total: usize,
    /// Terminal status, once the run has finished.
    pub status: Option<RunStatus>,
}

/// Shared, thread-safe progress cell. Implements [`ProgressReporter`] so
/// the orchestrator can write into it while a trigger surface polls
/// [`RunProgress::snapshot`].
#[derive(Debug, Default)]
pub struct RunProgress {
    inner: Mutex<ProgressSnapshot>,
}

impl RunProgress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.lock().expect("progress lock poisoned").clone()
    }
}

impl ProgressReporter for RunProgress {
    fn phase(&self, name: &str) {
        let mut inner = self.inner.lock().expect("progress lock poisoned");
        inner.phase = name.to_string();
    }

    fn item(&self, current: usize, total: usize, _url: &str) {
        let mut inner = self.inner.lock().expect("progress lock poisoned");
        inner.current = current;
        inner.total = total;
    }

    fn done(&self, report: &RunReport) {
        let mut inner = self.inner.lock().expect("progress lock poisoned");
        inner.phase = report.status.to_string();
        inner.status = Some(report.status);
    }
}

// ---------------------------------------------------------------------------
// Run orchestrator
// ---------------------------------------------------------------------------

/// Run one import end to end.
///
/// Returns the terminal [`RunReport`] for every soft outcome (`NoItems`,
/// `Completed`, `Aborted`); only listing failures and invalid
/// configuration escape as errors.
#[instrument(skip_all, fields(mode = %params.mode))]
pub async fn run_import(
    params: &RunParams,
    config: &ImportConfig,
    source: &dyn ArticleSource,
    sink: Arc<dyn DocumentSink>,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let run_id = RunId::new();
    let state = Arc::new(RunState::new(config.max_failures));

    info!(%run_id, force = params.force, lookback_days = params.lookback_days, "starting import");

    // --- Listing ---
    progress.phase("Listing articles");
    let window = RecencyWindow::from(params);
    let refs = source.list(&window).await?;

    if refs.is_empty() {
        info!("no articles to fetch (check source, lookback window, and filter)");
        let report = RunReport {
            run_id,
            status: RunStatus::NoItems,
            discovered: 0,
            staged: 0,
            uploaded: 0,
            failed: 0,
            skipped: 0,
            elapsed: start.elapsed(),
        };
        progress.done(&report);
        return Ok(report);
    }

    // --- Iterating / Draining ---
    let writer = StagingWriter::new(config.staging_root.join(run_id.to_string()), config.pacer);
    let mut queue = UploadQueue::new(
        sink,
        state.clone(),
        config.upload_concurrency,
        config.retain_docs,
    );

    let total = refs.len();
    let mut buffered: Vec<UploadTask> = Vec::new();
    let mut staged = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    let mut uploaded = 0usize;

    for (i, article) in refs.iter().enumerate() {
        // Cooperative cancellation point: a tripped breaker ends the run
        // here, leaving the remaining references unprocessed.
        if !state.should_continue() {
            break;
        }

        progress.item(i + 1, total, &article.url);
        config.pacer.between_items().await;

        match writer
            .stage(source, article, &params.credentials, &state)
            .await
        {
            Ok(StageOutcome::Staged(task)) => {
                staged += 1;
                buffered.push(task);
            }
            Ok(StageOutcome::Skipped) => skipped += 1,
            Err(HelpsyncError::Aborted) => {
                debug!(url = %article.url, "run tripped mid-stage, task discarded");
            }
            Err(e) => {
                if config.debug {
                    warn!(url = %article.url, error = ?e, "staging failed");
                } else {
                    warn!(url = %article.url, error = %e, "staging failed");
                }
                state.record_failure();
                failed += 1;
            }
        }

        // A failure on this very item may have tripped the breaker; once
        // tripped, buffered tasks are discarded, never enqueued.
        if !state.should_continue() {
            break;
        }

        if buffered.len() >= config.batch_size || i == total - 1 {
            if buffered.is_empty() {
                continue;
            }
            progress.phase("Uploading batch");
            for task in buffered.drain(..) {
                queue.push(task);
            }
            let stats = queue.drain().await;
            uploaded += stats.uploaded;
            failed += stats.failed;
            config.pacer.after_drain().await;
        }
    }

    // Tasks buffered when the breaker tripped are never enqueued; their
    // artifacts go with the run directory.
    if !config.retain_docs {
        let _ = tokio::fs::remove_dir_all(writer.dir()).await;
    }

    let status = if state.should_continue() {
        RunStatus::Completed
    } else {
        RunStatus::Aborted
    };

    let report = RunReport {
        run_id,
        status,
        discovered: total,
        staged,
        uploaded,
        failed,
        skipped,
        elapsed: start.elapsed(),
    };

    info!(
        status = %report.status,
        discovered = report.discovered,
        staged = report.staged,
        uploaded = report.uploaded,
        failed = report.failed,
        skipped = report.skipped,
        elapsed_ms = report.elapsed.as_millis(),
        "import finished"
    );

    progress.done(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use helpsync_shared::{Article, ArticleRef, Credentials, SourceMode};
    use std::collections::HashSet;

    fn test_params() -> RunParams {
        RunParams {
            mode: SourceMode::Sitemap,
            sitemap_url: Some("https://support.example.com/hc/sitemap.xml".into()),
            force: false,
            lookback_days: 30,
            credentials: Credentials {
                api_key: "key".into(),
                project_id: "proj".into(),
            },
        }
    }

    fn test_config(staging_root: PathBuf, max_failures: u32, batch: usize, width: usize) -> ImportConfig {
        ImportConfig {
            staging_root,
            max_failures,
            batch_size: batch,
            upload_concurrency: width,
            retain_docs: false,
            debug: false,
            pacer: Pacer::none(),
        }
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("helpsync-run-test-{}", uuid::Uuid::now_v7()))
    }

    fn refs(count: usize) -> Vec<ArticleRef> {
        (1..=count)
            .map(|i| ArticleRef {
                url: format!("https://support.example.com/hc/en-us/articles/{}-item-{i}", 100 + i),
                id: Some(100 + i as u64),
                title: None,
                last_modified: None,
            })
            .collect()
    }

    struct ScriptedSource {
        refs: Vec<ArticleRef>,
        fail_fetch_ids: HashSet<u64>,
        fetched: Mutex<Vec<u64>>,
        fail_listing: bool,
    }

    impl ScriptedSource {
        fn new(refs: Vec<ArticleRef>) -> Self {
            Self {
                refs,
                fail_fetch_ids: HashSet::new(),
                fetched: Mutex::new(Vec::new()),
                fail_listing: false,
            }
        }

        fn fetched_ids(&self) -> Vec<u64> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArticleSource for ScriptedSource {
        async fn list(&self, _window: &RecencyWindow) -> Result<Vec<ArticleRef>> {
            if self.fail_listing {
                return Err(HelpsyncError::Listing("sitemap unreachable".into()));
            }
            Ok(self.refs.clone())
        }

        async fn fetch(&self, article: &ArticleRef) -> Result<Article> {
            let id = article.id.unwrap();
            self.fetched.lock().unwrap().push(id);
            if self.fail_fetch_ids.contains(&id) {
                return Err(HelpsyncError::Fetch(format!("article {id}: HTTP 500")));
            }
            Ok(Article {
                title: format!("<h1>Article {id}</h1>"),
                body: format!("<p>Body of article {id}, long enough to stage.</p>"),
            })
        }
    }

    /// Records upload start/end events per filename and fails on demand.
    struct RecordingSink {
        events: Mutex<Vec<(String, &'static str)>>,
        fail_all: bool,
    }

    impl RecordingSink {
        fn new(fail_all: bool) -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail_all,
            }
        }

        fn events(&self) -> Vec<(String, &'static str)> {
            self.events.lock().unwrap().clone()
        }

        fn uploaded_filenames(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter(|(_, kind)| *kind == "end")
                .map(|(name, _)| name)
                .collect()
        }
    }

    #[async_trait]
    impl DocumentSink for RecordingSink {
        async fn upload(
            &self,
            filename: &str,
            _content: Vec<u8>,
            _credentials: &Credentials,
        ) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((filename.to_string(), "start"));
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.events
                .lock()
                .unwrap()
                .push((filename.to_string(), "end"));
            if self.fail_all {
                return Err(HelpsyncError::Upload(format!("{filename}: HTTP 500")));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn seven_refs_complete_in_two_sequential_batches() {
        let root = temp_root();
        let source = ScriptedSource::new(refs(7));
        let sink = Arc::new(RecordingSink::new(false));
        let config = test_config(root.clone(), 3, 5, 2);

        let report = run_import(&test_params(), &config, &source, sink.clone(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.discovered, 7);
        assert_eq!(report.staged, 7);
        assert_eq!(report.uploaded, 7);
        assert_eq!(report.failed, 0);

        // Batch 1 (first five refs) fully drains before batch 2 starts.
        let events = sink.events();
        let batch1: HashSet<String> = (1..=5).map(|i| format!("{}-item-{i}.txt", 100 + i)).collect();
        let first_batch2_start = events
            .iter()
            .position(|(name, kind)| *kind == "start" && !batch1.contains(name))
            .expect("batch 2 started");
        let batch1_ends: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, (name, kind))| *kind == "end" && batch1.contains(name))
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(batch1_ends.len(), 5);
        assert!(batch1_ends.iter().all(|&idx| idx < first_batch2_start));

        // Staging root cleaned up after the run.
        assert!(!root.join(report.run_id.to_string()).exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn three_staging_failures_abort_and_skip_the_rest() {
        let root = temp_root();
        let mut source = ScriptedSource::new(refs(10));
        source.fail_fetch_ids = [102, 103, 104].into_iter().collect();
        let sink = Arc::new(RecordingSink::new(false));
        let config = test_config(root.clone(), 3, 5, 2);

        let report = run_import(&test_params(), &config, &source, sink.clone(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.failed, 3);
        // Items 5..10 were never processed.
        assert_eq!(source.fetched_ids(), vec![101, 102, 103, 104]);
        // The one buffered task (item 1) was never enqueued after the trip.
        assert!(sink.uploaded_filenames().is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn trip_on_the_final_item_discards_buffered_tasks() {
        let root = temp_root();
        let mut source = ScriptedSource::new(refs(2));
        source.fail_fetch_ids = [102].into_iter().collect();
        let sink = Arc::new(RecordingSink::new(false));
        let config = test_config(root.clone(), 1, 5, 2);

        let report = run_import(&test_params(), &config, &source, sink.clone(), &SilentProgress)
            .await
            .unwrap();

        // Item 2's failure trips the breaker on the end-of-list iteration;
        // item 1's buffered task must not reach the sink.
        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.staged, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.uploaded, 0);
        assert!(sink.events().is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn empty_listing_is_no_items_and_writes_nothing() {
        let root = temp_root();
        let source = ScriptedSource::new(vec![]);
        let sink = Arc::new(RecordingSink::new(false));
        let config = test_config(root.clone(), 3, 5, 2);

        let report = run_import(&test_params(), &config, &source, sink, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::NoItems);
        assert_eq!(report.discovered, 0);
        assert!(!root.exists(), "no staging writes may occur");
    }

    #[tokio::test]
    async fn listing_failure_is_a_hard_error() {
        let root = temp_root();
        let mut source = ScriptedSource::new(refs(3));
        source.fail_listing = true;
        let sink = Arc::new(RecordingSink::new(false));
        let config = test_config(root, 3, 5, 2);

        let err = run_import(&test_params(), &config, &source, sink, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, HelpsyncError::Listing(_)));
    }

    #[tokio::test]
    async fn upload_failures_trip_the_breaker() {
        let root = temp_root();
        let source = ScriptedSource::new(refs(10));
        let sink = Arc::new(RecordingSink::new(true));
        let config = test_config(root.clone(), 3, 2, 2);

        let report = run_import(&test_params(), &config, &source, sink, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Aborted);
        assert!(report.failed >= 3);
        assert_eq!(report.uploaded, 0);
        // Iteration stopped well before the end of the list.
        assert!(source.fetched_ids().len() < 10);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn short_final_batch_flushes_at_exhaustion() {
        let root = temp_root();
        let source = ScriptedSource::new(refs(3));
        let sink = Arc::new(RecordingSink::new(false));
        let config = test_config(root.clone(), 3, 5, 2);

        let report = run_import(&test_params(), &config, &source, sink.clone(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.uploaded, 3);
        assert_eq!(sink.uploaded_filenames().len(), 3);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn progress_cell_tracks_the_run() {
        let root = temp_root();
        let source = ScriptedSource::new(refs(2));
        let sink = Arc::new(RecordingSink::new(false));
        let config = test_config(root.clone(), 3, 5, 2);
        let progress = RunProgress::default();

        run_import(&test_params(), &config, &source, sink, &progress)
            .await
            .unwrap();

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.status, Some(RunStatus::Completed));
        assert_eq!(snapshot.current, 2);
        assert_eq!(snapshot.total, 2);

        let _ = std::fs::remove_dir_all(&root);
    }
}
