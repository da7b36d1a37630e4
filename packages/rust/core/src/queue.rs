//! Bounded-concurrency upload worker queue.
//!
//! Tasks are spawned into a [`JoinSet`] gated by a semaphore of `W`
//! permits, so at most `W` uploads run at once. [`UploadQueue::drain`] is
//! the synchronization barrier the orchestrator waits on between batches:
//! it resolves once every pushed task has completed, success or failure.
//! A panicking worker is contained by the JoinSet and counted as a
//! failure; other workers and in-flight tasks are unaffected.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use helpsync_shared::{HelpsyncError, Result};
use helpsync_upload::DocumentSink;

use crate::run_state::RunState;
use crate::staging::UploadTask;

/// Outcome counts from one drain barrier.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrainStats {
    /// Tasks whose upload was accepted.
    pub uploaded: usize,
    /// Tasks that failed (upload rejected, staged file unreadable, or a
    /// worker panic).
    pub failed: usize,
}

/// Fixed-width worker queue feeding the document sink.
pub struct UploadQueue {
    sink: Arc<dyn DocumentSink>,
    state: Arc<RunState>,
    semaphore: Arc<Semaphore>,
    workers: JoinSet<bool>,
    retain: bool,
}

impl UploadQueue {
    /// Queue with `concurrency` upload workers.
    pub fn new(
        sink: Arc<dyn DocumentSink>,
        state: Arc<RunState>,
        concurrency: usize,
        retain: bool,
    ) -> Self {
        Self {
            sink,
            state,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            workers: JoinSet::new(),
            retain,
        }
    }

    /// Enqueue one task. Ownership of the task transfers to the queue.
    pub fn push(&mut self, task: UploadTask) {
        let sink = self.sink.clone();
        let state = self.state.clone();
        let semaphore = self.semaphore.clone();
        let retain = self.retain;

        self.workers.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("upload semaphore closed");

            match process_task(sink.as_ref(), &task, retain).await {
                Ok(()) => {
                    state.record_success();
                    debug!(filename = %task.filename, "uploaded");
                    true
                }
                Err(e) => {
                    state.record_failure();
                    warn!(filename = %task.filename, error = %e, "upload failed");
                    false
                }
            }
        });
    }

    /// Wait until every pushed task has settled.
    pub async fn drain(&mut self) -> DrainStats {
        let mut stats = DrainStats::default();

        while let Some(result) = self.workers.join_next().await {
            match result {
                Ok(true) => stats.uploaded += 1,
                Ok(false) => stats.failed += 1,
                Err(e) => {
                    // A worker panicked; contain it and count the task.
                    warn!(error = %e, "upload worker crashed");
                    self.state.record_failure();
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}

/// Read the staged file, upload it, then dispose of the artifact.
/// The staged file is deleted after a successful or failed upload alike,
/// unless retention is configured.
async fn process_task(sink: &dyn DocumentSink, task: &UploadTask, retain: bool) -> Result<()> {
    let result = async {
        let content = tokio::fs::read(&task.path)
            .await
            .map_err(|e| HelpsyncError::io(&task.path, e))?;
        sink.upload(&task.filename, content, &task.credentials).await
    }
    .await;

    if !retain {
        if let Err(e) = tokio::fs::remove_file(&task.path).await {
            debug!(path = ?task.path, error = %e, "could not remove staged file");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use helpsync_shared::Credentials;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentSink for CountingSink {
        async fn upload(
            &self,
            _filename: &str,
            _content: Vec<u8>,
            _credentials: &Credentials,
        ) -> Result<()> {
            let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl DocumentSink for FailingSink {
        async fn upload(
            &self,
            filename: &str,
            _content: Vec<u8>,
            _credentials: &Credentials,
        ) -> Result<()> {
            Err(HelpsyncError::Upload(format!("{filename}: HTTP 500")))
        }
    }

    fn stage_test_files(count: usize) -> (PathBuf, Vec<UploadTask>) {
        let dir = std::env::temp_dir().join(format!("helpsync-queue-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let creds = Credentials {
            api_key: "key".into(),
            project_id: "proj".into(),
        };

        let tasks = (0..count)
            .map(|i| {
                let filename = format!("article-{i}.txt");
                let path = dir.join(&filename);
                std::fs::write(&path, format!("Title {i}\n\nBody {i}")).unwrap();
                UploadTask {
                    filename,
                    path,
                    credentials: creds.clone(),
                }
            })
            .collect();

        (dir, tasks)
    }

    #[tokio::test]
    async fn concurrency_stays_within_the_width() {
        let (dir, tasks) = stage_test_files(6);
        let sink = Arc::new(CountingSink::new());
        let state = Arc::new(RunState::new(3));

        let mut queue = UploadQueue::new(sink.clone(), state.clone(), 2, false);
        for task in tasks {
            queue.push(task);
        }
        let stats = queue.drain().await;

        assert_eq!(stats.uploaded, 6);
        assert_eq!(stats.failed, 0);
        assert!(sink.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 6);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn drain_deletes_staged_files() {
        let (dir, tasks) = stage_test_files(3);
        let sink = Arc::new(CountingSink::new());
        let state = Arc::new(RunState::new(3));

        let mut queue = UploadQueue::new(sink, state, 2, false);
        let paths: Vec<_> = tasks.iter().map(|t| t.path.clone()).collect();
        for task in tasks {
            queue.push(task);
        }
        queue.drain().await;

        for path in paths {
            assert!(!path.exists(), "{path:?} should have been deleted");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn retention_keeps_staged_files() {
        let (dir, tasks) = stage_test_files(2);
        let sink = Arc::new(CountingSink::new());
        let state = Arc::new(RunState::new(3));

        let mut queue = UploadQueue::new(sink, state, 2, true);
        let paths: Vec<_> = tasks.iter().map(|t| t.path.clone()).collect();
        for task in tasks {
            queue.push(task);
        }
        queue.drain().await;

        for path in paths {
            assert!(path.exists(), "{path:?} should have been retained");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failures_feed_the_breaker_and_still_delete() {
        let (dir, tasks) = stage_test_files(3);
        let sink = Arc::new(FailingSink);
        let state = Arc::new(RunState::new(3));

        let mut queue = UploadQueue::new(sink, state.clone(), 2, false);
        let paths: Vec<_> = tasks.iter().map(|t| t.path.clone()).collect();
        for task in tasks {
            queue.push(task);
        }
        let stats = queue.drain().await;

        assert_eq!(stats.uploaded, 0);
        assert_eq!(stats.failed, 3);
        assert!(!state.should_continue());
        for path in paths {
            assert!(!path.exists());
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_staged_file_is_a_failure_not_a_crash() {
        let (dir, mut tasks) = stage_test_files(2);
        std::fs::remove_file(&tasks[0].path).unwrap();
        tasks[0].path = dir.join("vanished.txt");

        let sink = Arc::new(CountingSink::new());
        let state = Arc::new(RunState::new(5));

        let mut queue = UploadQueue::new(sink, state.clone(), 2, false);
        for task in tasks {
            queue.push(task);
        }
        let stats = queue.drain().await;

        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.failed, 1);
        assert!(state.should_continue());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
