use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use super::client::{staging_path, ArtifactFetcher};
use super::verify::is_valid;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::sinks::ProgressSink;

/// One artifact the launcher expects at `dest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: String,
    pub size: u64,
    /// Human-readable name shown to progress sinks.
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyValid,
    Downloaded,
}

/// Skips the transfer when the file on disk already passes verification.
///
/// Otherwise the body is fetched into a private staging file, verified there
/// and only then renamed over `dest`. A failed check removes the staging
/// file and leaves `dest` alone, so concurrent fetches of one artifact cannot
/// clobber each other.
pub async fn verify_or_fetch(
    fetcher: &dyn ArtifactFetcher,
    task: &DownloadTask,
    progress: Option<&dyn ProgressSink>,
) -> LauncherResult<FetchOutcome> {
    if check(&task.dest, task).await {
        return Ok(FetchOutcome::AlreadyValid);
    }

    if let Some(sink) = progress {
        sink.on_file_changed(&task.label);
    }

    let result = fetch_and_publish(fetcher, task, progress).await;
    if let Some(sink) = progress {
        sink.on_file_finished(&task.label);
    }
    result.map(|()| FetchOutcome::Downloaded)
}

async fn fetch_and_publish(
    fetcher: &dyn ArtifactFetcher,
    task: &DownloadTask,
    progress: Option<&dyn ProgressSink>,
) -> LauncherResult<()> {
    let staged = staging_path(&task.dest);
    if let Err(e) = fetcher.fetch(&task.url, &staged, progress).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(e);
    }

    if !check(&staged, task).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(LauncherError::IntegrityMismatch {
            label: task.label.clone(),
            path: task.dest.clone(),
        });
    }

    if let Err(e) = tokio::fs::rename(&staged, &task.dest).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(LauncherError::io(&task.dest, e));
    }
    Ok(())
}

/// Runs [`verify_or_fetch`] over `tasks` with at most `concurrency` in flight.
/// Individual failures are logged and returned; they never abort the batch.
pub async fn verify_or_fetch_all(
    fetcher: &dyn ArtifactFetcher,
    tasks: Vec<DownloadTask>,
    concurrency: usize,
    progress: Option<&dyn ProgressSink>,
) -> Vec<(DownloadTask, LauncherError)> {
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }

    let failures: Vec<(DownloadTask, LauncherError)> = stream::iter(tasks)
        .map(|task| async move {
            let result = verify_or_fetch(fetcher, &task, progress).await;
            (task, result)
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|(task, result)| async move {
            match result {
                Ok(_) => None,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", task.label, e);
                    Some((task, e))
                }
            }
        })
        .collect()
        .await;

    info!(
        "Verified {} artifacts ({} failed)",
        total,
        failures.len()
    );
    failures
}

async fn check(path: &Path, task: &DownloadTask) -> bool {
    let dest = path.to_path_buf();
    let sha1 = task.sha1.clone();
    let size = task.size;
    tokio::task::spawn_blocking(move || is_valid(&dest, &sha1, size))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::core::downloader::client::Downloader;
    use crate::core::downloader::test_support::MemoryFetcher;
    use crate::core::downloader::verify::{is_valid, sha1_hex};
    use crate::core::http::build_http_client;

    fn task_for(dir: &std::path::Path, name: &str, body: &[u8]) -> DownloadTask {
        DownloadTask {
            url: format!("mem://{name}"),
            dest: dir.join(name),
            sha1: sha1_hex(body),
            size: body.len() as u64,
            label: name.to_string(),
        }
    }

    #[tokio::test]
    async fn valid_files_are_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::default().with("mem://a.jar", b"alpha");
        let task = task_for(dir.path(), "a.jar", b"alpha");

        let first = verify_or_fetch(&fetcher, &task, None).await.unwrap();
        let second = verify_or_fetch(&fetcher, &task, None).await.unwrap();

        assert_eq!(first, FetchOutcome::Downloaded);
        assert_eq!(second, FetchOutcome::AlreadyValid);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_download_is_removed_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::default().with("mem://a.jar", b"tampered");
        let task = task_for(dir.path(), "a.jar", b"original");

        let err = verify_or_fetch(&fetcher, &task, None).await.unwrap_err();

        assert!(matches!(err, LauncherError::IntegrityMismatch { .. }));
        assert!(!task.dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_the_published_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::default().with("mem://a.jar", b"tampered");
        let task = task_for(dir.path(), "a.jar", b"original");
        std::fs::write(&task.dest, b"stale").unwrap();

        let err = verify_or_fetch(&fetcher, &task, None).await.unwrap_err();

        assert!(matches!(err, LauncherError::IntegrityMismatch { .. }));
        assert_eq!(std::fs::read(&task.dest).unwrap(), b"stale");
    }

    #[tokio::test]
    async fn concurrent_fetches_of_one_artifact_both_succeed() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        Mock::given(method("GET"))
            .and(path("/shared.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let client = build_http_client(Duration::from_secs(5), Duration::from_secs(30)).unwrap();
        let downloader = Downloader::new(client);
        let dir = tempfile::tempdir().unwrap();
        let task = DownloadTask {
            url: format!("{}/shared.jar", server.uri()),
            dest: dir.path().join("libraries").join("shared.jar"),
            sha1: sha1_hex(&body),
            size: body.len() as u64,
            label: "shared.jar".into(),
        };

        for _ in 0..5 {
            let _ = std::fs::remove_file(&task.dest);
            let (a, b) = tokio::join!(
                verify_or_fetch(&downloader, &task, None),
                verify_or_fetch(&downloader, &task, None)
            );

            assert!(a.is_ok(), "{a:?}");
            assert!(b.is_ok(), "{b:?}");
            assert!(is_valid(&task.dest, &task.sha1, task.size));
            let entries = std::fs::read_dir(task.dest.parent().unwrap()).unwrap().count();
            assert_eq!(entries, 1);
        }
    }

    #[derive(Default)]
    struct CountingProgress {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ProgressSink for CountingProgress {
        fn on_file_changed(&self, _label: &str) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_progress(&self, _done: u64, _total: u64) {}
        fn on_file_finished(&self, _label: &str) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn every_started_file_is_reported_finished() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::default().with("mem://a.jar", b"alpha");
        let present = task_for(dir.path(), "c.jar", b"gamma");
        std::fs::write(&present.dest, b"gamma").unwrap();
        let tasks = vec![
            task_for(dir.path(), "a.jar", b"alpha"),
            task_for(dir.path(), "b.jar", b"beta"),
            present,
        ];
        let progress = CountingProgress::default();

        let failures = verify_or_fetch_all(&fetcher, tasks, 3, Some(&progress)).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(progress.started.load(Ordering::SeqCst), 2);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn batch_collects_failures_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::default()
            .with("mem://a.jar", b"alpha")
            .with("mem://c.jar", b"gamma");
        let tasks = vec![
            task_for(dir.path(), "a.jar", b"alpha"),
            task_for(dir.path(), "b.jar", b"beta"),
            task_for(dir.path(), "c.jar", b"gamma"),
        ];

        let failures = verify_or_fetch_all(&fetcher, tasks, 2, None).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.label, "b.jar");
        assert!(dir.path().join("a.jar").exists());
        assert!(dir.path().join("c.jar").exists());
    }
}
