use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::sinks::ProgressSink;

/// Anything that can materialize a URL at a local path.
///
/// The HTTP [`Downloader`] is the production implementation; resolver and
/// catalog only ever see this trait.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Replace `dest` with the body of `url`. Returns the number of bytes
    /// written. On error nothing is left at `dest`.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> LauncherResult<u64>;
}

/// Streaming HTTP downloader.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn stream_to(
        &self,
        url: &str,
        part: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> LauncherResult<u64> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        // Scope the handle so it is closed before the rename (Windows).
        {
            let mut file = tokio::fs::File::create(part)
                .await
                .map_err(|e| LauncherError::io(part, e))?;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(part, e))?;
                written += chunk.len() as u64;

                if let (Some(sink), Some(total)) = (progress, total_bytes) {
                    sink.on_progress(written, total);
                }
            }

            file.flush().await.map_err(|e| LauncherError::io(part, e))?;
        }

        Ok(written)
    }
}

#[async_trait]
impl ArtifactFetcher for Downloader {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> LauncherResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let part = staging_path(dest);
        let written = match self.stream_to(url, &part, progress).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, written);
        Ok(written)
    }
}

/// A fresh sibling of `dest` to stream into before it replaces `dest`.
/// Unique per call, so concurrent fetches of one artifact never share it.
pub(crate) fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.part", Uuid::new_v4().simple()));
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::core::downloader::verify::{is_valid, sha1_hex};
    use crate::core::http::build_http_client;

    #[derive(Default)]
    struct RecordingProgress {
        calls: Mutex<Vec<(u64, u64)>>,
    }

    impl ProgressSink for RecordingProgress {
        fn on_file_changed(&self, _label: &str) {}
        fn on_progress(&self, done: u64, total: u64) {
            self.calls.lock().unwrap().push((done, total));
        }
    }

    fn leftover_parts(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "part"))
            .collect()
    }

    fn downloader() -> Downloader {
        let client = build_http_client(Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        Downloader::new(client)
    }

    #[tokio::test]
    async fn fetch_writes_body_creates_parents_and_reports_progress() {
        let server = MockServer::start().await;
        let body = vec![7u8; 20_000];
        Mock::given(method("GET"))
            .and(path("/lib.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("deeper").join("lib.jar");
        let progress = RecordingProgress::default();

        let written = downloader()
            .fetch(&format!("{}/lib.jar", server.uri()), &dest, Some(&progress))
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert!(is_valid(&dest, &sha1_hex(&body), body.len() as u64));
        assert!(leftover_parts(dest.parent().unwrap()).is_empty());

        let calls = progress.calls.lock().unwrap();
        assert!(!calls.is_empty());
        assert_eq!(calls.last().copied(), Some((20_000, 20_000)));
        assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn fetch_replaces_existing_contents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("index.json");
        std::fs::write(&dest, b"stale contents that are longer").unwrap();

        downloader()
            .fetch(&format!("{}/index.json", server.uri()), &dest, None)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "{}");
    }

    #[tokio::test]
    async fn non_success_status_is_a_download_error_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jar"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.jar");

        let err = downloader()
            .fetch(&format!("{}/missing.jar", server.uri()), &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
        assert!(!dest.exists());
        assert!(leftover_parts(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn missing_content_length_skips_progress_but_succeeds() {
        let server = MockServer::start().await;
        let body = b"streamed without a length".to_vec();
        Mock::given(method("GET"))
            .and(path("/chunked.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("transfer-encoding", "chunked")
                    .set_body_raw(body.clone(), "application/json"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("chunked.json");
        let progress = RecordingProgress::default();

        let written = downloader()
            .fetch(&format!("{}/chunked.json", server.uri()), &dest, Some(&progress))
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(progress.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn staging_paths_are_unique_siblings() {
        let dest = Path::new("/tmp/libraries/a/b.jar");
        let first = staging_path(dest);
        let second = staging_path(dest);

        assert_ne!(first, second);
        assert_eq!(first.parent(), dest.parent());
        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("b.jar.") && name.ends_with(".part"));
    }
}
