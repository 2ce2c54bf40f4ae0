pub mod client;
pub mod task;
pub mod verify;

pub use client::{ArtifactFetcher, Downloader};
pub use task::{verify_or_fetch, verify_or_fetch_all, DownloadTask, FetchOutcome};
pub use verify::{file_sha1, is_valid, sha1_hex, LARGE_FILE_THRESHOLD};
