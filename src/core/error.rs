use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("Integrity check failed for {label} at {path:?}")]
    IntegrityMismatch { label: String, path: PathBuf },

    // ── Catalog ─────────────────────────────────────────
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Version JSON not found: {0:?}")]
    VersionJsonMissing(PathBuf),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Java / process ──────────────────────────────────
    #[error("Java executable not found: {0:?}")]
    MissingJavaExecutable(PathBuf),

    #[error("Game process exited during startup (exit code: {})", display_code(.exit_code))]
    LaunchFailedEarly { exit_code: Option<i32> },

    #[error("Java execution failed: {0}")]
    JavaExecution(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Integrity,
    NotFound,
    Launch,
    Parse,
    Filesystem,
}

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::Http(_) | LauncherError::DownloadFailed { .. } => ErrorKind::Fetch,
            LauncherError::IntegrityMismatch { .. } => ErrorKind::Integrity,
            LauncherError::VersionNotFound(_) | LauncherError::VersionJsonMissing(_) => {
                ErrorKind::NotFound
            }
            LauncherError::MissingJavaExecutable(_)
            | LauncherError::LaunchFailedEarly { .. }
            | LauncherError::JavaExecution(_) => ErrorKind::Launch,
            LauncherError::Json(_) | LauncherError::Zip(_) => ErrorKind::Parse,
            LauncherError::Io { .. } | LauncherError::Other(_) => ErrorKind::Filesystem,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".into(),
    }
}
