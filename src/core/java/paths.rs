use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

pub fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Picks the Java executable to launch with.
///
/// Order: the configured path (a JDK home directory maps to `bin/java`, a
/// file is used as is), then `JAVA_HOME`, then the first `java` on `PATH`.
/// The result is not checked for existence; the supervisor does that before
/// spawning.
pub fn resolve_java_executable(configured: Option<&Path>) -> PathBuf {
    resolve_with(
        configured,
        std::env::var_os("JAVA_HOME"),
        std::env::var_os("PATH"),
    )
}

fn resolve_with(
    configured: Option<&Path>,
    java_home: Option<OsString>,
    search_path: Option<OsString>,
) -> PathBuf {
    if let Some(path) = configured.filter(|p| !p.as_os_str().is_empty()) {
        let resolved = if path.is_dir() {
            path.join("bin").join(java_exe())
        } else {
            path.to_path_buf()
        };
        debug!("Using configured Java: {:?}", resolved);
        return resolved;
    }

    if let Some(home) = java_home.filter(|h| !h.is_empty()) {
        let candidate = PathBuf::from(home).join("bin").join(java_exe());
        if candidate.is_file() {
            debug!("Using JAVA_HOME Java: {:?}", candidate);
            return candidate;
        }
    }

    if let Some(search_path) = search_path {
        for dir in std::env::split_paths(&search_path) {
            let candidate = dir.join(java_exe());
            if candidate.is_file() {
                debug!("Using Java from PATH: {:?}", candidate);
                return candidate;
            }
        }
    }

    PathBuf::from(java_exe())
}
