// ─── Integrity Verifier ───
// Size-then-SHA-1 validation of files on disk.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

/// Files at or above this size are trusted on size alone; hashing them on
/// every launch costs more than it protects.
pub const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Returns `true` when `path` exists, has exactly `expected_size` bytes and,
/// below [`LARGE_FILE_THRESHOLD`], hashes to `expected_sha1`
/// (case-insensitive). Read-only; safe to call concurrently.
pub fn is_valid(path: &Path, expected_sha1: &str, expected_size: u64) -> bool {
    let actual_size = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return false,
    };

    if actual_size != expected_size {
        debug!(
            "Size mismatch for {:?}: expected {}, got {}",
            path, expected_size, actual_size
        );
        return false;
    }

    if expected_size >= LARGE_FILE_THRESHOLD {
        debug!("Skipping SHA-1 for large file {:?}", path);
        return true;
    }

    match file_sha1(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected_sha1) => true,
        Ok(actual) => {
            warn!(
                "SHA-1 mismatch for {:?}: expected {}, got {}",
                path, expected_sha1, actual
            );
            false
        }
        Err(e) => {
            warn!("Cannot hash {:?}: {}", path, e);
            false
        }
    }
}

/// Lowercase hex SHA-1 of a file, streamed.
pub fn file_sha1(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha1::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex SHA-1 of an in-memory buffer.
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}
