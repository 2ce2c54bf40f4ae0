// ─── Native Stager ───
// Extracts native archives into `versions/<id>/natives/` before each launch.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::GameLayout;
use crate::core::version::{Platform, VersionDescriptor};

/// Clears the natives directory and extracts every applicable native archive
/// into it. Returns the natives directory.
///
/// A broken or missing archive is logged and skipped; the others are still
/// staged.
pub async fn stage_natives(
    descriptor: &VersionDescriptor,
    version_id: &str,
    layout: &GameLayout,
    platform: &Platform,
) -> LauncherResult<PathBuf> {
    let natives_dir = layout.natives_dir(version_id);
    tokio::fs::create_dir_all(&natives_dir)
        .await
        .map_err(|e| LauncherError::io(&natives_dir, e))?;

    clear_top_level(&natives_dir).await?;

    let archives: Vec<PathBuf> = descriptor
        .libraries
        .iter()
        .filter(|lib| lib.is_allowed(platform))
        .filter_map(|lib| lib.native_artifact(platform))
        .map(|artifact| layout.library_path(&artifact.path))
        .collect();

    let mut extracted = 0usize;
    for archive in archives {
        if !archive.is_file() {
            warn!("Native archive missing: {:?}", archive);
            continue;
        }

        let dest = natives_dir.clone();
        let source = archive.clone();
        match tokio::task::spawn_blocking(move || extract_archive(&source, &dest)).await {
            Ok(Ok(count)) => {
                debug!("Extracted {} entries from {:?}", count, archive);
                extracted += count;
            }
            Ok(Err(e)) => warn!("Failed to extract {:?}: {}", archive, e),
            Err(e) => warn!("Extraction task for {:?} failed: {}", archive, e),
        }
    }

    info!("Staged {} native files into {:?}", extracted, natives_dir);
    Ok(natives_dir)
}

/// Removes files and empty directories directly under `dir`. Non-empty
/// subdirectories are left in place.
async fn clear_top_level(dir: &Path) -> LauncherResult<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LauncherError::io(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LauncherError::io(dir, e))?
    {
        let path = entry.path();
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        let result = if is_dir {
            tokio::fs::remove_dir(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        if let Err(e) = result {
            debug!("Left stale native entry {:?}: {}", path, e);
        }
    }
    Ok(())
}

/// Every non-directory entry of the archive, written under `dest` with its
/// relative path. Entries escaping `dest` are skipped.
fn extract_archive(archive_path: &Path, dest: &Path) -> LauncherResult<usize> {
    let file = File::open(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe entry {:?} in {:?}", entry.name(), archive_path);
            continue;
        };

        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&out_path, e))?;
        count += 1;
    }

    Ok(count)
}
