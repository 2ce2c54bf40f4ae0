// ─── Installed Versions ───
// Scans `versions/` for locally present versions.

use std::fmt;

use tracing::{debug, info, warn};

use super::layout::GameLayout;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{VersionDescriptor, VersionType};

/// A version folder that holds a readable descriptor.
#[derive(Debug, Clone)]
pub struct InstalledVersion {
    pub id: String,
    pub version_type: VersionType,
    pub main_class: String,
    pub asset_index: String,
    pub release_time: Option<String>,
    pub has_jar: bool,
}

impl InstalledVersion {
    pub fn display_name(&self) -> String {
        self.version_type.display_name(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Complete,
    DescriptorOnly,
    JarOnly,
    Missing,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DownloadStatus::Complete => "Fully downloaded",
            DownloadStatus::DescriptorOnly => "JSON only (missing JAR)",
            DownloadStatus::JarOnly => "JAR only (missing JSON)",
            DownloadStatus::Missing => "Not downloaded",
        };
        f.write_str(text)
    }
}

pub fn download_status(layout: &GameLayout, version_id: &str) -> DownloadStatus {
    let json = layout.descriptor_path(version_id).is_file();
    let jar = layout.client_jar(version_id).is_file();
    match (json, jar) {
        (true, true) => DownloadStatus::Complete,
        (true, false) => DownloadStatus::DescriptorOnly,
        (false, true) => DownloadStatus::JarOnly,
        (false, false) => DownloadStatus::Missing,
    }
}

/// Every `versions/<id>/` containing a parseable `<id>.json`, sorted by id.
/// Unreadable descriptors are skipped with a warning.
pub fn scan_installed(layout: &GameLayout) -> LauncherResult<Vec<InstalledVersion>> {
    let versions_dir = layout.versions_dir();
    if !versions_dir.is_dir() {
        debug!("No versions directory at {:?}", versions_dir);
        return Ok(Vec::new());
    }

    let entries =
        std::fs::read_dir(&versions_dir).map_err(|e| LauncherError::io(&versions_dir, e))?;

    let mut found = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().to_string();
        let descriptor_path = layout.descriptor_path(&id);
        if !descriptor_path.is_file() {
            continue;
        }

        match VersionDescriptor::load(&descriptor_path) {
            Ok(descriptor) => {
                let version = InstalledVersion {
                    version_type: descriptor
                        .version_type
                        .as_deref()
                        .map(VersionType::from_label)
                        .unwrap_or(VersionType::Unknown),
                    main_class: descriptor.main_class.clone(),
                    asset_index: descriptor.asset_index_id().to_string(),
                    release_time: descriptor.release_time.clone(),
                    has_jar: layout.client_jar(&id).is_file(),
                    id,
                };
                debug!(
                    "Found version: {} (JAR: {})",
                    version.display_name(),
                    if version.has_jar { "yes" } else { "no" }
                );
                found.push(version);
            }
            Err(e) => warn!("Skipping {}: {}", id, e),
        }
    }

    found.sort_by(|a, b| a.id.cmp(&b.id));
    info!("Found {} installed versions", found.len());
    Ok(found)
}
