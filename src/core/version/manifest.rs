// ─── Version Catalog ───
// Loads the remote version manifest, caches a bounded list of records and
// resolves version ids to descriptor URLs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::downloader::{file_sha1, ArtifactFetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::GameLayout;

pub const DEFAULT_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

pub const DEFAULT_MAX_CACHED_VERSIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
    #[serde(other)]
    Unknown,
}

impl VersionType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "release" => VersionType::Release,
            "snapshot" => VersionType::Snapshot,
            "old_beta" => VersionType::OldBeta,
            "old_alpha" => VersionType::OldAlpha,
            _ => VersionType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Release => "release",
            VersionType::Snapshot => "snapshot",
            VersionType::OldBeta => "old_beta",
            VersionType::OldAlpha => "old_alpha",
            VersionType::Unknown => "unknown",
        }
    }

    /// Prefix shown before the id in listings.
    pub fn label_prefix(&self) -> Option<&'static str> {
        match self {
            VersionType::Release => Some("Minecraft"),
            VersionType::Snapshot => Some("Snapshot"),
            VersionType::OldBeta => Some("Beta"),
            VersionType::OldAlpha => Some("Alpha"),
            VersionType::Unknown => None,
        }
    }

    pub fn display_name(&self, id: &str) -> String {
        match self.label_prefix() {
            Some(prefix) => format!("{prefix} {id}"),
            None => id.to_string(),
        }
    }
}

/// A single manifest entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    pub url: String,
    /// Build timestamp.
    #[serde(default)]
    pub time: String,
    #[serde(rename = "releaseTime", default)]
    pub release_time: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionRecord {
    pub fn display_name(&self) -> String {
        self.version_type.display_name(&self.id)
    }

    pub fn released_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.release_time).ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LatestVersions {
    release: String,
    snapshot: String,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    latest: Option<LatestVersions>,
    versions: Vec<VersionRecord>,
}

/// One fully parsed manifest. Swapped in whole, never mutated.
#[derive(Debug)]
struct CatalogSnapshot {
    records: Vec<VersionRecord>,
    latest: Option<LatestVersions>,
}

impl CatalogSnapshot {
    fn parse(raw: &[u8], max_cached: usize) -> LauncherResult<Self> {
        let document: ManifestDocument = serde_json::from_slice(raw)?;
        let mut records = document.versions;
        // Newest first; dropping the tail drops the oldest.
        records.truncate(max_cached);
        Ok(Self {
            records,
            latest: document.latest,
        })
    }

    fn find(&self, id: &str) -> Option<&VersionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn latest_of(&self, wanted: VersionType, id: Option<&str>) -> Option<&VersionRecord> {
        id.and_then(|id| self.find(id))
            .or_else(|| self.records.iter().find(|r| r.version_type == wanted))
    }
}

/// Owned, shareable catalog of known versions.
///
/// Readers always see a complete snapshot: loads happen outside the cache
/// lock and are published with a single swap.
pub struct VersionCatalog {
    fetcher: Arc<dyn ArtifactFetcher>,
    manifest_url: String,
    manifest_path: PathBuf,
    max_cached: usize,
    cache: RwLock<Option<Arc<CatalogSnapshot>>>,
    load_guard: Mutex<()>,
}

impl VersionCatalog {
    pub fn new(
        fetcher: Arc<dyn ArtifactFetcher>,
        manifest_url: impl Into<String>,
        manifest_path: impl Into<PathBuf>,
        max_cached: usize,
    ) -> Self {
        Self {
            fetcher,
            manifest_url: manifest_url.into(),
            manifest_path: manifest_path.into(),
            max_cached: max_cached.max(1),
            cache: RwLock::new(None),
            load_guard: Mutex::new(()),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub async fn resolve(&self, version_id: &str) -> LauncherResult<VersionRecord> {
        self.snapshot()
            .await?
            .find(version_id)
            .cloned()
            .ok_or_else(|| LauncherError::VersionNotFound(version_id.to_string()))
    }

    pub async fn latest_release(&self) -> LauncherResult<VersionRecord> {
        let snapshot = self.snapshot().await?;
        let id = snapshot.latest.as_ref().map(|l| l.release.as_str());
        snapshot
            .latest_of(VersionType::Release, id)
            .cloned()
            .ok_or_else(|| LauncherError::VersionNotFound("latest release".into()))
    }

    pub async fn latest_snapshot(&self) -> LauncherResult<VersionRecord> {
        let snapshot = self.snapshot().await?;
        let id = snapshot.latest.as_ref().map(|l| l.snapshot.as_str());
        snapshot
            .latest_of(VersionType::Snapshot, id)
            .cloned()
            .ok_or_else(|| LauncherError::VersionNotFound("latest snapshot".into()))
    }

    /// Cached records in manifest order.
    pub async fn versions(&self) -> LauncherResult<Vec<VersionRecord>> {
        Ok(self.snapshot().await?.records.clone())
    }

    pub async fn versions_by_type(
        &self,
        version_type: VersionType,
    ) -> LauncherResult<Vec<VersionRecord>> {
        Ok(self
            .snapshot()
            .await?
            .records
            .iter()
            .filter(|r| r.version_type == version_type)
            .cloned()
            .collect())
    }

    /// Drop the cache; the next query re-parses the manifest file.
    pub fn invalidate(&self) {
        self.publish(None);
        debug!("Version catalog invalidated");
    }

    /// Re-download the manifest and replace the cache. On failure the
    /// previous cache and manifest file stay in place.
    pub async fn refresh(&self) -> LauncherResult<()> {
        let _guard = self.load_guard.lock().await;
        info!("Refreshing version manifest from {}", self.manifest_url);

        self.fetcher
            .fetch(&self.manifest_url, &self.manifest_path, None)
            .await?;
        let snapshot = self.parse_manifest_file().await?;
        self.publish(Some(Arc::new(snapshot)));
        Ok(())
    }

    /// Ensure `versions/<id>/<id>.json` exists and matches the manifest
    /// hash when one is given.
    pub async fn download_descriptor(
        &self,
        record: &VersionRecord,
        layout: &GameLayout,
    ) -> LauncherResult<PathBuf> {
        let dest = layout.descriptor_path(&record.id);

        if dest.is_file() && descriptor_matches(&dest, record.sha1.as_deref()).await {
            debug!("Descriptor for {} already present", record.id);
            return Ok(dest);
        }

        info!("Downloading descriptor for {}", record.id);
        self.fetcher.fetch(&record.url, &dest, None).await?;

        if !descriptor_matches(&dest, record.sha1.as_deref()).await {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(LauncherError::IntegrityMismatch {
                label: format!("{}.json", record.id),
                path: dest,
            });
        }

        Ok(dest)
    }

    async fn snapshot(&self) -> LauncherResult<Arc<CatalogSnapshot>> {
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }

        let _guard = self.load_guard.lock().await;
        // Another caller may have loaded while we waited.
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }

        if !self.manifest_path.is_file() {
            info!("Version manifest not found locally, downloading");
            self.fetcher
                .fetch(&self.manifest_url, &self.manifest_path, None)
                .await?;
        }

        let snapshot = Arc::new(self.parse_manifest_file().await?);
        self.publish(Some(snapshot.clone()));
        Ok(snapshot)
    }

    async fn parse_manifest_file(&self) -> LauncherResult<CatalogSnapshot> {
        let raw = tokio::fs::read(&self.manifest_path)
            .await
            .map_err(|e| LauncherError::io(&self.manifest_path, e))?;
        let snapshot = CatalogSnapshot::parse(&raw, self.max_cached)?;
        info!("Loaded {} versions from manifest", snapshot.records.len());
        Ok(snapshot)
    }

    fn cached(&self) -> Option<Arc<CatalogSnapshot>> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, snapshot: Option<Arc<CatalogSnapshot>>) {
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
    }
}

async fn descriptor_matches(path: &Path, expected_sha1: Option<&str>) -> bool {
    let Some(expected) = expected_sha1 else {
        return path.is_file();
    };
    let path = path.to_path_buf();
    let expected = expected.to_string();
    tokio::task::spawn_blocking(move || match file_sha1(&path) {
        Ok(actual) => actual.eq_ignore_ascii_case(&expected),
        Err(e) => {
            warn!("Cannot hash {:?}: {}", path, e);
            false
        }
    })
    .await
    .unwrap_or(false)
}
