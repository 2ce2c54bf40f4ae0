use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::downloader::{verify_or_fetch, verify_or_fetch_all, ArtifactFetcher, DownloadTask};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::GameLayout;
use crate::core::sinks::ProgressSink;
use crate::core::version::AssetIndexInfo;

pub const DEFAULT_ASSETS_BASE_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    pub fn load(path: &Path) -> LauncherResult<Self> {
        let raw = std::fs::read(path).map_err(|e| LauncherError::io(path, e))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// One task per distinct object hash; names sharing a hash share a file.
    pub fn object_tasks(&self, layout: &GameLayout, base_url: &str) -> Vec<DownloadTask> {
        let mut seen = BTreeSet::new();
        self.objects
            .iter()
            .filter(|(_, object)| object.hash.len() > 2 && seen.insert(object.hash.clone()))
            .map(|(name, object)| DownloadTask {
                url: object_url(base_url, &object.hash),
                dest: layout.asset_object_path(&object.hash),
                sha1: object.hash.clone(),
                size: object.size,
                label: name.clone(),
            })
            .collect()
    }
}

/// `<base>/<hash[0:2]>/<hash>`
pub fn object_url(base_url: &str, hash: &str) -> String {
    let shard = hash.get(..2).unwrap_or(hash);
    format!("{}/{}/{}", base_url.trim_end_matches('/'), shard, hash)
}

/// Makes sure `assets/indexes/<id>.json` is present and, when the descriptor
/// carries a hash and size, valid.
pub async fn ensure_index(
    fetcher: &dyn ArtifactFetcher,
    info: &AssetIndexInfo,
    layout: &GameLayout,
    progress: Option<&dyn ProgressSink>,
) -> LauncherResult<AssetIndex> {
    let dest = layout.asset_index_path(&info.id);

    match (&info.sha1, info.size) {
        (Some(sha1), Some(size)) => {
            let task = DownloadTask {
                url: info.url.clone(),
                dest: dest.clone(),
                sha1: sha1.clone(),
                size,
                label: format!("asset index {}", info.id),
            };
            verify_or_fetch(fetcher, &task, progress).await?;
        }
        _ => {
            if !dest.is_file() {
                warn!("Asset index {} has no hash; fetching unverified", info.id);
                fetcher.fetch(&info.url, &dest, progress).await?;
            }
        }
    }

    AssetIndex::load(&dest)
}

/// Fetch the index and every object it references that is not already valid.
/// Object failures are returned; an index failure is an error.
pub async fn download_assets(
    fetcher: &dyn ArtifactFetcher,
    info: &AssetIndexInfo,
    layout: &GameLayout,
    base_url: &str,
    concurrency: usize,
    progress: Option<&dyn ProgressSink>,
) -> LauncherResult<Vec<(DownloadTask, LauncherError)>> {
    let index = ensure_index(fetcher, info, layout, progress).await?;
    let tasks = index.object_tasks(layout, base_url);

    info!(
        "Checking {} asset objects for index {}",
        tasks.len(),
        info.id
    );

    let failures = verify_or_fetch_all(fetcher, tasks, concurrency, progress).await;
    if !failures.is_empty() {
        warn!("{} asset downloads failed", failures.len());
    }
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::core::downloader::sha1_hex;
    use crate::core::downloader::test_support::MemoryFetcher;
    use crate::core::downloader::is_valid;

    #[test]
    fn object_url_is_sharded_by_hash_prefix() {
        assert_eq!(
            object_url("https://res.example/", "abcdef"),
            "https://res.example/ab/abcdef"
        );
    }

    #[tokio::test]
    async fn downloads_index_and_objects_into_sharded_layout() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());

        let sound = b"sound bytes";
        let texture = b"texture bytes";
        let (sound_hash, texture_hash) = (sha1_hex(sound), sha1_hex(texture));
        let index_body = serde_json::json!({
            "objects": {
                "minecraft/sounds/a.ogg": {"hash": sound_hash, "size": sound.len()},
                "minecraft/sounds/a-copy.ogg": {"hash": sound_hash, "size": sound.len()},
                "minecraft/textures/b.png": {"hash": texture_hash, "size": texture.len()}
            }
        })
        .to_string();

        let fetcher = MemoryFetcher::default()
            .with("mem://index/5.json", index_body.as_bytes())
            .with(&object_url("mem://res", &sound_hash), sound)
            .with(&object_url("mem://res", &texture_hash), texture);
        let info = AssetIndexInfo {
            id: "5".into(),
            url: "mem://index/5.json".into(),
            sha1: Some(sha1_hex(index_body.as_bytes())),
            size: Some(index_body.len() as u64),
            total_size: None,
        };

        let failures = download_assets(&fetcher, &info, &layout, "mem://res", 4, None)
            .await
            .unwrap();

        assert!(failures.is_empty());
        assert!(layout.asset_index_path("5").is_file());
        assert!(is_valid(
            &layout.asset_object_path(&sound_hash),
            &sound_hash,
            sound.len() as u64
        ));
        // index + two distinct objects
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);

        download_assets(&fetcher, &info, &layout, "mem://res", 4, None)
            .await
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn missing_object_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        let index_body = r#"{"objects":{"lost.png":{"hash":"ffeeddccbbaa99887766554433221100ffeeddcc","size":4}}}"#;
        let fetcher = MemoryFetcher::default().with("mem://i.json", index_body.as_bytes());
        let info = AssetIndexInfo {
            id: "i".into(),
            url: "mem://i.json".into(),
            sha1: None,
            size: None,
            total_size: None,
        };

        let failures = download_assets(&fetcher, &info, &layout, "mem://res", 2, None)
            .await
            .unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.label, "lost.png");
    }
}
