// ─── Dependency Resolver & Classpath Builder ───
// Downloads everything a version needs and assembles the ordered classpath.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::assets::{download_assets, DEFAULT_ASSETS_BASE_URL};
use crate::core::downloader::{verify_or_fetch, verify_or_fetch_all, ArtifactFetcher, DownloadTask};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::GameLayout;
use crate::core::sinks::ProgressSink;
use crate::core::version::{Platform, VersionDescriptor};

/// Below this many classpath entries the libraries root is scanned as well.
pub const FALLBACK_SCAN_THRESHOLD: usize = 10;

/// File-name marker of native-only jars, never put on the classpath by the scan.
const NATIVES_MARKER: &str = "natives-";

pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 8;

/// Platform-specific Java classpath separator.
pub fn classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// An optional artifact that could not be made valid. Resolution continues
/// without it.
#[derive(Debug)]
pub struct PartialFailure {
    pub label: String,
    pub error: LauncherError,
}

#[derive(Debug, Default)]
pub struct Resolution {
    /// Client jar first, then libraries in descriptor order.
    pub classpath: Vec<PathBuf>,
    pub failures: Vec<PartialFailure>,
}

impl Resolution {
    pub fn classpath_string(&self) -> String {
        join_classpath(&self.classpath)
    }
}

pub fn join_classpath(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|p| safe_path_str(p))
        .collect::<Vec<_>>()
        .join(classpath_separator())
}

#[derive(Clone)]
pub struct DependencyResolver {
    fetcher: Arc<dyn ArtifactFetcher>,
    layout: GameLayout,
    platform: Platform,
    assets_base_url: String,
    concurrency: usize,
}

impl DependencyResolver {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>, layout: GameLayout, platform: Platform) -> Self {
        Self {
            fetcher,
            layout,
            platform,
            assets_base_url: DEFAULT_ASSETS_BASE_URL.to_string(),
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }

    pub fn with_assets_base_url(mut self, url: impl Into<String>) -> Self {
        self.assets_base_url = url.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    /// Verify or fetch the client jar, libraries, natives and (optionally)
    /// assets, then build the classpath.
    ///
    /// The client jar is required: any failure on it is returned as an error.
    /// Everything else is best-effort and reported in [`Resolution::failures`].
    pub async fn resolve_and_download(
        &self,
        descriptor: &VersionDescriptor,
        version_id: &str,
        include_assets: bool,
        progress: Option<&dyn ProgressSink>,
    ) -> LauncherResult<Resolution> {
        let fetcher = self.fetcher.as_ref();

        // ── 1. Client jar ──
        let client_jar = self.layout.client_jar(version_id);
        match descriptor.client_download() {
            Some(download) => {
                let task = DownloadTask {
                    url: download.url.clone(),
                    dest: client_jar.clone(),
                    sha1: download.sha1.clone(),
                    size: download.size,
                    label: format!("{version_id}.jar"),
                };
                verify_or_fetch(fetcher, &task, progress).await?;
            }
            None if client_jar.is_file() => {
                debug!("{} declares no client download; using local jar", version_id);
            }
            None => warn!("{} declares no client download and no jar is present", version_id),
        }

        // ── 2. Libraries and natives ──
        let tasks = self.library_tasks(descriptor);
        info!("Checking {} library artifacts for {}", tasks.len(), version_id);

        let mut resolution = Resolution::default();
        for (task, error) in verify_or_fetch_all(fetcher, tasks, self.concurrency, progress).await {
            resolution.failures.push(PartialFailure {
                label: task.label,
                error,
            });
        }

        // ── 3. Assets ──
        if include_assets {
            if let Some(index) = &descriptor.asset_index {
                match download_assets(
                    fetcher,
                    index,
                    &self.layout,
                    &self.assets_base_url,
                    self.concurrency,
                    progress,
                )
                .await
                {
                    Ok(failures) => {
                        resolution
                            .failures
                            .extend(failures.into_iter().map(|(task, error)| PartialFailure {
                                label: task.label,
                                error,
                            }))
                    }
                    Err(error) => {
                        warn!("Asset index {} unavailable: {}", index.id, error);
                        resolution.failures.push(PartialFailure {
                            label: format!("asset index {}", index.id),
                            error,
                        });
                    }
                }
            }
        }

        // ── 4. Classpath, in descriptor order regardless of completion order ──
        resolution.classpath = build_classpath(descriptor, version_id, &self.layout, &self.platform);

        if !resolution.failures.is_empty() {
            warn!(
                "{} artifacts for {} could not be verified",
                resolution.failures.len(),
                version_id
            );
        }
        Ok(resolution)
    }

    /// Primary artifacts in descriptor order followed by their natives, one
    /// task per destination.
    fn library_tasks(&self, descriptor: &VersionDescriptor) -> Vec<DownloadTask> {
        let mut seen = HashSet::new();
        let mut tasks = Vec::new();

        for lib in &descriptor.libraries {
            if !lib.is_allowed(&self.platform) {
                debug!("Skipping library (rule): {}", lib.name);
                continue;
            }

            let artifacts = lib
                .artifact()
                .into_iter()
                .chain(lib.native_artifact(&self.platform));
            for artifact in artifacts {
                let dest = self.layout.library_path(&artifact.path);
                if !seen.insert(dest.clone()) {
                    continue;
                }
                tasks.push(DownloadTask {
                    url: artifact.url.clone(),
                    dest,
                    sha1: artifact.sha1.clone(),
                    size: artifact.size,
                    label: lib.name.clone(),
                });
            }
        }

        tasks
    }
}

/// Classpath from what is on disk: the client jar, then every allowed
/// library's primary `.jar` that exists, in descriptor order. Natives are
/// never included. A sparse result is topped up by scanning `libraries/`.
pub fn build_classpath(
    descriptor: &VersionDescriptor,
    version_id: &str,
    layout: &GameLayout,
    platform: &Platform,
) -> Vec<PathBuf> {
    let mut entries = vec![layout.client_jar(version_id)];
    let mut seen: HashSet<PathBuf> = entries.iter().cloned().collect();

    for lib in &descriptor.libraries {
        if !lib.is_allowed(platform) {
            continue;
        }
        let Some(artifact) = lib.artifact() else {
            continue;
        };
        let path = layout.library_path(&artifact.path);
        if path.is_file() && is_jar(&path) && seen.insert(path.clone()) {
            entries.push(path);
        }
    }

    if entries.len() < FALLBACK_SCAN_THRESHOLD {
        warn!(
            "Only {} classpath entries for {}, scanning libraries directory",
            entries.len(),
            version_id
        );
        let mut added = 0;
        for jar in scan_library_jars(&layout.libraries_dir()) {
            if seen.insert(jar.clone()) {
                entries.push(jar);
                added += 1;
            }
        }
        info!("Added {} libraries from fallback scan", added);
    }

    debug!("Classpath for {} has {} entries", version_id, entries.len());
    entries
}

/// Every non-native `.jar` under `root`, sorted for a stable order.
fn scan_library_jars(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut jars: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_jar(path))
        .filter(|path| {
            !path
                .file_name()
                .map(|n| n.to_string_lossy().contains(NATIVES_MARKER))
                .unwrap_or(false)
        })
        .collect();
    jars.sort();
    jars
}

fn is_jar(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
}

/// Absolute path text for the JVM, without the `\\?\` prefix Windows adds on
/// canonicalization.
pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::core::downloader::sha1_hex;
    use crate::core::downloader::test_support::MemoryFetcher;

    fn linux() -> Platform {
        Platform::new("linux", "amd64")
    }

    fn library(name: &str, path: &str, body: &[u8], rules: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "downloads": {
                "artifact": {
                    "path": path,
                    "sha1": sha1_hex(body),
                    "size": body.len(),
                    "url": format!("mem://lib/{path}")
                }
            },
            "rules": rules
        })
    }

    fn descriptor(libraries: Vec<serde_json::Value>, client: &[u8]) -> VersionDescriptor {
        serde_json::from_value(serde_json::json!({
            "mainClass": "net.minecraft.client.main.Main",
            "downloads": {
                "client": {"url": "mem://client.jar", "sha1": sha1_hex(client), "size": client.len()}
            },
            "libraries": libraries
        }))
        .unwrap()
    }

    fn write_jar(layout: &GameLayout, relative: &str) -> PathBuf {
        let path = layout.library_path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"jar").unwrap();
        path
    }

    #[tokio::test]
    async fn classpath_keeps_descriptor_order_and_skips_excluded_and_natives() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());

        let mut libraries = Vec::new();
        let mut fetcher = MemoryFetcher::default().with("mem://client.jar", b"client");
        for i in 0..12 {
            let path = format!("org/example/lib{i}/lib{i}.jar");
            let body = format!("library {i}");
            fetcher = fetcher.with(&format!("mem://lib/{path}"), body.as_bytes());
            let rules = if i == 3 {
                serde_json::json!([{"action": "allow", "os": {"name": "osx"}}, {"action": "disallow", "os": {"name": "linux"}}])
            } else {
                serde_json::Value::Null
            };
            libraries.push(library(&format!("org.example:lib{i}:1"), &path, body.as_bytes(), rules));
        }
        libraries.push(serde_json::json!({
            "name": "org.lwjgl:lwjgl-platform:2.9.4",
            "natives": {"linux": "natives-linux"},
            "downloads": {"classifiers": {"natives-linux": {
                "path": "org/lwjgl/platform-natives-linux.jar",
                "sha1": sha1_hex(b"native"), "size": 6,
                "url": "mem://lib/natives.jar"
            }}}
        }));
        let fetcher = Arc::new(fetcher.with("mem://lib/natives.jar", b"native"));

        let resolver = DependencyResolver::new(fetcher.clone(), layout.clone(), linux())
            .with_concurrency(3);
        let resolution = resolver
            .resolve_and_download(&descriptor(libraries, b"client"), "1.0", false, None)
            .await
            .unwrap();

        assert!(resolution.failures.is_empty());
        assert_eq!(resolution.classpath[0], layout.client_jar("1.0"));
        let expected: Vec<PathBuf> = (0..12)
            .filter(|i| *i != 3)
            .map(|i| layout.library_path(&format!("org/example/lib{i}/lib{i}.jar")))
            .collect();
        assert_eq!(&resolution.classpath[1..], expected.as_slice());
        assert!(layout
            .library_path("org/lwjgl/platform-natives-linux.jar")
            .is_file());

        // client + 11 libraries + 1 native
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 13);

        let joined = resolution.classpath_string();
        assert_eq!(joined.split(classpath_separator()).count(), 12);
    }

    #[tokio::test]
    async fn library_failures_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        let libraries = vec![
            library("a:present:1", "a/present.jar", b"present", serde_json::Value::Null),
            library("a:missing:1", "a/missing.jar", b"missing", serde_json::Value::Null),
        ];
        let fetcher = Arc::new(
            MemoryFetcher::default()
                .with("mem://client.jar", b"client")
                .with("mem://lib/a/present.jar", b"present"),
        );

        let resolution = DependencyResolver::new(fetcher, layout.clone(), linux())
            .resolve_and_download(&descriptor(libraries, b"client"), "1.0", false, None)
            .await
            .unwrap();

        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].label, "a:missing:1");
        assert!(resolution.classpath.contains(&layout.library_path("a/present.jar")));
        assert!(!resolution.classpath.contains(&layout.library_path("a/missing.jar")));
    }

    #[tokio::test]
    async fn corrupt_client_jar_aborts_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        let fetcher = Arc::new(MemoryFetcher::default().with("mem://client.jar", b"tampered"));

        let err = DependencyResolver::new(fetcher, layout.clone(), linux())
            .resolve_and_download(&descriptor(Vec::new(), b"client"), "1.0", false, None)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::IntegrityMismatch { .. }));
        assert!(!layout.client_jar("1.0").exists());
    }

    #[test]
    fn sparse_classpath_falls_back_to_scanning_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        let declared = write_jar(&layout, "z/declared.jar");
        let extra_b = write_jar(&layout, "b/extra.jar");
        let extra_a = write_jar(&layout, "a/extra.jar");
        write_jar(&layout, "n/lwjgl-natives-linux.jar");
        write_jar(&layout, "n/readme.txt");

        let descriptor = descriptor(
            vec![library("z:declared:1", "z/declared.jar", b"jar", serde_json::Value::Null)],
            b"client",
        );

        let classpath = build_classpath(&descriptor, "1.0", &layout, &linux());

        assert_eq!(
            classpath,
            vec![layout.client_jar("1.0"), declared, extra_a, extra_b]
        );
    }

    #[test]
    fn full_classpath_skips_fallback_scan() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        let mut libraries = Vec::new();
        for i in 0..9 {
            let path = format!("d/lib{i}.jar");
            write_jar(&layout, &path);
            libraries.push(library(&format!("d:lib{i}:1"), &path, b"jar", serde_json::Value::Null));
        }
        write_jar(&layout, "undeclared/extra.jar");

        let classpath = build_classpath(&descriptor(libraries, b"client"), "1.0", &layout, &linux());

        assert_eq!(classpath.len(), FALLBACK_SCAN_THRESHOLD);
        assert!(!classpath.contains(&layout.library_path("undeclared/extra.jar")));
    }
}
