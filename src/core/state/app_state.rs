use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::settings::LauncherSettings;
use crate::core::downloader::{ArtifactFetcher, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::instance::GameLayout;
use crate::core::launch::{DependencyResolver, ProcessSupervisor};
use crate::core::sinks::LogSink;
use crate::core::version::{Platform, VersionCatalog};

const APP_DIR_NAME: &str = "BlockLaunch";
const MANIFEST_FILE: &str = "version_manifest_v2.json";
const GAME_DIR_NAME: &str = "minecraft";

/// Everything a front end needs, constructed once and passed by reference.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: LauncherSettings,
    pub layout: GameLayout,
    pub platform: Platform,
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub catalog: VersionCatalog,
}

impl AppState {
    /// `data_dir` defaults to the platform data directory.
    pub fn new(data_dir: Option<PathBuf>) -> LauncherResult<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        std::fs::create_dir_all(&data_dir).map_err(|e| LauncherError::io(&data_dir, e))?;

        let settings = LauncherSettings::load_or_default(&data_dir);
        let client = build_http_client(settings.connect_timeout(), settings.read_timeout())?;
        let fetcher: Arc<dyn ArtifactFetcher> = Arc::new(Downloader::new(client));
        Ok(Self::with_fetcher(data_dir, settings, fetcher))
    }

    pub fn with_fetcher(
        data_dir: PathBuf,
        settings: LauncherSettings,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        let layout = GameLayout::new(data_dir.join(GAME_DIR_NAME));
        let catalog = VersionCatalog::new(
            fetcher.clone(),
            settings.manifest_url.clone(),
            data_dir.join(MANIFEST_FILE),
            settings.max_cached_versions,
        );
        info!("Data directory: {:?}", data_dir);

        Self {
            data_dir,
            settings,
            layout,
            platform: Platform::current(),
            fetcher,
            catalog,
        }
    }

    pub fn resolver(&self) -> DependencyResolver {
        DependencyResolver::new(self.fetcher.clone(), self.layout.clone(), self.platform.clone())
            .with_assets_base_url(self.settings.assets_base_url.clone())
            .with_concurrency(self.settings.download_concurrency)
    }

    pub fn supervisor(&self, log_sink: Arc<dyn LogSink>) -> ProcessSupervisor {
        ProcessSupervisor::new(log_sink).with_grace(self.settings.early_exit_grace())
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
