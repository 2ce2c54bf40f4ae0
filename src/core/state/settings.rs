use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::assets::DEFAULT_ASSETS_BASE_URL;
use crate::core::auth::DEFAULT_PLAYER_NAME;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::classpath::DEFAULT_DOWNLOAD_CONCURRENCY;
use crate::core::version::{DEFAULT_MANIFEST_URL, DEFAULT_MAX_CACHED_VERSIONS};

pub const SETTINGS_FILE: &str = "options.json";

/// What the launch pipeline needs from user preferences.
pub trait PreferencesProvider {
    fn memory_mb(&self) -> u32;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn java_path(&self) -> Option<&Path>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherSettings {
    pub memory: u32,
    pub width: u32,
    pub height: u32,
    pub auto_update_check: bool,
    /// A JDK home directory or a Java binary.
    pub java_path: Option<PathBuf>,
    pub player_name: String,
    pub manifest_url: String,
    pub assets_base_url: String,
    pub max_cached_versions: usize,
    pub download_concurrency: usize,
    pub early_exit_grace_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            memory: 2048,
            width: 854,
            height: 480,
            auto_update_check: true,
            java_path: None,
            player_name: DEFAULT_PLAYER_NAME.into(),
            manifest_url: DEFAULT_MANIFEST_URL.into(),
            assets_base_url: DEFAULT_ASSETS_BASE_URL.into(),
            max_cached_versions: DEFAULT_MAX_CACHED_VERSIONS,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            early_exit_grace_ms: 3000,
            connect_timeout_secs: 15,
            read_timeout_secs: 30,
        }
    }
}

impl LauncherSettings {
    /// Reads `options.json` from `data_dir`. A missing file is created with
    /// defaults; a malformed one is ignored with a warning.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring malformed settings at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = Self::default();
                match settings.save(data_dir) {
                    Ok(()) => info!("Created default settings at {:?}", path),
                    Err(e) => warn!("Could not write default settings: {}", e),
                }
                settings
            }
            Err(e) => {
                warn!("Cannot read settings at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        std::fs::create_dir_all(data_dir).map_err(|e| LauncherError::io(data_dir, e))?;
        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| LauncherError::io(&path, e))
    }

    pub fn early_exit_grace(&self) -> Duration {
        Duration::from_millis(self.early_exit_grace_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl PreferencesProvider for LauncherSettings {
    fn memory_mb(&self) -> u32 {
        self.memory
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn java_path(&self) -> Option<&Path> {
        self.java_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let settings = LauncherSettings::load_or_default(dir.path());

        assert_eq!(settings, LauncherSettings::default());
        assert_eq!(settings.memory_mb(), 2048);
        assert_eq!((settings.width(), settings.height()), (854, 480));
        assert!(dir.path().join(SETTINGS_FILE).is_file());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"memory": 4096, "javaPath": "/opt/jdk", "earlyExitGraceMs": 500}"#,
        )
        .unwrap();

        let settings = LauncherSettings::load_or_default(dir.path());

        assert_eq!(settings.memory, 4096);
        assert_eq!(settings.java_path(), Some(Path::new("/opt/jdk")));
        assert_eq!(settings.early_exit_grace(), Duration::from_millis(500));
        assert_eq!(settings.width, 854);
        assert_eq!(settings.max_cached_versions, DEFAULT_MAX_CACHED_VERSIONS);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ nope").unwrap();

        assert_eq!(
            LauncherSettings::load_or_default(dir.path()),
            LauncherSettings::default()
        );
    }

    #[test]
    fn save_round_trips_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LauncherSettings {
            player_name: "Alice".into(),
            ..LauncherSettings::default()
        };
        settings.save(dir.path()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(raw.contains("\"playerName\": \"Alice\""));
        assert_eq!(LauncherSettings::load_or_default(dir.path()), settings);
    }
}
