// ─── Command Handlers ───
// Front-end agnostic entry points. Each takes the shared `AppState` and
// returns plain serializable results; the CLI in `main.rs` only formats them.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::core::auth::OfflineProfile;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{download_status, scan_installed};
use crate::core::java::resolve_java_executable;
use crate::core::launch::{stage_natives, CommandBuilder, LaunchPlan, LaunchRequest, RunningInstance};
use crate::core::sinks::{LogSink, ProgressSink};
use crate::core::state::{AppState, PreferencesProvider};
use crate::core::version::{VersionDescriptor, VersionRecord, VersionType};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub id: String,
    pub version_type: &'static str,
    pub release_time: String,
    pub display_name: String,
}

impl From<&VersionRecord> for VersionInfo {
    fn from(record: &VersionRecord) -> Self {
        Self {
            id: record.id.clone(),
            version_type: record.version_type.as_str(),
            release_time: record.release_time.clone(),
            display_name: record.display_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestVersions {
    pub release: Option<VersionInfo>,
    pub snapshot: Option<VersionInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledVersionInfo {
    pub id: String,
    pub display_name: String,
    pub version_type: &'static str,
    pub main_class: String,
    pub asset_index: String,
    pub status: String,
}

/// Outcome of installing or validating one version.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub version_id: String,
    pub classpath_entries: usize,
    /// Labels of artifacts that could not be verified.
    pub failures: Vec<String>,
    /// Set when the version could not be resolved at all.
    pub error: Option<String>,
}

impl InstallReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.failures.is_empty()
    }

    fn failed(version_id: &str, err: &LauncherError) -> Self {
        Self {
            version_id: version_id.to_string(),
            classpath_entries: 0,
            failures: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

/// Per-launch overrides; anything left `None` comes from the settings.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub version_id: String,
    pub player_name: Option<String>,
    pub memory_mb: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub java_path: Option<PathBuf>,
}

pub async fn list_versions(
    state: &AppState,
    filter: Option<VersionType>,
) -> LauncherResult<Vec<VersionInfo>> {
    let records = match filter {
        Some(version_type) => state.catalog.versions_by_type(version_type).await?,
        None => state.catalog.versions().await?,
    };
    Ok(records.iter().map(VersionInfo::from).collect())
}

pub async fn latest_versions(state: &AppState) -> LauncherResult<LatestVersions> {
    Ok(LatestVersions {
        release: latest_or_none(state.catalog.latest_release().await)?,
        snapshot: latest_or_none(state.catalog.latest_snapshot().await)?,
    })
}

fn latest_or_none(result: LauncherResult<VersionRecord>) -> LauncherResult<Option<VersionInfo>> {
    match result {
        Ok(record) => Ok(Some(VersionInfo::from(&record))),
        Err(LauncherError::VersionNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Re-downloads the manifest and returns how many versions are now cached.
pub async fn refresh_versions(state: &AppState) -> LauncherResult<usize> {
    state.catalog.refresh().await?;
    Ok(state.catalog.versions().await?.len())
}

/// Re-downloads the manifest when `autoUpdateCheck` is on. A failed check is
/// logged and the cached catalog stays in use. Returns whether it refreshed.
pub async fn check_for_updates(state: &AppState) -> bool {
    if !state.settings.auto_update_check {
        return false;
    }
    match state.catalog.refresh().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Version manifest update check failed: {}", e);
            false
        }
    }
}

/// Descriptor, client jar, libraries, natives and (unless skipped) assets.
pub async fn install_version(
    state: &AppState,
    version_id: &str,
    include_assets: bool,
    progress: Option<&dyn ProgressSink>,
) -> LauncherResult<InstallReport> {
    let record = state.catalog.resolve(version_id).await?;
    let descriptor_path = state
        .catalog
        .download_descriptor(&record, &state.layout)
        .await?;
    let descriptor = VersionDescriptor::load(&descriptor_path)?;

    let resolution = state
        .resolver()
        .resolve_and_download(&descriptor, version_id, include_assets, progress)
        .await?;

    info!(
        "Installed {} ({} classpath entries, {} failures)",
        version_id,
        resolution.classpath.len(),
        resolution.failures.len()
    );
    Ok(InstallReport {
        version_id: version_id.to_string(),
        classpath_entries: resolution.classpath.len(),
        failures: resolution.failures.iter().map(|f| f.label.clone()).collect(),
        error: None,
    })
}

pub fn list_installed(state: &AppState) -> LauncherResult<Vec<InstalledVersionInfo>> {
    Ok(scan_installed(&state.layout)?
        .into_iter()
        .map(|v| InstalledVersionInfo {
            display_name: v.display_name(),
            version_type: v.version_type.as_str(),
            status: download_status(&state.layout, &v.id).to_string(),
            id: v.id,
            main_class: v.main_class,
            asset_index: v.asset_index,
        })
        .collect())
}

/// Re-verifies every installed version, one background task each. Results
/// are sorted by version id.
pub async fn validate_all_installed(state: &AppState) -> LauncherResult<Vec<InstallReport>> {
    let installed = scan_installed(&state.layout)?;
    info!("Validating {} installed versions", installed.len());

    let mut tasks = JoinSet::new();
    for version in installed {
        let resolver = state.resolver();
        tasks.spawn(async move {
            let id = version.id;
            let descriptor = match VersionDescriptor::load_installed(resolver.layout(), &id) {
                Ok(descriptor) => descriptor,
                Err(e) => return InstallReport::failed(&id, &e),
            };
            match resolver
                .resolve_and_download(&descriptor, &id, true, None)
                .await
            {
                Ok(resolution) => InstallReport {
                    classpath_entries: resolution.classpath.len(),
                    failures: resolution.failures.iter().map(|f| f.label.clone()).collect(),
                    error: None,
                    version_id: id,
                },
                Err(e) => {
                    warn!("Validation of {} failed: {}", id, e);
                    InstallReport::failed(&id, &e)
                }
            }
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("Validation task panicked: {}", e);
                return Err(LauncherError::Other(format!("validation task failed: {e}")));
            }
        }
    }
    reports.sort_by(|a, b| a.version_id.cmp(&b.version_id));
    Ok(reports)
}

/// Everything up to the command line: verify files, stage natives, pick
/// Java and expand arguments. The version must already be installed.
pub async fn prepare_launch(
    state: &AppState,
    options: &LaunchOptions,
    progress: Option<&dyn ProgressSink>,
) -> LauncherResult<LaunchPlan> {
    let version_id = options.version_id.as_str();
    let descriptor = VersionDescriptor::load_installed(&state.layout, version_id)?;

    let resolution = state
        .resolver()
        .resolve_and_download(&descriptor, version_id, true, progress)
        .await?;
    for failure in &resolution.failures {
        warn!("Launching without {}: {}", failure.label, failure.error);
    }

    let natives_dir = stage_natives(&descriptor, version_id, &state.layout, &state.platform).await?;

    let prefs: &dyn PreferencesProvider = &state.settings;
    let java = resolve_java_executable(options.java_path.as_deref().or(prefs.java_path()));
    if let Some(major) = descriptor.required_java_major() {
        info!("{} expects Java {}; using {:?}", version_id, major, java);
    }

    let player = options
        .player_name
        .as_deref()
        .unwrap_or(state.settings.player_name.as_str());
    let request = LaunchRequest {
        version_id: version_id.to_string(),
        profile: OfflineProfile::new(player),
        memory_mb: options.memory_mb.unwrap_or(prefs.memory_mb()),
        width: options.width.unwrap_or(prefs.width()),
        height: options.height.unwrap_or(prefs.height()),
    };

    Ok(CommandBuilder::new(&state.layout, &state.platform).build(
        &descriptor,
        &request,
        java,
        &resolution.classpath_string(),
        &natives_dir,
    ))
}

/// Prepares and spawns the game. Output goes to `log_sink`.
pub async fn launch_version(
    state: &AppState,
    options: &LaunchOptions,
    log_sink: Arc<dyn LogSink>,
    progress: Option<&dyn ProgressSink>,
) -> LauncherResult<RunningInstance> {
    let plan = prepare_launch(state, options, progress).await?;
    let instance = state.supervisor(log_sink).launch(&plan).await?;
    info!(
        "{} running (pid {:?}, started {})",
        options.version_id, instance.pid, instance.started_at
    );
    Ok(instance)
}
