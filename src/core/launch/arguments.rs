// ─── Launch Command Builder ───
// Expands structured or legacy argument templates into a concrete command.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::warn;

use super::classpath::{classpath_separator, safe_path_str};
use crate::core::auth::OfflineProfile;
use crate::core::instance::GameLayout;
use crate::core::version::{ArgumentEntry, Platform, VersionDescriptor};

pub const LAUNCHER_NAME: &str = "BlockLaunch";
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `-Xms` never exceeds this many megabytes.
const INITIAL_HEAP_CAP_MB: u32 = 1024;

const LEGACY_JVM_ARGS: &[&str] = &[
    "-Djava.library.path=${natives_directory}",
    "-cp",
    "${classpath}",
];

const LEGACY_GAME_HEAD: &[&str] = &[
    "--username",
    "${auth_player_name}",
    "--version",
    "${version_name}",
    "--gameDir",
    "${game_directory}",
    "--assetsDir",
    "${assets_root}",
];

const LEGACY_GAME_RESOLUTION: &[&str] = &[
    "--width",
    "${resolution_width}",
    "--height",
    "${resolution_height}",
];

const LEGACY_GAME_TAIL: &[&str] = &[
    "--assetIndex",
    "${assets_index_name}",
    "--uuid",
    "${auth_uuid}",
    "--accessToken",
    "${auth_access_token}",
    "--userType",
    "${user_type}",
    "--versionType",
    "${version_type}",
];

/// Per-launch user choices.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub version_id: String,
    pub profile: OfflineProfile,
    pub memory_mb: u32,
    pub width: u32,
    pub height: u32,
}

impl LaunchRequest {
    fn has_custom_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A fully expanded command, ready for the supervisor. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub java: PathBuf,
    /// JVM arguments, main class, game arguments.
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl LaunchPlan {
    /// Copy/paste form for logs.
    pub fn format_for_logs(&self) -> String {
        std::iter::once(self.java.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .map(|arg| shell_escape(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct CommandBuilder<'a> {
    layout: &'a GameLayout,
    platform: &'a Platform,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(layout: &'a GameLayout, platform: &'a Platform) -> Self {
        Self { layout, platform }
    }

    /// `-Xmx -Xms [jvm args] <main class> [game args]` for `descriptor`.
    pub fn build(
        &self,
        descriptor: &VersionDescriptor,
        request: &LaunchRequest,
        java: PathBuf,
        classpath: &str,
        natives_dir: &Path,
    ) -> LaunchPlan {
        let mut platform = self.platform.clone();
        platform.set_feature("has_custom_resolution", request.has_custom_resolution());

        let values = self.placeholder_values(descriptor, request, classpath, natives_dir);
        let mut unresolved = BTreeSet::new();

        let mut args = vec![
            format!("-Xmx{}M", request.memory_mb),
            format!("-Xms{}M", request.memory_mb.min(INITIAL_HEAP_CAP_MB)),
        ];

        let (jvm_templates, game_templates) = match &descriptor.arguments {
            Some(arguments) => (
                expand_entries(&arguments.jvm, &platform),
                expand_entries(&arguments.game, &platform),
            ),
            None => {
                let mut game: Vec<&str> = LEGACY_GAME_HEAD.to_vec();
                if request.has_custom_resolution() {
                    game.extend_from_slice(LEGACY_GAME_RESOLUTION);
                }
                game.extend_from_slice(LEGACY_GAME_TAIL);
                (LEGACY_JVM_ARGS.to_vec(), game)
            }
        };

        args.extend(substitute_all(&jvm_templates, &values, &mut unresolved));
        args.push(descriptor.main_class.clone());
        args.extend(substitute_all(&game_templates, &values, &mut unresolved));

        for name in &unresolved {
            warn!("Unresolved launch placeholder ${{{}}} removed", name);
        }

        LaunchPlan {
            java,
            args,
            working_dir: self.layout.root().to_path_buf(),
            env: self.environment(natives_dir),
        }
    }

    fn placeholder_values(
        &self,
        descriptor: &VersionDescriptor,
        request: &LaunchRequest,
        classpath: &str,
        natives_dir: &Path,
    ) -> HashMap<&'static str, String> {
        let profile = &request.profile;
        HashMap::from([
            ("auth_player_name", profile.username.clone()),
            ("version_name", request.version_id.clone()),
            ("game_directory", safe_path_str(self.layout.root())),
            ("assets_root", safe_path_str(&self.layout.assets_dir())),
            ("game_assets", safe_path_str(&self.layout.assets_dir())),
            ("assets_index_name", descriptor.asset_index_id().to_string()),
            ("auth_uuid", profile.uuid.clone()),
            ("auth_access_token", profile.access_token.clone()),
            ("auth_session", profile.access_token.clone()),
            ("auth_xuid", profile.xuid.clone()),
            ("clientid", profile.client_id.clone()),
            ("user_type", profile.user_type.clone()),
            (
                "version_type",
                descriptor
                    .version_type
                    .clone()
                    .unwrap_or_else(|| "release".into()),
            ),
            ("user_properties", "{}".into()),
            ("resolution_width", request.width.to_string()),
            ("resolution_height", request.height.to_string()),
            ("classpath", classpath.to_string()),
            ("classpath_separator", classpath_separator().to_string()),
            ("natives_directory", safe_path_str(natives_dir)),
            ("library_directory", safe_path_str(&self.layout.libraries_dir())),
            ("launcher_name", LAUNCHER_NAME.into()),
            ("launcher_version", LAUNCHER_VERSION.into()),
        ])
    }

    /// Game/assets directory hints plus the natives directory prepended to
    /// the platform's library search path.
    fn environment(&self, natives_dir: &Path) -> Vec<(String, String)> {
        let var = match self.platform.os_key() {
            "windows" => "PATH",
            "osx" => "DYLD_LIBRARY_PATH",
            _ => "LD_LIBRARY_PATH",
        };
        vec![
            ("game_directory".into(), safe_path_str(self.layout.root())),
            ("assets_root".into(), safe_path_str(&self.layout.assets_dir())),
            (var.into(), prepend_env_path(var, &safe_path_str(natives_dir))),
        ]
    }
}

fn expand_entries<'e>(entries: &'e [ArgumentEntry], platform: &Platform) -> Vec<&'e str> {
    entries
        .iter()
        .flat_map(|entry| entry.values_for(platform))
        .collect()
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}]*)\}").ok())
        .as_ref()
}

/// Substitutes every template; unknown placeholders become empty and are
/// recorded in `unresolved`. An argument is dropped only when nothing but
/// unresolved placeholders produced it; a known value that is empty stays as
/// `""` so flag/value pairs keep their positions.
fn substitute_all(
    templates: &[&str],
    values: &HashMap<&'static str, String>,
    unresolved: &mut BTreeSet<String>,
) -> Vec<String> {
    templates
        .iter()
        .filter_map(|template| substitute(template, values, unresolved))
        .collect()
}

fn substitute(
    template: &str,
    values: &HashMap<&'static str, String>,
    unresolved: &mut BTreeSet<String>,
) -> Option<String> {
    let Some(pattern) = placeholder_pattern() else {
        return Some(template.to_string());
    };
    let mut missing = false;
    let expanded = pattern
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match values.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing = true;
                    unresolved.insert(name.to_string());
                    String::new()
                }
            }
        })
        .into_owned();

    if missing && expanded.is_empty() {
        None
    } else {
        Some(expanded)
    }
}

fn prepend_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") { ";" } else { ":" };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{value}{separator}{existing}")
        }
        _ => value.to_string(),
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
