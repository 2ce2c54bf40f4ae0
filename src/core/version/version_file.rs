// ─── Version Descriptor ───
// Parses a per-version JSON document: libraries, downloads, argument templates.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::rules::{should_include, Platform, Rule};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::GameLayout;

/// A fully parsed version JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    pub main_class: String,
    /// Asset index id on legacy descriptors.
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    /// Absent on legacy descriptors.
    #[serde(default)]
    pub arguments: Option<Arguments>,
    #[serde(default, rename = "type")]
    pub version_type: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    #[serde(default)]
    pub client: Option<DownloadArtifact>,
    #[serde(default)]
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default, alias = "hash")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentEntry>,
    #[serde(default)]
    pub jvm: Vec<ArgumentEntry>,
}

/// One element of a structured argument list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArgumentEntry {
    Plain(String),
    Conditional { rules: Vec<Rule>, value: ArgumentValue },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl ArgumentEntry {
    /// Raw templates this entry contributes on `platform`.
    pub fn values_for(&self, platform: &Platform) -> Vec<&str> {
        match self {
            ArgumentEntry::Plain(value) => vec![value.as_str()],
            ArgumentEntry::Conditional { rules, value } => {
                if !should_include(rules, platform) {
                    return Vec::new();
                }
                match value {
                    ArgumentValue::One(v) => vec![v.as_str()],
                    ArgumentValue::Many(vs) => vs.iter().map(String::as_str).collect(),
                }
            }
        }
    }
}

// ─── Library Entry ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    /// OS key → classifier name, possibly containing `${arch}`.
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibraryArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibraryArtifact>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryArtifact {
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

impl LibraryEntry {
    pub fn is_allowed(&self, platform: &Platform) -> bool {
        match &self.rules {
            Some(rules) => should_include(rules, platform),
            None => true,
        }
    }

    pub fn artifact(&self) -> Option<&LibraryArtifact> {
        self.downloads.as_ref()?.artifact.as_ref()
    }

    /// Classifier name for this platform with `${arch}` resolved.
    pub fn native_classifier(&self, platform: &Platform) -> Option<String> {
        let natives = self.natives.as_ref()?;
        natives
            .get(platform.os_key())
            .map(|c| c.replace("${arch}", platform.arch_bits()))
    }

    /// The native archive to download and stage for this platform, if any.
    pub fn native_artifact(&self, platform: &Platform) -> Option<&LibraryArtifact> {
        let classifier = self.native_classifier(platform)?;
        let found = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier);
        if found.is_none() {
            debug!("{} declares native {} but no download", self.name, classifier);
        }
        found
    }
}

impl VersionDescriptor {
    /// Read a descriptor from disk. Missing file is `VersionJsonMissing`.
    pub fn load(path: &Path) -> LauncherResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LauncherError::VersionJsonMissing(path.to_path_buf()))
            }
            Err(e) => return Err(LauncherError::io(path, e)),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// `versions/<id>/<id>.json` under `layout`.
    pub fn load_installed(layout: &GameLayout, version_id: &str) -> LauncherResult<Self> {
        Self::load(&layout.descriptor_path(version_id))
    }

    /// Structured argument lists are absent.
    pub fn is_legacy(&self) -> bool {
        self.arguments.is_none()
    }

    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client.as_ref()
    }

    /// Asset index id, preferring `assetIndex.id` over the legacy `assets` field.
    pub fn asset_index_id(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|a| a.id.as_str())
            .or(self.assets.as_deref())
            .unwrap_or("legacy")
    }

    pub fn required_java_major(&self) -> Option<u32> {
        self.java_version.as_ref().map(|j| j.major_version)
    }
}
