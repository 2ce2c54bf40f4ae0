// ─── Rule Evaluator ───
// Decides whether a library or argument applies to a platform.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsConstraint>,
    #[serde(default)]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OsConstraint {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

/// The machine a launch is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Lowercase OS name as the JVM reports it (`"linux"`, `"mac os x"`, `"windows 10"`).
    pub os_name: String,
    /// Lowercase JVM-style architecture (`"amd64"`, `"x86"`, `"aarch64"`).
    pub arch: String,
    features: HashMap<String, bool>,
}

impl Platform {
    /// A simulated platform. `os_name` and `arch` are lowercased.
    pub fn new(os_name: &str, arch: &str) -> Self {
        Self {
            os_name: os_name.to_lowercase(),
            arch: arch.to_lowercase(),
            features: HashMap::new(),
        }
    }

    /// The host this process runs on.
    pub fn current() -> Self {
        let os_name = match std::env::consts::OS {
            "macos" => "mac os x",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            other => other,
        };
        Self::new(os_name, arch)
    }

    pub fn with_feature(mut self, name: &str, enabled: bool) -> Self {
        self.features.insert(name.to_string(), enabled);
        self
    }

    pub fn set_feature(&mut self, name: &str, enabled: bool) {
        self.features.insert(name.to_string(), enabled);
    }

    pub fn feature(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    /// Key used by descriptor `natives` maps.
    pub fn os_key(&self) -> &'static str {
        if self.os_name.contains("win") {
            "windows"
        } else if self.os_name.contains("mac") {
            "osx"
        } else {
            "linux"
        }
    }

    /// Value substituted for `${arch}` in native classifiers.
    pub fn arch_bits(&self) -> &'static str {
        if self.arch.contains("64") {
            "64"
        } else {
            "32"
        }
    }

    fn os_matches(&self, constraint: &OsConstraint) -> bool {
        if let Some(name) = &constraint.name {
            let mut required = name.to_lowercase();
            if required == "osx" {
                required = "mac".to_string();
            }
            if !self.os_name.contains(&required) {
                return false;
            }
        }
        if let Some(arch) = &constraint.arch {
            if !self.arch.contains(&arch.to_lowercase()) {
                return false;
            }
        }
        true
    }

    fn features_match(&self, required: &HashMap<String, bool>) -> bool {
        required
            .iter()
            .all(|(name, wanted)| self.feature(name) == *wanted)
    }
}

/// First matching rule decides; no match means include.
///
/// An OS rule matches when every given constraint holds. A feature rule always
/// decides: its action if the platform's flags agree, the opposite otherwise.
/// Rules carrying neither never match.
pub fn should_include(rules: &[Rule], platform: &Platform) -> bool {
    for rule in rules {
        let allow = rule.action == RuleAction::Allow;

        if let Some(os) = &rule.os {
            if platform.os_matches(os) {
                return allow;
            }
        } else if let Some(features) = &rule.features {
            return if platform.features_match(features) {
                allow
            } else {
                !allow
            };
        }
    }

    true
}
