pub mod manifest;
pub mod rules;
pub mod version_file;

pub use manifest::{
    VersionCatalog, VersionRecord, VersionType, DEFAULT_MANIFEST_URL, DEFAULT_MAX_CACHED_VERSIONS,
};
pub use rules::{should_include, OsConstraint, Platform, Rule, RuleAction};
pub use version_file::{
    ArgumentEntry, ArgumentValue, Arguments, AssetIndexInfo, DownloadArtifact, LibraryArtifact,
    LibraryEntry, VersionDescriptor,
};
