use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A registry package version scheduled for removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageVersionRef {
    pub package: String,
    pub id: String,
}

impl fmt::Display for PackageVersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.id)
    }
}

/// Keep/delete partition of one domain's tags, with the backend
/// identifiers that belong to each deleted tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionDecision {
    pub domain: String,
    pub keep: Vec<String>,
    pub delete: Vec<String>,
    /// Deleted tag -> hosted release id
    pub releases: BTreeMap<String, String>,
    /// Deleted tag -> registry package versions
    pub packages: BTreeMap<String, Vec<PackageVersionRef>>,
    /// Non-fatal failures hit while resolving identifiers
    pub lookup_errors: Vec<CleanupError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPhase {
    Lookup,
    Release,
    Tag,
    Package,
}

impl fmt::Display for CleanupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupPhase::Lookup => "lookup",
            CleanupPhase::Release => "release",
            CleanupPhase::Tag => "tag",
            CleanupPhase::Package => "package",
        };
        f.write_str(name)
    }
}

/// A single failed item; never stops the items after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupError {
    pub phase: CleanupPhase,
    pub item: String,
    pub message: String,
}

impl CleanupError {
    pub fn new(phase: CleanupPhase, item: impl Into<String>, message: impl ToString) -> Self {
        CleanupError {
            phase,
            item: item.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.item, self.message)
    }
}

/// What was deleted (or, in dry-run, would have been) per backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    pub dry_run: bool,
    pub deleted_releases: Vec<String>,
    pub deleted_tags: Vec<String>,
    pub deleted_packages: Vec<String>,
    pub errors: Vec<CleanupError>,
}

impl CleanupResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted_releases.len() + self.deleted_tags.len() + self.deleted_packages.len()
    }
}
