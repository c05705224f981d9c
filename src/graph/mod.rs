//! Build-graph collaborator
//!
//! Query execution is a black box behind [BuildGraph]; the release pipeline
//! only asks it to resolve paths, walk reverse dependencies and describe
//! release-metadata nodes.

pub mod bazel;
pub mod mock;

pub use bazel::BazelQuery;
pub use mock::MockBuildGraph;

use crate::domain::AppMetadata;
use crate::error::Result;

pub trait BuildGraph {
    /// Label of the node a workspace-relative file belongs to, `None` when
    /// the file is not part of any package (deleted files, stray files).
    fn resolve_file(&self, path: &str) -> Result<Option<String>>;

    /// Transitive reverse dependencies of `nodes` across the whole graph,
    /// including the nodes themselves. Nodes may be package patterns
    /// (`//pkg:*`).
    fn reverse_dependencies(&self, nodes: &[String]) -> Result<Vec<String>>;

    /// Every node under `pattern` that carries release metadata.
    fn release_targets(&self, pattern: &str) -> Result<Vec<String>>;

    /// Structured metadata of one release-metadata node.
    fn metadata(&self, target: &str) -> Result<AppMetadata>;
}

/// `//dir:*` for the package containing `path`.
pub fn package_pattern(path: &str) -> String {
    let dir = path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    format!("//{}:*", dir)
}

/// Build-definition files: they describe packages rather than belong to one.
pub fn is_build_file(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    matches!(
        file,
        "BUILD" | "BUILD.bazel" | "WORKSPACE" | "WORKSPACE.bazel" | "MODULE.bazel"
    ) || file.ends_with(".bzl")
}
