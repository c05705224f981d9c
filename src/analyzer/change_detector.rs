use crate::boundary::BoundaryWarning;
use crate::config::ChangesConfig;
use crate::domain::AppDescriptor;
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::graph::{is_build_file, package_pattern, BuildGraph};
use crate::inventory::Inventory;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Apps affected by the changes between a base reference and head
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    pub base: Option<String>,
    /// Every app was selected because no base could be resolved
    pub fail_open: bool,
    pub changed_files: Vec<String>,
    /// Changed files left after dropping non-build paths
    pub relevant_files: Vec<String>,
    pub affected_targets: BTreeSet<String>,
    pub apps: Vec<AppDescriptor>,
    #[serde(skip)]
    pub warnings: Vec<BoundaryWarning>,
}

impl ChangeSet {
    pub fn qualified_names(&self) -> Vec<String> {
        self.apps.iter().map(|a| a.qualified_name()).collect()
    }
}

/// Resolves changed paths to changed apps through the build graph
pub struct ChangeDetector<'a, R: Repository + ?Sized, G: BuildGraph + ?Sized> {
    repo: &'a R,
    graph: &'a G,
    ignore: Vec<Regex>,
    batch_size: usize,
}

impl<'a, R: Repository + ?Sized, G: BuildGraph + ?Sized> ChangeDetector<'a, R, G> {
    pub fn new(repo: &'a R, graph: &'a G, config: &ChangesConfig, batch_size: usize) -> Result<Self> {
        let ignore = config
            .ignore_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| ReleaseError::config(format!("invalid ignore pattern '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ChangeDetector {
            repo,
            graph,
            ignore,
            batch_size: batch_size.max(1),
        })
    }

    /// Changed apps between `base` and `head`.
    ///
    /// A missing or unresolvable base selects every app. An empty diff
    /// selects none.
    pub fn detect(&self, base: Option<&str>, head: &str, inventory: &Inventory) -> Result<ChangeSet> {
        let resolved = match base {
            Some(base) => self.repo.resolve_commit(base)?.map(|_| base),
            None => None,
        };

        let Some(base) = resolved else {
            let warning = BoundaryWarning::NoBaseReference {
                requested: base.map(str::to_string),
            };
            warn!("{}", warning);
            return Ok(ChangeSet {
                base: base.map(str::to_string),
                fail_open: true,
                apps: inventory.apps().to_vec(),
                warnings: vec![warning],
                ..ChangeSet::default()
            });
        };

        let changed_files = self.repo.changed_files(base, head)?;
        let mut change_set = ChangeSet {
            base: Some(base.to_string()),
            ..ChangeSet::default()
        };

        if changed_files.is_empty() {
            info!(base, head, "no files changed");
            return Ok(change_set);
        }

        let relevant_files: Vec<String> = changed_files
            .iter()
            .filter(|path| !self.is_ignored(path))
            .cloned()
            .collect();
        debug!(
            changed = changed_files.len(),
            relevant = relevant_files.len(),
            "filtered non-build paths"
        );

        let nodes = self.nodes_for(&relevant_files, &mut change_set.warnings);
        let affected = self.reverse_dependencies(&nodes, &mut change_set.warnings);

        change_set.apps = inventory
            .apps()
            .iter()
            .filter(|app| app.is_affected_by(|label| affected.contains(label)))
            .cloned()
            .collect();
        change_set.changed_files = changed_files;
        change_set.relevant_files = relevant_files;
        change_set.affected_targets = affected;

        info!(apps = change_set.apps.len(), "change detection finished");
        Ok(change_set)
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|re| re.is_match(path))
    }

    /// Graph nodes for changed files: whole packages for build definitions
    /// and for files the graph cannot place, single nodes otherwise.
    fn nodes_for(&self, files: &[String], warnings: &mut Vec<BoundaryWarning>) -> Vec<String> {
        let mut nodes = BTreeSet::new();
        for path in files {
            if is_build_file(path) {
                nodes.insert(package_pattern(path));
                continue;
            }
            match self.graph.resolve_file(path) {
                Ok(Some(label)) => {
                    nodes.insert(label);
                }
                Ok(None) => {
                    debug!(path = path.as_str(), "not a target, using its package");
                    nodes.insert(package_pattern(path));
                }
                Err(e) => {
                    let warning = BoundaryWarning::QueryFailed {
                        node: path.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                    nodes.insert(package_pattern(path));
                }
            }
        }
        nodes.into_iter().collect()
    }

    /// Batched reverse-dependency closure; a failed batch is retried one
    /// node at a time.
    fn reverse_dependencies(
        &self,
        nodes: &[String],
        warnings: &mut Vec<BoundaryWarning>,
    ) -> BTreeSet<String> {
        let mut affected = BTreeSet::new();

        for batch in nodes.chunks(self.batch_size) {
            match self.graph.reverse_dependencies(batch) {
                Ok(labels) => {
                    if labels.is_empty() {
                        info!(nodes = batch.len(), "reverse-dependency query matched nothing");
                    }
                    affected.extend(labels);
                }
                Err(e) if batch.len() > 1 => {
                    let warning = BoundaryWarning::BatchQueryDegraded {
                        nodes: batch.len(),
                        reason: e.to_string(),
                    };
                    warn!("{}", warning);
                    warnings.push(warning);

                    for node in batch {
                        match self.graph.reverse_dependencies(std::slice::from_ref(node)) {
                            Ok(labels) => {
                                if labels.is_empty() {
                                    info!(node = node.as_str(), "reverse-dependency query matched nothing");
                                }
                                affected.extend(labels);
                            }
                            Err(e) => warnings.push(self.query_failed(node, e)),
                        }
                    }
                }
                Err(e) => warnings.push(self.query_failed(&batch[0], e)),
            }
        }

        affected
    }

    fn query_failed(&self, node: &str, error: ReleaseError) -> BoundaryWarning {
        let warning = BoundaryWarning::QueryFailed {
            node: node.to_string(),
            reason: error.to_string(),
        };
        warn!("{}", warning);
        warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AppMetadata;
    use crate::git::MockRepository;
    use crate::graph::MockBuildGraph;

    fn metadata(domain: &str, name: &str) -> AppMetadata {
        AppMetadata {
            name: name.to_string(),
            domain: domain.to_string(),
            language: "go".to_string(),
            registry: None,
            targets: vec![],
        }
    }

    fn fixture() -> (MockRepository, MockBuildGraph, Inventory) {
        let repo = MockRepository::new();
        repo.add_commit("base", "1111");
        repo.add_commit("HEAD", "2222");

        let mut graph = MockBuildGraph::new();
        graph.add_file("demo/hello_go/main.go", "//demo/hello_go:main.go");
        graph.add_file("libs/greeting/greeting.go", "//libs/greeting:greeting.go");
        graph.add_dependency("//demo/hello_go:bin", "//demo/hello_go:main.go");
        graph.add_dependency("//demo/hello_go:release", "//demo/hello_go:bin");
        graph.add_dependency("//libs/greeting:lib", "//libs/greeting:greeting.go");
        graph.add_dependency("//demo/hello_go:bin", "//libs/greeting:lib");
        graph.add_dependency("//demo/hello_python:release", "//demo/hello_python:bin");
        graph.add_release_target("//demo/hello_go:release", metadata("demo", "hello_go"));
        graph.add_release_target("//demo/hello_python:release", metadata("demo", "hello_python"));

        let inventory = Inventory::discover(&graph, "//...").unwrap();
        (repo, graph, inventory)
    }

    fn detector<'a>(repo: &'a MockRepository, graph: &'a MockBuildGraph) -> ChangeDetector<'a, MockRepository, MockBuildGraph> {
        ChangeDetector::new(repo, graph, &ChangesConfig::default(), 100).unwrap()
    }

    #[test]
    fn test_missing_base_fails_open() {
        let (repo, graph, inventory) = fixture();
        let changes = detector(&repo, &graph).detect(None, "HEAD", &inventory).unwrap();
        assert!(changes.fail_open);
        assert_eq!(changes.apps.len(), 2);
    }

    #[test]
    fn test_unresolvable_base_fails_open() {
        let (repo, graph, inventory) = fixture();
        let changes = detector(&repo, &graph)
            .detect(Some("deadbeef"), "HEAD", &inventory)
            .unwrap();
        assert!(changes.fail_open);
        assert_eq!(changes.qualified_names(), vec!["demo-hello_go", "demo-hello_python"]);
    }

    #[test]
    fn test_empty_diff_selects_nothing() {
        let (repo, graph, inventory) = fixture();
        let changes = detector(&repo, &graph)
            .detect(Some("base"), "HEAD", &inventory)
            .unwrap();
        assert!(!changes.fail_open);
        assert!(changes.apps.is_empty());
        assert_eq!(graph.query_count(), 0);
    }

    #[test]
    fn test_diff_failure_is_an_error() {
        let (repo, graph, inventory) = fixture();
        repo.fail_diff_from("base");
        assert!(detector(&repo, &graph)
            .detect(Some("base"), "HEAD", &inventory)
            .is_err());
    }

    #[test]
    fn test_docs_only_changes_select_nothing() {
        let (repo, graph, inventory) = fixture();
        repo.set_changed_files(
            "base",
            "HEAD",
            &[".github/workflows/ci.yaml", "docs/guide.md", "demo/hello_go/README.md", "CHANGELOG.md"],
        );
        let changes = detector(&repo, &graph)
            .detect(Some("base"), "HEAD", &inventory)
            .unwrap();
        assert!(changes.relevant_files.is_empty());
        assert!(changes.apps.is_empty());
    }

    #[test]
    fn test_library_change_propagates_to_dependents() {
        let (repo, graph, inventory) = fixture();
        repo.set_changed_files("base", "HEAD", &["libs/greeting/greeting.go"]);
        let changes = detector(&repo, &graph)
            .detect(Some("base"), "HEAD", &inventory)
            .unwrap();
        assert_eq!(changes.qualified_names(), vec!["demo-hello_go"]);
        assert!(changes.affected_targets.contains("//libs/greeting:lib"));
    }

    #[test]
    fn test_build_file_affects_whole_package() {
        let (repo, graph, inventory) = fixture();
        repo.set_changed_files("base", "HEAD", &["demo/hello_python/BUILD.bazel"]);
        let changes = detector(&repo, &graph)
            .detect(Some("base"), "HEAD", &inventory)
            .unwrap();
        assert_eq!(graph.queried(), vec![vec!["//demo/hello_python:*".to_string()]]);
        assert_eq!(changes.qualified_names(), vec!["demo-hello_python"]);
    }

    #[test]
    fn test_batch_failure_degrades_to_single_queries() {
        let (repo, mut graph, inventory) = fixture();
        graph.fail_batches();
        repo.set_changed_files(
            "base",
            "HEAD",
            &["libs/greeting/greeting.go", "demo/hello_python/BUILD.bazel"],
        );

        let changes = detector(&repo, &graph)
            .detect(Some("base"), "HEAD", &inventory)
            .unwrap();
        assert_eq!(graph.query_count(), 3);
        assert_eq!(changes.qualified_names(), vec!["demo-hello_go", "demo-hello_python"]);
        assert!(matches!(
            changes.warnings[0],
            BoundaryWarning::BatchQueryDegraded { nodes: 2, .. }
        ));
    }

    #[test]
    fn test_failed_single_query_is_a_warning() {
        let (repo, mut graph, inventory) = fixture();
        graph.fail_node("//libs/greeting:greeting.go");
        repo.set_changed_files("base", "HEAD", &["libs/greeting/greeting.go"]);

        let changes = detector(&repo, &graph)
            .detect(Some("base"), "HEAD", &inventory)
            .unwrap();
        assert!(changes.apps.is_empty());
        assert_eq!(changes.warnings.len(), 1);
    }

    #[test]
    fn test_batches_respect_size() {
        let (repo, graph, inventory) = fixture();
        repo.set_changed_files(
            "base",
            "HEAD",
            &["libs/greeting/greeting.go", "demo/hello_go/main.go", "demo/hello_python/BUILD"],
        );
        let detector = ChangeDetector::new(&repo, &graph, &ChangesConfig::default(), 2).unwrap();
        detector.detect(Some("base"), "HEAD", &inventory).unwrap();
        assert_eq!(graph.query_count(), 2);
    }
}
