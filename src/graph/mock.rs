use crate::domain::AppMetadata;
use crate::error::{ReleaseError, Result};
use crate::graph::BuildGraph;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// In-memory build graph for tests
#[derive(Default)]
pub struct MockBuildGraph {
    files: HashMap<String, String>,
    /// node -> nodes that depend on it directly
    dependents: HashMap<String, Vec<String>>,
    release: BTreeMap<String, AppMetadata>,
    failing_nodes: HashSet<String>,
    fail_batches: bool,
    queries: Cell<usize>,
    queried: RefCell<Vec<Vec<String>>>,
}

impl MockBuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a file path to the node that owns it
    pub fn add_file(&mut self, path: &str, label: &str) {
        self.files.insert(path.to_string(), label.to_string());
    }

    /// `dependent` depends directly on `dependency`
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        self.dependents
            .entry(dependency.to_string())
            .or_default()
            .push(dependent.to_string());
    }

    pub fn add_release_target(&mut self, label: &str, metadata: AppMetadata) {
        self.release.insert(label.to_string(), metadata);
    }

    /// Queries touching `node` fail
    pub fn fail_node(&mut self, node: &str) {
        self.failing_nodes.insert(node.to_string());
    }

    /// Queries with more than one node fail
    pub fn fail_batches(&mut self) {
        self.fail_batches = true;
    }

    /// Number of reverse-dependency queries issued
    pub fn query_count(&self) -> usize {
        self.queries.get()
    }

    pub fn queried(&self) -> Vec<Vec<String>> {
        self.queried.borrow().clone()
    }

    fn known_labels(&self) -> BTreeSet<String> {
        let mut labels: BTreeSet<String> = self.files.values().cloned().collect();
        for (node, dependents) in &self.dependents {
            labels.insert(node.clone());
            labels.extend(dependents.iter().cloned());
        }
        labels.extend(self.release.keys().cloned());
        labels
    }

    fn expand(&self, node: &str) -> Vec<String> {
        match node.strip_suffix('*') {
            Some(package) => self
                .known_labels()
                .into_iter()
                .filter(|l| l.starts_with(package))
                .collect(),
            None => vec![node.to_string()],
        }
    }
}

impl BuildGraph for MockBuildGraph {
    fn resolve_file(&self, path: &str) -> Result<Option<String>> {
        Ok(self.files.get(path).cloned())
    }

    fn reverse_dependencies(&self, nodes: &[String]) -> Result<Vec<String>> {
        self.queries.set(self.queries.get() + 1);
        self.queried.borrow_mut().push(nodes.to_vec());

        if self.fail_batches && nodes.len() > 1 {
            return Err(ReleaseError::build_graph("batch query rejected"));
        }
        if let Some(bad) = nodes.iter().find(|n| self.failing_nodes.contains(*n)) {
            return Err(ReleaseError::build_graph(format!("no such target: {}", bad)));
        }

        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = nodes.iter().flat_map(|n| self.expand(n)).collect();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.clone()) {
                continue;
            }
            if let Some(dependents) = self.dependents.get(&node) {
                stack.extend(dependents.iter().cloned());
            }
        }
        Ok(seen.into_iter().collect())
    }

    fn release_targets(&self, _pattern: &str) -> Result<Vec<String>> {
        Ok(self.release.keys().cloned().collect())
    }

    fn metadata(&self, target: &str) -> Result<AppMetadata> {
        self.release
            .get(target)
            .cloned()
            .ok_or_else(|| ReleaseError::build_graph(format!("no metadata for {}", target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitive_reverse_dependencies() {
        let mut graph = MockBuildGraph::new();
        graph.add_dependency("//app:bin", "//lib:core");
        graph.add_dependency("//app:release", "//app:bin");

        let rdeps = graph
            .reverse_dependencies(&["//lib:core".to_string()])
            .unwrap();
        assert_eq!(rdeps, vec!["//app:bin", "//app:release", "//lib:core"]);
    }

    #[test]
    fn test_package_pattern_expansion() {
        let mut graph = MockBuildGraph::new();
        graph.add_file("lib/a.go", "//lib:a");
        graph.add_file("lib/b.go", "//lib:b");
        graph.add_dependency("//app:bin", "//lib:b");

        let rdeps = graph.reverse_dependencies(&["//lib:*".to_string()]).unwrap();
        assert_eq!(rdeps, vec!["//app:bin", "//lib:a", "//lib:b"]);
    }

    #[test]
    fn test_batch_failure_injection() {
        let mut graph = MockBuildGraph::new();
        graph.fail_batches();
        assert!(graph
            .reverse_dependencies(&["//a:a".to_string(), "//b:b".to_string()])
            .is_err());
        assert!(graph.reverse_dependencies(&["//a:a".to_string()]).is_ok());
        assert_eq!(graph.query_count(), 2);
    }
}
