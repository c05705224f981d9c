//! App inventory discovered from the build graph on every run

use crate::domain::{AppDescriptor, SemanticVersion, Tag};
use crate::error::{ReleaseError, Result};
use crate::graph::BuildGraph;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// Every releasable app, sorted by (domain, name)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    apps: Vec<AppDescriptor>,
}

impl Inventory {
    /// Query release-metadata nodes under `pattern` and describe each one.
    pub fn discover<G: BuildGraph + ?Sized>(graph: &G, pattern: &str) -> Result<Self> {
        let targets = graph.release_targets(pattern)?;
        if targets.is_empty() {
            info!(pattern, "no release-metadata targets matched");
        }

        let apps = targets
            .iter()
            .map(|target| {
                debug!(target = target.as_str(), "reading release metadata");
                graph
                    .metadata(target)
                    .map(|metadata| AppDescriptor::from_metadata(target.clone(), metadata))
            })
            .collect::<Result<Vec<_>>>()?;

        Inventory::from_apps(apps)
    }

    /// Build an inventory, rejecting duplicate names and duplicate targets.
    pub fn from_apps(mut apps: Vec<AppDescriptor>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut targets = HashSet::new();
        for app in &apps {
            if !names.insert((app.domain.clone(), app.name.clone())) {
                return Err(ReleaseError::DuplicateApp(app.qualified_name()));
            }
            if !targets.insert(app.target.clone()) {
                return Err(ReleaseError::DuplicateApp(format!(
                    "target {} declares more than one app",
                    app.target
                )));
            }
        }

        apps.sort_by(|a, b| (&a.domain, &a.name).cmp(&(&b.domain, &b.name)));
        Ok(Inventory { apps })
    }

    pub fn apps(&self) -> &[AppDescriptor] {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn domains(&self) -> BTreeSet<&str> {
        self.apps.iter().map(|a| a.domain.as_str()).collect()
    }

    pub fn qualified_names(&self) -> Vec<String> {
        self.apps.iter().map(|a| a.qualified_name()).collect()
    }

    /// Fill `current_version` from the newest tag of each app.
    pub fn annotate_versions(&mut self, tags: &[String]) {
        let latest = latest_versions(tags);
        for app in &mut self.apps {
            app.current_version = latest.get(&app.qualified_name()).cloned();
        }
    }
}

/// Highest version per `domain-app` among well-formed tags.
pub fn latest_versions(tags: &[String]) -> HashMap<String, SemanticVersion> {
    let mut latest: HashMap<String, SemanticVersion> = HashMap::new();
    for raw in tags {
        let Ok(tag) = Tag::parse(raw) else {
            continue;
        };
        let key = tag.qualified_app();
        match latest.get(&key) {
            Some(existing) if existing >= &tag.version => {}
            _ => {
                latest.insert(key, tag.version);
            }
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AppMetadata;
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

    #[test]
    fn test_discover_sorts_apps() {
        let mut graph = MockBuildGraph::new();
        graph.add_release_target("//payments/ledger:release", metadata("payments", "ledger"));
        graph.add_release_target("//demo/hello_go:release", metadata("demo", "hello_go"));

        let inventory = Inventory::discover(&graph, "//...").unwrap();
        assert_eq!(
            inventory.qualified_names(),
            vec!["demo-hello_go", "payments-ledger"]
        );
        assert_eq!(
            inventory.domains().into_iter().collect::<Vec<_>>(),
            vec!["demo", "payments"]
        );
    }

    #[test]
    fn test_duplicate_app_rejected() {
        let apps = vec![
            AppDescriptor::new("demo", "web", "//demo/web:release"),
            AppDescriptor::new("demo", "web", "//demo/web2:release"),
        ];
        let err = Inventory::from_apps(apps).unwrap_err();
        assert!(matches!(err, ReleaseError::DuplicateApp(name) if name == "demo-web"));
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let apps = vec![
            AppDescriptor::new("demo", "web", "//demo/web:release"),
            AppDescriptor::new("demo", "api", "//demo/web:release"),
        ];
        assert!(Inventory::from_apps(apps).is_err());
    }

    #[test]
    fn test_annotate_versions() {
        let mut inventory = Inventory::from_apps(vec![
            AppDescriptor::new("demo", "web", "//demo/web:release"),
            AppDescriptor::new("demo", "api", "//demo/api:release"),
        ])
        .unwrap();

        let tags = vec![
            "demo-web.v1.2.0".to_string(),
            "demo-web.v1.10.0".to_string(),
            "garbage".to_string(),
        ];
        inventory.annotate_versions(&tags);

        let web = &inventory.apps()[1];
        assert_eq!(web.name, "web");
        assert_eq!(web.current_version, Some(SemanticVersion::new(1, 10, 0)));
        assert_eq!(inventory.apps()[0].current_version, None);
    }
}
