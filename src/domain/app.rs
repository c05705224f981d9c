use crate::domain::tag::qualified_name;
use crate::domain::version::SemanticVersion;
use serde::{Deserialize, Serialize};

/// Structured metadata declared by a release-metadata node in the build graph
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppMetadata {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub registry: Option<String>,
    /// Build targets that make up the app (binaries, images, charts)
    #[serde(default)]
    pub targets: Vec<String>,
}

/// One releasable unit, discovered fresh from the build graph on every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppDescriptor {
    pub domain: String,
    pub name: String,
    /// Label of the node carrying release metadata
    pub target: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_targets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<SemanticVersion>,
}

impl AppDescriptor {
    pub fn new(domain: impl Into<String>, name: impl Into<String>, target: impl Into<String>) -> Self {
        AppDescriptor {
            domain: domain.into(),
            name: name.into(),
            target: target.into(),
            language: String::new(),
            registry: None,
            build_targets: Vec::new(),
            current_version: None,
        }
    }

    pub fn from_metadata(target: impl Into<String>, metadata: AppMetadata) -> Self {
        AppDescriptor {
            domain: metadata.domain,
            name: metadata.name,
            target: target.into(),
            language: metadata.language,
            registry: metadata.registry,
            build_targets: metadata.targets,
            current_version: None,
        }
    }

    /// `domain-app`
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.domain, &self.name)
    }

    /// Whether any of this app's graph nodes appears in `labels`.
    pub fn is_affected_by(&self,mut labels: impl FnMut(&str) -> bool) -> bool {
        labels(&self.target) || self.build_targets.iter().any(|t| labels(t))
    }
}
