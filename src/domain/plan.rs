use crate::domain::tag::{format_tag, qualified_name};
use crate::domain::trigger::TriggerKind;
use crate::domain::version::ReleaseVersion;
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the release matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseMatrixEntry {
    pub app: String,
    pub domain: String,
    pub target: String,
    pub version: ReleaseVersion,
}

impl ReleaseMatrixEntry {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.domain, &self.app)
    }

    /// Tag this entry would create; `latest` entries are never tagged.
    pub fn tag_name(&self) -> Option<String> {
        self.version
            .semantic()
            .map(|v| format_tag(&self.domain, &self.app, v))
    }
}

/// Duplicate-free set of apps to release, in selection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    pub event: TriggerKind,
    /// The trigger's nominal version, if it carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<ReleaseVersion>,
    pub entries: Vec<ReleaseMatrixEntry>,
}

impl ReleasePlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted `domain-app` names.
    pub fn app_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.qualified_name()).collect();
        names.sort();
        names
    }

    /// `domain-app` -> resolved version, sorted by name.
    pub fn versions(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.qualified_name(), e.version.to_string()))
            .collect()
    }

    /// Machine-readable form consumed by CI matrix jobs.
    pub fn to_matrix_json(&self) -> serde_json::Value {
        serde_json::json!({
            "event": self.event,
            "version": self.version,
            "include": self.entries,
            "apps": self.app_names(),
            "versions": self.versions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::version::SemanticVersion;

    fn entry(domain: &str, app: &str, version: ReleaseVersion) -> ReleaseMatrixEntry {
        ReleaseMatrixEntry {
            app: app.to_string(),
            domain: domain.to_string(),
            target: format!("//{}/{}:release", domain, app),
            version,
        }
    }

    #[test]
    fn test_outputs_are_sorted() {
        let plan = ReleasePlan {
            event: TriggerKind::Manual,
            version: None,
            entries: vec![
                entry("demo", "zeta", ReleaseVersion::Latest),
                entry("api", "gateway", ReleaseVersion::Semantic(SemanticVersion::new(1, 0, 0))),
            ],
        };

        assert_eq!(plan.app_names(), vec!["api-gateway", "demo-zeta"]);
        let versions: Vec<(String, String)> = plan.versions().into_iter().collect();
        assert_eq!(
            versions,
            vec![
                ("api-gateway".to_string(), "v1.0.0".to_string()),
                ("demo-zeta".to_string(), "latest".to_string()),
            ]
        );
    }

    #[test]
    fn test_tag_name_skips_latest() {
        let latest = entry("demo", "web", ReleaseVersion::Latest);
        assert_eq!(latest.tag_name(), None);

        let tagged = entry("demo", "web", ReleaseVersion::Semantic(SemanticVersion::new(0, 2, 0)));
        assert_eq!(tagged.tag_name().as_deref(), Some("demo-web.v0.2.0"));
    }

    #[test]
    fn test_matrix_json_shape() {
        let plan = ReleasePlan {
            event: TriggerKind::Push,
            version: Some(ReleaseVersion::Latest),
            entries: vec![entry("demo", "web", ReleaseVersion::Latest)],
        };
        let json = plan.to_matrix_json();
        assert_eq!(json["event"], "push");
        assert_eq!(json["include"][0]["app"], "web");
        assert_eq!(json["include"][0]["version"], "latest");
        assert_eq!(json["versions"]["demo-web"], "latest");
    }
}
