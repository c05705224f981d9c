use crate::domain::version::SemanticVersion;
use crate::error::{ReleaseError, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// `.v<digit>`, the start of a version marker.
fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.v\d").expect("marker pattern is valid"))
}

/// An app release tag decomposed into its parts, e.g. `demo-hello_python.v1.2.0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tag {
    pub domain: String,
    pub app: String,
    pub version: SemanticVersion,
}

impl Tag {
    pub fn new(domain: impl Into<String>, app: impl Into<String>, version: SemanticVersion) -> Self {
        Tag {
            domain: domain.into(),
            app: app.into(),
            version,
        }
    }

    /// Parse `domain-app.vX.Y.Z`. Multi-dash prefixes split at the last dash,
    /// so `platform-core-api.v1.0.0` is app `api` in domain `platform-core`.
    pub fn parse(raw: &str) -> Result<Self> {
        let (prefix, version) = split_version_marker(raw)?;

        let (domain, app) = prefix
            .rsplit_once('-')
            .filter(|(domain, app)| !domain.is_empty() && !app.is_empty())
            .ok_or_else(|| {
                ReleaseError::tag(format!("'{}' lacks a domain-app separator", raw))
            })?;

        Ok(Tag::new(domain, app, version))
    }

    /// `domain-app`, the prefix shared by every tag of one app.
    pub fn qualified_app(&self) -> String {
        qualified_name(&self.domain, &self.app)
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.domain, self.app, self.version)
    }
}

/// `domain-app`
pub fn qualified_name(domain: &str, app: &str) -> String {
    format!("{}-{}", domain, app)
}

/// Canonical app tag: `domain-app.vX.Y.Z`
pub fn format_tag(domain: &str, app: &str, version: &SemanticVersion) -> String {
    format!("{}.{}", qualified_name(domain, app), version)
}

/// Chart tags carry no domain segment: `chart.vX.Y.Z`
pub fn format_chart_tag(chart: &str, version: &SemanticVersion) -> String {
    format!("{}.{}", chart, version)
}

pub fn parse_chart_tag(raw: &str) -> Result<(String, SemanticVersion)> {
    let (chart, version) = split_version_marker(raw)?;
    Ok((chart.to_string(), version))
}

/// Split at the last version marker that is followed by a valid version, so
/// prefixes may themselves contain `.v<digit>`.
fn split_version_marker(raw: &str) -> Result<(&str, SemanticVersion)> {
    let starts: Vec<usize> = marker_regex().find_iter(raw).map(|m| m.start()).collect();
    if starts.is_empty() {
        return Err(ReleaseError::tag(format!("'{}' lacks a .v version marker", raw)));
    }

    let mut last_error = None;
    for start in starts.into_iter().rev().filter(|start| *start > 0) {
        match SemanticVersion::parse(&raw[start + 1..]) {
            Ok(version) => return Ok((&raw[..start], version)),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => ReleaseError::tag(format!("'{}': {}", raw, e)),
        None => ReleaseError::tag(format!("'{}' has an empty prefix", raw)),
    })
}

/// Version portion of either an app tag or a bare `vX.Y.Z` tag.
pub fn version_from_tag(raw: &str) -> Result<SemanticVersion> {
    match Tag::parse(raw) {
        Ok(tag) => Ok(tag.version),
        Err(_) => SemanticVersion::parse(raw)
            .map_err(|_| ReleaseError::tag(format!("'{}' carries no semantic version", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> SemanticVersion {
        SemanticVersion::parse(raw).unwrap()
    }

    #[test]
    fn test_format_tag() {
        assert_eq!(
            format_tag("demo", "hello_python", &v("1.2.0")),
            "demo-hello_python.v1.2.0"
        );
    }

    #[test]
    fn test_parse_tag() {
        let tag = Tag::parse("demo-hello_python.v1.2.0").unwrap();
        assert_eq!(tag.domain, "demo");
        assert_eq!(tag.app, "hello_python");
        assert_eq!(tag.version, v("1.2.0"));
        assert_eq!(tag.qualified_app(), "demo-hello_python");
    }

    #[test]
    fn test_parse_multi_segment_domain() {
        let tag = Tag::parse("platform-core-api.v3.0.1").unwrap();
        assert_eq!(tag.domain, "platform-core");
        assert_eq!(tag.app, "api");
    }

    #[test]
    fn test_parse_prerelease_tag() {
        let tag = Tag::parse("demo-web.v1.0.0-rc.1").unwrap();
        assert_eq!(tag.version.prerelease.as_deref(), Some("rc.1"));
        assert_eq!(tag.to_string(), "demo-web.v1.0.0-rc.1");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Tag::parse("v1.2.3").is_err());
        assert!(Tag::parse("demo-app").is_err());
        assert!(Tag::parse("demoapp.v1.0.0").is_err());
        assert!(Tag::parse("-app.v1.0.0").is_err());
        assert!(Tag::parse("demo-.v1.0.0").is_err());
        assert!(Tag::parse("demo-app.v1.0").is_err());
        assert!(Tag::parse("demo-app.vnext").is_err());
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            ("demo", "hello_python", "v0.0.1"),
            ("platform-core", "api", "v10.20.30"),
            ("a", "b", "v1.0.0-beta"),
        ];
        for (domain, app, version) in cases {
            let formatted = format_tag(domain, app, &v(version));
            let parsed = Tag::parse(&formatted).unwrap();
            assert_eq!(parsed, Tag::new(domain, app, v(version)));
        }
    }

    #[test]
    fn test_round_trip_with_version_like_names() {
        let formatted = format_tag("edge.v2", "proxy", &v("1.4.0"));
        assert_eq!(formatted, "edge.v2-proxy.v1.4.0");
        let parsed = Tag::parse(&formatted).unwrap();
        assert_eq!(parsed, Tag::new("edge.v2", "proxy", v("1.4.0")));

        let parsed = Tag::parse("demo-api.v3.v1.0.0-rc.v2").unwrap();
        assert_eq!(parsed.app, "api.v3");
        assert_eq!(parsed.version, v("1.0.0-rc.v2"));
    }

    #[test]
    fn test_chart_tags() {
        let formatted = format_chart_tag("hello-chart", &v("0.3.0"));
        assert_eq!(formatted, "hello-chart.v0.3.0");
        let (chart, version) = parse_chart_tag(&formatted).unwrap();
        assert_eq!(chart, "hello-chart");
        assert_eq!(version, v("0.3.0"));
    }

    #[test]
    fn test_version_from_tag() {
        assert_eq!(version_from_tag("v1.4.0").unwrap(), v("1.4.0"));
        assert_eq!(version_from_tag("demo-web.v2.0.0").unwrap(), v("2.0.0"));
        assert!(version_from_tag("release-candidate").is_err());
    }
}
