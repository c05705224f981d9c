use crate::error::{ReleaseError, Result};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Version marker that is exempt from immutability checks and never tagged.
pub const LATEST: &str = "latest";

/// Semantic version representation
///
/// Ordering is numeric on (major, minor, patch). For equal triples a
/// release sorts above any prerelease, and prerelease labels compare
/// lexically among themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub prerelease: Option<String>,
}

impl SemanticVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        SemanticVersion {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    pub fn with_prerelease(mut self, label: impl Into<String>) -> Self {
        self.prerelease = Some(label.into());
        self
    }

    /// Parse "v1.2.3", "1.2.3" or "v1.2.3-rc1".
    pub fn parse(input: &str) -> Result<Self> {
        let clean = input.strip_prefix('v').unwrap_or(input);

        let (core, prerelease) = match clean.split_once('-') {
            Some((_, label)) if label.is_empty() => {
                return Err(ReleaseError::version(format!(
                    "'{}' has an empty prerelease label",
                    input
                )))
            }
            Some((core, label)) => (core, Some(label.to_string())),
            None => (clean, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(ReleaseError::version(format!(
                "'{}' - expected vMAJOR.MINOR.PATCH",
                input
            )));
        }

        let component = |name: &str, raw: &str| -> Result<u32> {
            if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ReleaseError::version(format!(
                    "'{}' has a non-numeric {} component '{}'",
                    input, name, raw
                )));
            }
            raw.parse::<u32>().map_err(|_| {
                ReleaseError::version(format!("'{}' {} component out of range", input, name))
            })
        };

        Ok(SemanticVersion {
            major: component("major", parts[0])?,
            minor: component("minor", parts[1])?,
            patch: component("patch", parts[2])?,
            prerelease,
        })
    }

    /// Next minor line; patch resets to 0. A prerelease of `X.Y.0` is
    /// promoted to its final release instead.
    pub fn increment_minor(&self) -> Self {
        if self.prerelease.is_some() && self.patch == 0 {
            return SemanticVersion::new(self.major, self.minor, 0);
        }
        SemanticVersion::new(self.major, self.minor + 1, 0)
    }

    /// Next patch. A prerelease is promoted to its final release instead.
    pub fn increment_patch(&self) -> Self {
        if self.prerelease.is_some() {
            return SemanticVersion::new(self.major, self.minor, self.patch);
        }
        SemanticVersion::new(self.major, self.minor, self.patch + 1)
    }

    pub fn bump(&self, mode: IncrementMode) -> Self {
        match mode {
            IncrementMode::Minor => self.increment_minor(),
            IncrementMode::Patch => self.increment_patch(),
        }
    }

    /// Key used by retention to group patch releases of one minor line.
    pub fn minor_line(&self) -> (u32, u32) {
        (self.major, self.minor)
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(label) = &self.prerelease {
            write!(f, "-{}", label)?;
        }
        Ok(())
    }
}

impl FromStr for SemanticVersion {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        SemanticVersion::parse(s)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The single gate every version passes before a tag is created.
pub fn validate_semantic_version(input: &str) -> bool {
    SemanticVersion::parse(input).is_ok()
}

/// Version-increment mode for manual releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementMode {
    Minor,
    Patch,
}

impl IncrementMode {
    /// Version used when an app has never been tagged.
    pub fn seed(self) -> SemanticVersion {
        SemanticVersion::new(0, 0, 0).bump(self)
    }
}

impl FromStr for IncrementMode {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "increment_minor" | "minor" => Ok(IncrementMode::Minor),
            "increment_patch" | "patch" => Ok(IncrementMode::Patch),
            other => Err(ReleaseError::trigger(format!(
                "unknown version mode '{}', expected increment_minor or increment_patch",
                other
            ))),
        }
    }
}

/// A version as it appears in a release plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseVersion {
    Semantic(SemanticVersion),
    Latest,
}

impl ReleaseVersion {
    pub fn parse(input: &str) -> Result<Self> {
        if input == LATEST {
            Ok(ReleaseVersion::Latest)
        } else {
            SemanticVersion::parse(input).map(ReleaseVersion::Semantic)
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, ReleaseVersion::Latest)
    }

    pub fn semantic(&self) -> Option<&SemanticVersion> {
        match self {
            ReleaseVersion::Semantic(v) => Some(v),
            ReleaseVersion::Latest => None,
        }
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseVersion::Semantic(v) => v.fmt(f),
            ReleaseVersion::Latest => f.write_str(LATEST),
        }
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = SemanticVersion::parse("v1.2.3").unwrap();
        assert_eq!(v, SemanticVersion::new(1, 2, 3));
    }

    #[test]
    fn test_version_parse_without_v() {
        assert_eq!(
            SemanticVersion::parse("1.2.3").unwrap(),
            SemanticVersion::parse("v1.2.3").unwrap()
        );
    }

    #[test]
    fn test_version_parse_prerelease() {
        let v = SemanticVersion::parse("v2.0.0-rc.1").unwrap();
        assert_eq!(v, SemanticVersion::new(2, 0, 0).with_prerelease("rc.1"));
        assert_eq!(v.to_string(), "v2.0.0-rc.1");
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!(SemanticVersion::parse("1.2").is_err());
        assert!(SemanticVersion::parse("v1.2.3.4").is_err());
        assert!(SemanticVersion::parse("v1.x.3").is_err());
        assert!(SemanticVersion::parse("v1..3").is_err());
        assert!(SemanticVersion::parse("v+1.2.3").is_err());
        assert!(SemanticVersion::parse("v1.2.3-").is_err());
        assert!(SemanticVersion::parse("").is_err());
        assert!(SemanticVersion::parse("latest").is_err());
    }

    #[test]
    fn test_version_ordering() {
        let versions = [
            "v0.9.9", "v1.0.0-alpha", "v1.0.0-beta", "v1.0.0", "v1.0.1", "v1.2.0", "v1.10.0",
            "v2.0.0",
        ];
        let parsed: Vec<SemanticVersion> = versions
            .iter()
            .map(|v| SemanticVersion::parse(v).unwrap())
            .collect();

        for (i, a) in parsed.iter().enumerate() {
            for (j, b) in parsed.iter().enumerate() {
                assert_eq!(a.cmp(b), i.cmp(&j), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_increment_minor_resets_patch() {
        let v = SemanticVersion::new(1, 2, 3);
        assert_eq!(v.increment_minor(), SemanticVersion::new(1, 3, 0));
    }

    #[test]
    fn test_increment_patch_preserves_major() {
        let v = SemanticVersion::new(4, 2, 3);
        assert_eq!(v.increment_patch(), SemanticVersion::new(4, 2, 4));
    }

    #[test]
    fn test_increment_promotes_prerelease() {
        let rc = SemanticVersion::parse("v1.3.0-rc.1").unwrap();
        assert_eq!(rc.increment_patch(), SemanticVersion::new(1, 3, 0));
        assert_eq!(rc.increment_minor(), SemanticVersion::new(1, 3, 0));

        let rc = SemanticVersion::parse("v1.3.2-beta").unwrap();
        assert_eq!(rc.increment_patch(), SemanticVersion::new(1, 3, 2));
        assert_eq!(rc.increment_minor(), SemanticVersion::new(1, 4, 0));
    }

    #[test]
    fn test_increments_are_strictly_greater() {
        for raw in ["v0.0.0", "v1.2.3", "v1.2.3-rc1", "v9.0.99"] {
            let v = SemanticVersion::parse(raw).unwrap();
            assert!(v.increment_minor() > v, "minor of {}", raw);
            assert!(v.increment_patch() > v, "patch of {}", raw);
        }
    }

    #[test]
    fn test_increment_mode_seeds() {
        assert_eq!(IncrementMode::Minor.seed().to_string(), "v0.1.0");
        assert_eq!(IncrementMode::Patch.seed().to_string(), "v0.0.1");
    }

    #[test]
    fn test_increment_mode_from_str() {
        assert_eq!(
            "increment_minor".parse::<IncrementMode>().unwrap(),
            IncrementMode::Minor
        );
        assert_eq!(
            "increment_patch".parse::<IncrementMode>().unwrap(),
            IncrementMode::Patch
        );
        assert!("increment_major".parse::<IncrementMode>().is_err());
    }

    #[test]
    fn test_validate_semantic_version() {
        assert!(validate_semantic_version("v1.0.0"));
        assert!(validate_semantic_version("0.0.1"));
        assert!(!validate_semantic_version("v1.0"));
        assert!(!validate_semantic_version("main"));
    }

    #[test]
    fn test_release_version_latest() {
        let latest = ReleaseVersion::parse("latest").unwrap();
        assert!(latest.is_latest());
        assert_eq!(latest.to_string(), "latest");
        assert!(latest.semantic().is_none());

        let semantic = ReleaseVersion::parse("1.4.0").unwrap();
        assert_eq!(semantic.to_string(), "v1.4.0");
    }
}
