use crate::error::{ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "release-helper.toml";

/// Represents the complete configuration for release-helper.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub build_graph: BuildGraphConfig,

    #[serde(default)]
    pub changes: ChangesConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Where tags are pushed and releases are hosted.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RepositoryConfig {
    #[serde(default = "default_remote")]
    pub remote: String,

    /// `owner/name`; falls back to `GITHUB_REPOSITORY`
    #[serde(default)]
    pub github_repository: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        RepositoryConfig {
            remote: default_remote(),
            github_repository: None,
        }
    }
}

impl RepositoryConfig {
    pub fn github_repository(&self) -> Result<String> {
        self.github_repository
            .clone()
            .or_else(|| std::env::var("GITHUB_REPOSITORY").ok())
            .filter(|r| r.contains('/'))
            .ok_or_else(|| {
                ReleaseError::config(
                    "repository.github_repository is not set and GITHUB_REPOSITORY is unavailable",
                )
            })
    }
}

fn default_bazel() -> String {
    "bazel".to_string()
}

fn default_metadata_kind() -> String {
    "release_metadata".to_string()
}

fn default_target_pattern() -> String {
    "//...".to_string()
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuildGraphConfig {
    #[serde(default = "default_bazel")]
    pub bazel: String,

    /// Rule kind of the nodes carrying release metadata
    #[serde(default = "default_metadata_kind")]
    pub metadata_kind: String,

    #[serde(default = "default_target_pattern")]
    pub target_pattern: String,

    /// Nodes per reverse-dependency query
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for BuildGraphConfig {
    fn default() -> Self {
        BuildGraphConfig {
            bazel: default_bazel(),
            metadata_kind: default_metadata_kind(),
            target_pattern: default_target_pattern(),
            batch_size: default_batch_size(),
        }
    }
}

/// Paths that can never affect a build.
fn default_ignore_patterns() -> Vec<String> {
    vec![
        r"^\.github/".to_string(),
        r"^docs/".to_string(),
        r"\.md$".to_string(),
        r"(^|/)CHANGELOG[^/]*$".to_string(),
        r"(^|/)(adr|ADR|adrs)/".to_string(),
    ]
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChangesConfig {
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for ChangesConfig {
    fn default() -> Self {
        ChangesConfig {
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

fn default_demo_domain() -> String {
    "demo".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SelectionConfig {
    /// Domain excluded from "all" unless explicitly included
    #[serde(default = "default_demo_domain")]
    pub demo_domain: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            demo_domain: default_demo_domain(),
        }
    }
}

fn default_package_template() -> String {
    "{domain}-{app}".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Package owner; defaults to the owner part of the hosting repository
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default = "default_package_template")]
    pub package_template: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            owner: None,
            package_template: default_package_template(),
        }
    }
}

impl RegistryConfig {
    pub fn package_name(&self, domain: &str, app: &str) -> String {
        self.package_template
            .replace("{domain}", domain)
            .replace("{app}", app)
    }
}

fn default_keep_minor_versions() -> usize {
    2
}

fn default_min_age_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct RetentionConfig {
    /// Minor-version lines always kept per app
    #[serde(default = "default_keep_minor_versions")]
    pub keep_minor_versions: usize,

    /// Nothing younger than this is deleted
    #[serde(default = "default_min_age_days")]
    pub min_age_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            keep_minor_versions: default_keep_minor_versions(),
            min_age_days: default_min_age_days(),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `release-helper.toml` in current directory
/// 3. `release-helper.toml` in the user config directory
/// 4. Default configuration if no file found
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(Path::new(path).to_path_buf()),
        None if Path::new(CONFIG_FILE).exists() => Some(Path::new(CONFIG_FILE).to_path_buf()),
        None => dirs::config_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .filter(|p| p.exists()),
    };

    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = fs::read_to_string(&path)?;
    parse_config(&contents)
        .map_err(|e| ReleaseError::config(format!("{}: {}", path.display(), e)))
}

pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(contents).map_err(|e| ReleaseError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.build_graph.batch_size == 0 {
            return Err(ReleaseError::config("build_graph.batch_size must be positive"));
        }
        if self.retention.keep_minor_versions == 0 {
            return Err(ReleaseError::config(
                "retention.keep_minor_versions must be at least 1",
            ));
        }
        if self.retention.min_age_days < 0 {
            return Err(ReleaseError::config("retention.min_age_days cannot be negative"));
        }
        for pattern in &self.changes.ignore_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                ReleaseError::config(format!("invalid ignore pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Owner of registry packages: explicit, else the hosting repository owner.
    pub fn registry_owner(&self) -> Result<String> {
        if let Some(owner) = &self.registry.owner {
            return Ok(owner.clone());
        }
        let repository = self.repository.github_repository()?;
        Ok(repository
            .split_once('/')
            .map(|(owner, _)| owner.to_string())
            .unwrap_or(repository))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.repository.remote, "origin");
        assert_eq!(config.build_graph.batch_size, 100);
        assert_eq!(config.selection.demo_domain, "demo");
        assert_eq!(config.retention.keep_minor_versions, 2);
        assert_eq!(config.retention.min_age_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_package_name_template() {
        let registry = RegistryConfig::default();
        assert_eq!(registry.package_name("demo", "hello_go"), "demo-hello_go");

        let custom = RegistryConfig {
            owner: None,
            package_template: "apps/{domain}/{app}".to_string(),
        };
        assert_eq!(custom.package_name("demo", "hello_go"), "apps/demo/hello_go");
    }

    #[test]
    fn test_invalid_ignore_pattern_rejected() {
        let err = parse_config("[changes]\nignore_patterns = [\"(unclosed\"]\n").unwrap_err();
        assert!(err.to_string().contains("invalid ignore pattern"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(parse_config("[build_graph]\nbatch_size = 0\n").is_err());
    }

    #[test]
    fn test_registry_owner_explicit() {
        let mut config = Config::default();
        config.registry.owner = Some("acme".to_string());
        assert_eq!(config.registry_owner().unwrap(), "acme");
    }
}
