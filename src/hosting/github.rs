//! GitHub backend - GitHub Packages (ghcr.io) and GitHub Releases via `gh`
//!
//! Authentication is whatever `gh` is logged in with (`GH_TOKEN`,
//! `GITHUB_TOKEN`, or `gh auth login`).

use crate::error::{ReleaseError, Result};
use crate::hosting::{ContainerRegistry, HostedRelease, PackageVersion, ReleaseHost};
use std::cell::OnceCell;
use std::path::Path;
use std::process::Command;
use tracing::debug;

const VERSION_FIELDS: &str =
    "{id: (.id|tostring), tags: (.metadata.container.tags // []), created_at: .created_at} | @json";
const RELEASE_FIELDS: &str = "{id: (.id|tostring), tag: .tag_name, name: (.name // \"\")} | @json";

/// Client for the GitHub REST API through the `gh` binary
pub struct GhCli {
    gh: String,
    /// `owner/name` of the repository hosting releases
    repository: String,
    /// User or organization owning the container packages
    package_owner: String,
    /// `orgs/<owner>` or `users/<owner>`, looked up once per client
    owner_path: OnceCell<String>,
}

enum ApiFailure {
    NotFound,
    Other(String),
}

impl GhCli {
    pub fn new(repository: impl Into<String>, package_owner: impl Into<String>) -> Self {
        GhCli {
            gh: "gh".to_string(),
            repository: repository.into(),
            package_owner: package_owner.into(),
            owner_path: OnceCell::new(),
        }
    }

    pub fn with_binary(mut self, gh: impl Into<String>) -> Self {
        self.gh = gh.into();
        self
    }

    fn call(&self, args: &[&str]) -> std::result::Result<String, ApiFailure> {
        debug!(args = ?args, "running gh");
        let output = Command::new(&self.gh)
            .args(args)
            .output()
            .map_err(|e| ApiFailure::Other(format!("failed to run {}: {}", self.gh, e)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("HTTP 404") {
            Err(ApiFailure::NotFound)
        } else {
            Err(ApiFailure::Other(format!(
                "gh {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )))
        }
    }

    fn owner_path(&self) -> Result<String> {
        if let Some(path) = self.owner_path.get() {
            return Ok(path.clone());
        }

        let endpoint = format!("users/{}", self.package_owner);
        let kind = self
            .call(&["api", &endpoint, "--jq", ".type"])
            .map_err(|f| registry_failure(f, &endpoint))?;

        let path = if kind.trim() == "Organization" {
            format!("orgs/{}", self.package_owner)
        } else {
            format!("users/{}", self.package_owner)
        };
        let _ = self.owner_path.set(path.clone());
        Ok(path)
    }

    fn versions_endpoint(&self, package: &str) -> Result<String> {
        Ok(format!(
            "{}/packages/container/{}/versions",
            self.owner_path()?,
            package.replace('/', "%2F")
        ))
    }
}

fn registry_failure(failure: ApiFailure, what: &str) -> ReleaseError {
    match failure {
        ApiFailure::NotFound => ReleaseError::registry(format!("{} not found", what)),
        ApiFailure::Other(msg) => ReleaseError::registry(msg),
    }
}

fn host_failure(failure: ApiFailure, what: &str) -> ReleaseError {
    match failure {
        ApiFailure::NotFound => ReleaseError::release_host(format!("{} not found", what)),
        ApiFailure::Other(msg) => ReleaseError::release_host(msg),
    }
}

/// One JSON document per line, as produced by `--jq '... | @json'`.
fn parse_lines<T: serde::de::DeserializeOwned>(stdout: &str) -> Result<Vec<T>> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(ReleaseError::from))
        .collect()
}

impl ContainerRegistry for GhCli {
    fn list_versions(&self, package: &str) -> Result<Vec<PackageVersion>> {
        let endpoint = self.versions_endpoint(package)?;
        let filter = format!(".[] | {}", VERSION_FIELDS);
        let stdout = match self.call(&["api", "--paginate", &endpoint, "--jq", &filter]) {
            Ok(stdout) => stdout,
            Err(ApiFailure::NotFound) => {
                debug!(package, "package does not exist");
                return Ok(Vec::new());
            }
            Err(ApiFailure::Other(msg)) => return Err(ReleaseError::registry(msg)),
        };
        parse_lines(&stdout)
    }

    fn delete_version(&self, package: &str, id: &str) -> Result<()> {
        let endpoint = format!("{}/{}", self.versions_endpoint(package)?, id);
        self.call(&["api", "-X", "DELETE", &endpoint])
            .map(|_| ())
            .map_err(|f| registry_failure(f, &format!("{} version {}", package, id)))
    }
}

impl ReleaseHost for GhCli {
    fn create_release(&self, tag: &str, name: &str, body: &str) -> Result<HostedRelease> {
        let endpoint = format!("repos/{}/releases", self.repository);
        let stdout = self
            .call(&[
                "api",
                "-X",
                "POST",
                &endpoint,
                "-f",
                &format!("tag_name={}", tag),
                "-f",
                &format!("name={}", name),
                "-f",
                &format!("body={}", body),
                "--jq",
                RELEASE_FIELDS,
            ])
            .map_err(|f| host_failure(f, &endpoint))?;

        parse_lines(&stdout)?
            .into_iter()
            .next()
            .ok_or_else(|| ReleaseError::release_host(format!("empty response creating {}", tag)))
    }

    fn release_by_tag(&self, tag: &str) -> Result<Option<HostedRelease>> {
        let endpoint = format!("repos/{}/releases/tags/{}", self.repository, tag);
        match self.call(&["api", &endpoint, "--jq", RELEASE_FIELDS]) {
            Ok(stdout) => Ok(parse_lines(&stdout)?.into_iter().next()),
            Err(ApiFailure::NotFound) => Ok(None),
            Err(ApiFailure::Other(msg)) => Err(ReleaseError::release_host(msg)),
        }
    }

    fn delete_release(&self, id: &str) -> Result<()> {
        let endpoint = format!("repos/{}/releases/{}", self.repository, id);
        self.call(&["api", "-X", "DELETE", &endpoint])
            .map(|_| ())
            .map_err(|f| host_failure(f, &endpoint))
    }

    fn upload_asset(&self, release: &HostedRelease, path: &Path) -> Result<()> {
        let path = path.to_str().ok_or_else(|| {
            ReleaseError::release_host(format!("non UTF-8 asset path {}", path.display()))
        })?;
        self.call(&[
            "release",
            "upload",
            &release.tag,
            path,
            "--repo",
            &self.repository,
            "--clobber",
        ])
        .map(|_| ())
        .map_err(|f| host_failure(f, &release.tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_lines() {
        let stdout = concat!(
            r#"{"id":"11","tags":["v1.0.0","latest"],"created_at":"2024-01-02T03:04:05Z"}"#,
            "\n",
            r#"{"id":"12","tags":[],"created_at":"2024-02-02T03:04:05Z"}"#,
            "\n"
        );
        let versions: Vec<PackageVersion> = parse_lines(stdout).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].id, "11");
        assert_eq!(versions[0].tags, vec!["v1.0.0", "latest"]);
        assert!(versions[1].tags.is_empty());
    }

    #[test]
    fn test_parse_release_line() {
        let stdout = r#"{"id":"99","tag":"demo-web.v1.0.0","name":"demo-web v1.0.0"}"#;
        let releases: Vec<HostedRelease> = parse_lines(stdout).unwrap();
        assert_eq!(releases[0].id, "99");
        assert_eq!(releases[0].tag, "demo-web.v1.0.0");
    }

    #[test]
    fn test_missing_binary_is_registry_error() {
        let client = GhCli::new("org/repo", "org").with_binary("definitely-not-a-gh-binary");
        let err = client.list_versions("demo-web").unwrap_err();
        assert!(matches!(err, ReleaseError::Registry(_)));
    }
}
