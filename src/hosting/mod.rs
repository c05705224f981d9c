//! Container registry and release-hosting collaborators
//!
//! - [github::GhCli]: GitHub Packages and Releases through the `gh` CLI
//! - [mock::MockRegistry] / [mock::MockReleaseHost]: in-memory test doubles

pub mod github;
pub mod mock;

pub use github::GhCli;
pub use mock::{MockRegistry, MockReleaseHost};

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One version of a registry package
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PackageVersion {
    pub id: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A release hosted against a tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostedRelease {
    pub id: String,
    pub tag: String,
    pub name: String,
}

pub trait ContainerRegistry {
    /// Every version of `package`; implementations drain pagination.
    fn list_versions(&self, package: &str) -> Result<Vec<PackageVersion>>;

    fn delete_version(&self, package: &str, id: &str) -> Result<()>;

    /// Whether any version of `package` carries `tag`.
    fn tag_exists(&self, package: &str, tag: &str) -> Result<bool> {
        Ok(self
            .list_versions(package)?
            .iter()
            .any(|v| v.tags.iter().any(|t| t == tag)))
    }
}

pub trait ReleaseHost {
    fn create_release(&self, tag: &str, name: &str, body: &str) -> Result<HostedRelease>;

    /// `None` when no release exists for the tag.
    fn release_by_tag(&self, tag: &str) -> Result<Option<HostedRelease>>;

    fn delete_release(&self, id: &str) -> Result<()>;

    fn upload_asset(&self, release: &HostedRelease, path: &Path) -> Result<()>;
}
