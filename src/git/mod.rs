//! Version-control collaborator
//!
//! The [Repository] trait is the narrow interface planning and cleanup need
//! from version control. Implementations:
//!
//! - [repository::Git2Repository]: a real repository through the `git2` crate
//! - [mock::MockRepository]: an in-memory repository for tests
//!
//! Decision code depends on the trait only, so it runs against the mock with
//! no process or network access.

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::domain::tag::{version_from_tag, Tag};
use crate::domain::SemanticVersion;
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Version-control operations used by the release pipeline
pub trait Repository {
    /// Paths changed between two revisions (both sides of renames included).
    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>>;

    /// Resolve a revision to a commit id, `None` when it does not exist.
    fn resolve_commit(&self, rev: &str) -> Result<Option<String>>;

    /// All tag names, highest version first. Tags without a parseable
    /// version sort last, alphabetically.
    fn list_tags(&self) -> Result<Vec<String>>;

    /// When the tag was created (tagger date, or commit date for
    /// lightweight tags).
    fn tag_date(&self, name: &str) -> Result<DateTime<Utc>>;

    /// Commit id the tag points at, `None` when the tag does not exist.
    fn tag_target(&self, name: &str) -> Result<Option<String>>;

    /// Create a lightweight tag locally. `force` moves an existing tag.
    fn create_tag(&self, name: &str, target: &str, force: bool) -> Result<()>;

    /// Remove a local tag.
    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Publish a local tag to the remote.
    fn push_tag(&self, remote: &str, name: &str, force: bool) -> Result<()>;

    /// Remove the tag ref from the remote.
    fn delete_remote_tag(&self, remote: &str, name: &str) -> Result<()>;

    /// The highest tag below `tag`. App tags only consider tags of the same
    /// app; bare `vX.Y.Z` tags only consider other bare version tags.
    fn previous_tag(&self, tag: &str) -> Result<Option<String>> {
        let current = version_from_tag(tag)?;
        let app = Tag::parse(tag).ok().map(|t| t.qualified_app());

        let previous = self.list_tags()?.into_iter().find(|candidate| {
            let version = match &app {
                Some(app) => Tag::parse(candidate)
                    .ok()
                    .filter(|t| &t.qualified_app() == app)
                    .map(|t| t.version),
                None => SemanticVersion::parse(candidate).ok(),
            };
            version.is_some_and(|v| v < current)
        });

        Ok(previous)
    }
}

/// Sort tag names highest version first; unversioned names go last.
pub fn sort_tags_by_version_desc(tags: &mut [String]) {
    tags.sort_by(|a, b| {
        match (version_from_tag(a).ok(), version_from_tag(b).ok()) {
            (Some(va), Some(vb)) => vb.cmp(&va).then_with(|| a.cmp(b)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_tags_by_version_desc() {
        let mut tags = vec![
            "demo-web.v1.0.0".to_string(),
            "nightly".to_string(),
            "demo-web.v1.10.0".to_string(),
            "v2.0.0".to_string(),
            "demo-web.v1.2.0".to_string(),
        ];
        sort_tags_by_version_desc(&mut tags);
        assert_eq!(
            tags,
            vec![
                "v2.0.0",
                "demo-web.v1.10.0",
                "demo-web.v1.2.0",
                "demo-web.v1.0.0",
                "nightly"
            ]
        );
    }
}
