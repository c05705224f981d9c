use crate::error::{ReleaseError, Result};
use crate::hosting::{ContainerRegistry, HostedRelease, PackageVersion, ReleaseHost};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory container registry
#[derive(Default)]
pub struct MockRegistry {
    packages: Mutex<BTreeMap<String, Vec<PackageVersion>>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_lists: Mutex<HashSet<String>>,
    list_calls: Mutex<usize>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_version(&self, package: &str, id: &str, tags: &[&str], created_at: DateTime<Utc>) {
        lock(&self.packages)
            .entry(package.to_string())
            .or_default()
            .push(PackageVersion {
                id: id.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                created_at,
            });
    }

    /// Deleting version `id` fails
    pub fn fail_delete(&self, id: &str) {
        lock(&self.failing_deletes).insert(id.to_string());
    }

    /// Listing `package` fails
    pub fn fail_list(&self, package: &str) {
        lock(&self.failing_lists).insert(package.to_string());
    }

    pub fn version_ids(&self, package: &str) -> Vec<String> {
        lock(&self.packages)
            .get(package)
            .map(|versions| versions.iter().map(|v| v.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn list_calls(&self) -> usize {
        *lock(&self.list_calls)
    }
}

impl ContainerRegistry for MockRegistry {
    fn list_versions(&self, package: &str) -> Result<Vec<PackageVersion>> {
        *lock(&self.list_calls) += 1;
        if lock(&self.failing_lists).contains(package) {
            return Err(ReleaseError::registry(format!("cannot list {}", package)));
        }
        Ok(lock(&self.packages).get(package).cloned().unwrap_or_default())
    }

    fn delete_version(&self, package: &str, id: &str) -> Result<()> {
        if lock(&self.failing_deletes).contains(id) {
            return Err(ReleaseError::registry(format!("HTTP 500 deleting {}", id)));
        }
        let mut packages = lock(&self.packages);
        let versions = packages
            .get_mut(package)
            .ok_or_else(|| ReleaseError::registry(format!("no package {}", package)))?;
        let before = versions.len();
        versions.retain(|v| v.id != id);
        if versions.len() == before {
            return Err(ReleaseError::registry(format!("no version {} in {}", id, package)));
        }
        Ok(())
    }
}

/// In-memory release host
#[derive(Default)]
pub struct MockReleaseHost {
    releases: Mutex<BTreeMap<String, HostedRelease>>,
    next_id: Mutex<u64>,
    failing_deletes: Mutex<HashSet<String>>,
    uploads: Mutex<Vec<(String, PathBuf)>>,
}

impl MockReleaseHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_release(&self, id: &str, tag: &str) {
        lock(&self.releases).insert(
            tag.to_string(),
            HostedRelease {
                id: id.to_string(),
                tag: tag.to_string(),
                name: tag.to_string(),
            },
        );
    }

    /// Deleting release `id` fails
    pub fn fail_delete(&self, id: &str) {
        lock(&self.failing_deletes).insert(id.to_string());
    }

    pub fn release_tags(&self) -> Vec<String> {
        lock(&self.releases).keys().cloned().collect()
    }

    pub fn uploads(&self) -> Vec<(String, PathBuf)> {
        lock(&self.uploads).clone()
    }
}

impl ReleaseHost for MockReleaseHost {
    fn create_release(&self, tag: &str, name: &str, _body: &str) -> Result<HostedRelease> {
        let mut releases = lock(&self.releases);
        if releases.contains_key(tag) {
            return Err(ReleaseError::conflict(format!("release for {} exists", tag)));
        }
        let mut next_id = lock(&self.next_id);
        *next_id += 1;
        let release = HostedRelease {
            id: format!("mock-{}", *next_id),
            tag: tag.to_string(),
            name: name.to_string(),
        };
        releases.insert(tag.to_string(), release.clone());
        Ok(release)
    }

    fn release_by_tag(&self, tag: &str) -> Result<Option<HostedRelease>> {
        Ok(lock(&self.releases).get(tag).cloned())
    }

    fn delete_release(&self, id: &str) -> Result<()> {
        if lock(&self.failing_deletes).contains(id) {
            return Err(ReleaseError::release_host(format!("HTTP 502 deleting {}", id)));
        }
        let mut releases = lock(&self.releases);
        let before = releases.len();
        releases.retain(|_, r| r.id != id);
        if releases.len() == before {
            return Err(ReleaseError::release_host(format!("no release {}", id)));
        }
        Ok(())
    }

    fn upload_asset(&self, release: &HostedRelease, path: &Path) -> Result<()> {
        lock(&self.uploads).push((release.tag.clone(), path.to_path_buf()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_tag_exists() {
        let registry = MockRegistry::new();
        registry.add_version("demo-web", "1", &["v1.0.0"], Utc::now());

        assert!(registry.tag_exists("demo-web", "v1.0.0").unwrap());
        assert!(!registry.tag_exists("demo-web", "v2.0.0").unwrap());
        assert!(!registry.tag_exists("demo-api", "v1.0.0").unwrap());
    }

    #[test]
    fn test_release_host_round_trip() {
        let host = MockReleaseHost::new();
        let release = host.create_release("demo-web.v1.0.0", "demo-web v1.0.0", "").unwrap();
        assert_eq!(
            host.release_by_tag("demo-web.v1.0.0").unwrap(),
            Some(release.clone())
        );
        host.delete_release(&release.id).unwrap();
        assert!(host.release_tags().is_empty());
    }
}
