//! Artifact cleanup
//!
//! [CleanupPlanner] turns a domain's tag history into a [RetentionDecision]
//! and resolves the release and package identifiers of every tag it drops.
//! [CleanupOrchestrator] then deletes them: hosted releases first (they
//! reference tags), then tags on the remote, then registry package versions.
//! A failed deletion is recorded and the run moves on to the next item.

use crate::analyzer::{RetentionPolicy, TagRecord};
use crate::boundary::BoundaryWarning;
use crate::config::RegistryConfig;
use crate::domain::version::LATEST;
use crate::domain::{
    CleanupError, CleanupPhase, CleanupResult, PackageVersionRef, RetentionDecision, Tag,
};
use crate::error::Result;
use crate::git::Repository;
use crate::hosting::{ContainerRegistry, PackageVersion, ReleaseHost};
use crate::orchestrator::release::registry_tags;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// A retention decision plus the warnings met while building it
#[derive(Debug, Clone, Default)]
pub struct CleanupPlan {
    pub decision: RetentionDecision,
    pub warnings: Vec<BoundaryWarning>,
}

pub struct CleanupPlanner<'a, R, H, C>
where
    R: Repository + ?Sized,
    H: ReleaseHost + ?Sized,
    C: ContainerRegistry + ?Sized,
{
    repo: &'a R,
    host: &'a H,
    registry: &'a C,
    registry_config: &'a RegistryConfig,
    policy: RetentionPolicy,
    /// Package listings, `None` when listing failed
    packages: RefCell<HashMap<String, Option<Vec<PackageVersion>>>>,
}

impl<'a, R, H, C> CleanupPlanner<'a, R, H, C>
where
    R: Repository + ?Sized,
    H: ReleaseHost + ?Sized,
    C: ContainerRegistry + ?Sized,
{
    pub fn new(
        repo: &'a R,
        host: &'a H,
        registry: &'a C,
        registry_config: &'a RegistryConfig,
        policy: RetentionPolicy,
    ) -> Self {
        CleanupPlanner {
            repo,
            host,
            registry,
            registry_config,
            policy,
            packages: RefCell::new(HashMap::new()),
        }
    }

    pub fn plan(&self, domain: &str, now: DateTime<Utc>) -> Result<CleanupPlan> {
        let mut plan = CleanupPlan {
            decision: RetentionDecision {
                domain: domain.to_string(),
                ..RetentionDecision::default()
            },
            warnings: Vec::new(),
        };

        let records = self.domain_records(domain, &mut plan)?;
        info!(domain, tags = records.len(), "evaluating retention");

        let outcome = self.policy.evaluate(&records, now);
        let tags: HashMap<String, &Tag> = records.iter().map(|r| (r.name(), &r.tag)).collect();

        let kept_versions = kept_versions_by_app(&outcome.keep, &tags);
        // one registry version may carry the tags of several deleted versions
        let mut scheduled: HashSet<(String, String)> = HashSet::new();

        for name in &outcome.delete {
            let Some(tag) = tags.get(name) else {
                continue;
            };

            match self.host.release_by_tag(name) {
                Ok(Some(release)) => {
                    plan.decision.releases.insert(name.clone(), release.id);
                }
                Ok(None) => debug!(tag = name.as_str(), "no hosted release"),
                Err(e) => {
                    warn!(tag = name.as_str(), error = %e, "release lookup failed");
                    plan.decision
                        .lookup_errors
                        .push(CleanupError::new(CleanupPhase::Lookup, name.clone(), e));
                }
            }

            let kept = kept_versions
                .get(&tag.qualified_app())
                .cloned()
                .unwrap_or_default();
            let refs: Vec<PackageVersionRef> = self
                .package_versions_for(tag, &kept, &mut plan.decision.lookup_errors)
                .into_iter()
                .filter(|r| scheduled.insert((r.package.clone(), r.id.clone())))
                .collect();
            if !refs.is_empty() {
                plan.decision.packages.insert(name.clone(), refs);
            }
        }

        plan.decision.keep = outcome.keep;
        plan.decision.delete = outcome.delete;
        Ok(plan)
    }

    /// Tags of `domain` with their creation dates. A failed date lookup
    /// keeps the tag and is recorded.
    fn domain_records(&self, domain: &str, plan: &mut CleanupPlan) -> Result<Vec<TagRecord>> {
        let prefix = format!("{}-", domain);
        let mut records = Vec::new();

        for name in self.repo.list_tags()? {
            let tag = match Tag::parse(&name) {
                Ok(tag) => tag,
                Err(e) => {
                    if name.starts_with(&prefix) {
                        let warning = BoundaryWarning::UnparsableTag {
                            tag: name.clone(),
                            reason: e.to_string(),
                        };
                        warn!("{}", warning);
                        plan.warnings.push(warning);
                    }
                    continue;
                }
            };
            if tag.domain != domain {
                continue;
            }

            let created = match self.repo.tag_date(&name) {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!(tag = name.as_str(), error = %e, "tag date unavailable, keeping tag");
                    plan.decision
                        .lookup_errors
                        .push(CleanupError::new(CleanupPhase::Lookup, name.clone(), e));
                    None
                }
            };
            records.push(TagRecord { tag, created });
        }

        Ok(records)
    }

    /// Registry versions published for `tag`. Versions also carrying a kept
    /// version or `latest` are left alone.
    fn package_versions_for(
        &self,
        tag: &Tag,
        kept: &HashSet<String>,
        errors: &mut Vec<CleanupError>,
    ) -> Vec<PackageVersionRef> {
        let package = self.registry_config.package_name(&tag.domain, &tag.app);
        let wanted: Vec<String> = registry_tags(&tag.version.to_string()).into();

        let mut cache = self.packages.borrow_mut();
        let listing = cache.entry(package.clone()).or_insert_with(|| {
            match self.registry.list_versions(&package) {
                Ok(versions) => {
                    if versions.is_empty() {
                        info!(package = package.as_str(), "package has no versions");
                    }
                    Some(versions)
                }
                Err(e) => {
                    warn!(package = package.as_str(), error = %e, "package listing failed");
                    errors.push(CleanupError::new(CleanupPhase::Lookup, package.clone(), e));
                    None
                }
            }
        });

        let Some(versions) = listing else {
            return Vec::new();
        };

        versions
            .iter()
            .filter(|v| v.tags.iter().any(|t| wanted.contains(t)))
            .filter(|v| {
                let shared = v
                    .tags
                    .iter()
                    .any(|t| t == LATEST || kept.contains(t));
                if shared {
                    debug!(package = package.as_str(), id = v.id.as_str(), "version still referenced, skipping");
                }
                !shared
            })
            .map(|v| PackageVersionRef {
                package: package.clone(),
                id: v.id.clone(),
            })
            .collect()
    }
}

/// Registry tags of every kept version, per `domain-app`.
fn kept_versions_by_app(keep: &[String], tags: &HashMap<String, &Tag>) -> HashMap<String, HashSet<String>> {
    let mut kept: HashMap<String, HashSet<String>> = HashMap::new();
    for name in keep {
        if let Some(tag) = tags.get(name) {
            kept.entry(tag.qualified_app())
                .or_default()
                .extend(registry_tags(&tag.version.to_string()));
        }
    }
    kept
}

/// Executes a [RetentionDecision] against the three backends
pub struct CleanupOrchestrator<'a, R, H, C>
where
    R: Repository + ?Sized,
    H: ReleaseHost + ?Sized,
    C: ContainerRegistry + ?Sized,
{
    repo: &'a R,
    host: &'a H,
    registry: &'a C,
    remote: &'a str,
}

impl<'a, R, H, C> CleanupOrchestrator<'a, R, H, C>
where
    R: Repository + ?Sized,
    H: ReleaseHost + ?Sized,
    C: ContainerRegistry + ?Sized,
{
    pub fn new(repo: &'a R, host: &'a H, registry: &'a C, remote: &'a str) -> Self {
        CleanupOrchestrator {
            repo,
            host,
            registry,
            remote,
        }
    }

    /// Never stops early. In dry-run every destructive call is skipped and
    /// reported as if it had succeeded.
    pub fn execute(&self, decision: &RetentionDecision, dry_run: bool) -> CleanupResult {
        let mut result = CleanupResult {
            dry_run,
            errors: decision.lookup_errors.clone(),
            ..CleanupResult::default()
        };

        self.delete_releases(&decision.releases, dry_run, &mut result);
        self.delete_tags(&decision.delete, dry_run, &mut result);
        self.delete_packages(&decision.packages, dry_run, &mut result);

        info!(
            domain = decision.domain.as_str(),
            dry_run,
            deleted = result.deleted_count(),
            failed = result.errors.len(),
            "cleanup finished"
        );
        result
    }

    fn delete_releases(&self, releases: &BTreeMap<String, String>, dry_run: bool, result: &mut CleanupResult) {
        for (tag, id) in releases {
            if dry_run {
                info!(tag = tag.as_str(), id = id.as_str(), "dry run: would delete release");
                result.deleted_releases.push(tag.clone());
                continue;
            }
            match self.host.delete_release(id) {
                Ok(()) => {
                    info!(tag = tag.as_str(), id = id.as_str(), "deleted release");
                    result.deleted_releases.push(tag.clone());
                }
                Err(e) => {
                    warn!(tag = tag.as_str(), id = id.as_str(), error = %e, "release deletion failed");
                    result.errors.push(CleanupError::new(
                        CleanupPhase::Release,
                        format!("{} (release {})", tag, id),
                        e,
                    ));
                }
            }
        }
    }

    fn delete_tags(&self, tags: &[String], dry_run: bool, result: &mut CleanupResult) {
        for tag in tags {
            if dry_run {
                info!(tag = tag.as_str(), "dry run: would delete tag");
                result.deleted_tags.push(tag.clone());
                continue;
            }
            match self.repo.delete_remote_tag(self.remote, tag) {
                Ok(()) => {
                    if let Err(e) = self.repo.delete_tag(tag) {
                        debug!(tag = tag.as_str(), error = %e, "local tag not removed");
                    }
                    info!(tag = tag.as_str(), remote = self.remote, "deleted tag");
                    result.deleted_tags.push(tag.clone());
                }
                Err(e) => {
                    warn!(tag = tag.as_str(), error = %e, "tag deletion failed");
                    result
                        .errors
                        .push(CleanupError::new(CleanupPhase::Tag, tag.clone(), e));
                }
            }
        }
    }

    fn delete_packages(
        &self,
        packages: &BTreeMap<String, Vec<PackageVersionRef>>,
        dry_run: bool,
        result: &mut CleanupResult,
    ) {
        let mut seen = HashSet::new();
        for version in packages.values().flatten() {
            if !seen.insert((version.package.as_str(), version.id.as_str())) {
                continue;
            }
            if dry_run {
                info!(version = %version, "dry run: would delete package version");
                result.deleted_packages.push(version.to_string());
                continue;
            }
            match self.registry.delete_version(&version.package, &version.id) {
                Ok(()) => {
                    info!(version = %version, "deleted package version");
                    result.deleted_packages.push(version.to_string());
                }
                Err(e) => {
                    warn!(version = %version, error = %e, "package deletion failed");
                    result
                        .errors
                        .push(CleanupError::new(CleanupPhase::Package, version.to_string(), e));
                }
            }
        }
    }
}
