//! Release execution
//!
//! Every entry of the plan is checked before anything is mutated: a tag that
//! already points at the release commit is a no-op, a tag pointing elsewhere
//! needs `force`, and a version the registry already holds is refused unless
//! overwriting is allowed. Only then are tags created and pushed, releases
//! created and assets uploaded.

use crate::boundary::BoundaryWarning;
use crate::config::Config;
use crate::domain::{validate_semantic_version, ReleaseMatrixEntry, ReleasePlan, Tag};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::hosting::{ContainerRegistry, ReleaseHost};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOptions {
    /// Revision the tags are created at
    pub target: String,
    /// Move tags that point at a different commit
    pub force: bool,
    /// Release over a version the registry already holds
    pub allow_overwrite: bool,
    pub dry_run: bool,
    /// `domain-app` -> files attached to that app's release
    pub assets: BTreeMap<String, Vec<PathBuf>>,
    pub notes: Option<String>,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        ReleaseOptions {
            target: "HEAD".to_string(),
            force: false,
            allow_overwrite: false,
            dry_run: false,
            assets: BTreeMap::new(),
            notes: None,
        }
    }
}

/// What happens to one entry's tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagAction {
    Create,
    /// Already at the release commit
    Keep,
    /// Forced onto the release commit
    Move,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct PreparedEntry {
    app: String,
    tag: String,
    action: TagAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReleaseReport {
    pub dry_run: bool,
    pub commit: String,
    pub tags: Vec<String>,
    pub releases: Vec<String>,
    pub assets: Vec<String>,
    /// `latest` entries, which are built but never tagged
    pub untagged: Vec<String>,
    #[serde(skip)]
    pub warnings: Vec<BoundaryWarning>,
}

pub struct ReleaseExecutor<'a, R, H, C>
where
    R: Repository + ?Sized,
    H: ReleaseHost + ?Sized,
    C: ContainerRegistry + ?Sized,
{
    repo: &'a R,
    host: &'a H,
    registry: &'a C,
    config: &'a Config,
}

impl<'a, R, H, C> ReleaseExecutor<'a, R, H, C>
where
    R: Repository + ?Sized,
    H: ReleaseHost + ?Sized,
    C: ContainerRegistry + ?Sized,
{
    pub fn new(repo: &'a R, host: &'a H, registry: &'a C, config: &'a Config) -> Self {
        ReleaseExecutor {
            repo,
            host,
            registry,
            config,
        }
    }

    pub fn execute(&self, plan: &ReleasePlan, options: &ReleaseOptions) -> Result<ReleaseReport> {
        let commit = self
            .repo
            .resolve_commit(&options.target)?
            .ok_or_else(|| ReleaseError::vcs(format!("cannot resolve '{}'", options.target)))?;

        let mut report = ReleaseReport {
            dry_run: options.dry_run,
            commit: commit.clone(),
            ..ReleaseReport::default()
        };

        let mut prepared = Vec::new();
        for entry in &plan.entries {
            match self.preflight(entry, &commit, options, &mut report.warnings)? {
                Some(ready) => prepared.push(ready),
                None => report.untagged.push(entry.qualified_name()),
            }
        }

        let remote = &self.config.repository.remote;
        for entry in prepared {
            self.publish_tag(&entry, &commit, remote, options.dry_run)?;
            report.tags.push(entry.tag.clone());

            if options.dry_run {
                info!(tag = entry.tag.as_str(), "dry run: would create release");
                report.releases.push(entry.tag.clone());
                if let Some(files) = options.assets.get(&entry.app) {
                    report
                        .assets
                        .extend(files.iter().map(|f| f.display().to_string()));
                }
                continue;
            }

            let release = match self.host.release_by_tag(&entry.tag)? {
                Some(existing) => {
                    let warning = BoundaryWarning::ReleaseAlreadyExists {
                        tag: entry.tag.clone(),
                    };
                    warn!("{}", warning);
                    report.warnings.push(warning);
                    existing
                }
                None => {
                    let body = options
                        .notes
                        .clone()
                        .unwrap_or_else(|| format!("Release of {} at {}", entry.app, commit));
                    self.host.create_release(&entry.tag, &entry.tag, &body)?
                }
            };
            report.releases.push(release.tag.clone());

            for file in options.assets.get(&entry.app).into_iter().flatten() {
                self.host.upload_asset(&release, file)?;
                info!(tag = release.tag.as_str(), asset = %file.display(), "uploaded asset");
                report.assets.push(file.display().to_string());
            }
        }

        Ok(report)
    }

    /// Validate one entry and decide its tag action. `None` for `latest`.
    fn preflight(
        &self,
        entry: &ReleaseMatrixEntry,
        commit: &str,
        options: &ReleaseOptions,
        warnings: &mut Vec<BoundaryWarning>,
    ) -> Result<Option<PreparedEntry>> {
        let Some(version) = entry.version.semantic() else {
            debug!(app = %entry.qualified_name(), "latest is never tagged");
            return Ok(None);
        };

        if !validate_semantic_version(&version.to_string()) {
            return Err(ReleaseError::version(version.to_string()));
        }
        let tag = Tag::new(entry.domain.clone(), entry.app.clone(), version.clone()).name();
        Tag::parse(&tag)?;

        let action = match self.repo.tag_target(&tag)? {
            Some(existing) if existing == commit => {
                let warning = BoundaryWarning::TagAlreadyExists { tag: tag.clone() };
                warn!("{}", warning);
                warnings.push(warning);
                TagAction::Keep
            }
            Some(existing) if !options.force => {
                return Err(ReleaseError::conflict(format!(
                    "tag {} already points at {}; pass --force to move it to {}",
                    tag, existing, commit
                )));
            }
            Some(_) => TagAction::Move,
            None => TagAction::Create,
        };

        let package = self.config.registry.package_name(&entry.domain, &entry.app);
        if !options.allow_overwrite {
            for candidate in registry_tags(&version.to_string()) {
                if self.registry.tag_exists(&package, &candidate)? {
                    return Err(ReleaseError::conflict(format!(
                        "{}:{} is already published and immutable; pass --allow-overwrite to replace it",
                        package, candidate
                    )));
                }
            }
        }

        Ok(Some(PreparedEntry {
            app: entry.qualified_name(),
            tag,
            action,
        }))
    }

    fn publish_tag(&self, entry: &PreparedEntry, commit: &str, remote: &str, dry_run: bool) -> Result<()> {
        if entry.action == TagAction::Keep {
            return Ok(());
        }
        let force = entry.action == TagAction::Move;
        if dry_run {
            info!(tag = entry.tag.as_str(), action = ?entry.action, "dry run: would tag {}", commit);
            return Ok(());
        }

        self.repo.create_tag(&entry.tag, commit, force)?;
        self.repo.push_tag(remote, &entry.tag, force)?;
        info!(tag = entry.tag.as_str(), remote, "tag pushed");
        Ok(())
    }
}

/// Registry tags a version may be published under.
pub fn registry_tags(version: &str) -> [String; 2] {
    let bare = version.trim_start_matches('v');
    [format!("v{}", bare), bare.to_string()]
}
