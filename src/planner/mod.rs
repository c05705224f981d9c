//! Release planning
//!
//! Turns a trigger context into a [ReleasePlan]. Inputs are validated before
//! any collaborator is touched; after that every collaborator failure aborts
//! the plan, since a partial matrix is worse than none.

pub mod selector;

pub use selector::{resolve_selector, SelectorOptions};

use crate::analyzer::{ChangeDetector, ChangeSet};
use crate::boundary::BoundaryWarning;
use crate::config::Config;
use crate::domain::tag::version_from_tag;
use crate::domain::{
    AppDescriptor, IncrementMode, ReleaseMatrixEntry, ReleasePlan, ReleaseVersion, TriggerKind,
};
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::graph::BuildGraph;
use crate::inventory::{latest_versions, Inventory};
use tracing::{debug, info};

/// Everything a planning run is given
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerContext {
    pub event: TriggerKind,
    /// App selector; required for manual runs, narrows detection otherwise
    pub apps: Option<String>,
    pub version: Option<String>,
    pub version_mode: Option<IncrementMode>,
    pub include_demo: bool,
    /// Base for change detection on pull-request, push and fallback runs
    pub base_ref: Option<String>,
    pub head_ref: String,
}

impl TriggerContext {
    pub fn new(event: TriggerKind) -> Self {
        TriggerContext {
            event,
            apps: None,
            version: None,
            version_mode: None,
            include_demo: false,
            base_ref: None,
            head_ref: "HEAD".to_string(),
        }
    }
}

/// How each selected app gets its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    /// Same version for every app
    Fixed(ReleaseVersion),
    /// Bump each app's latest tag
    Increment(IncrementMode),
}

/// A plan plus the non-fatal conditions met while building it
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: ReleasePlan,
    pub changes: Option<ChangeSet>,
    pub warnings: Vec<BoundaryWarning>,
}

/// Check the trigger inputs without touching any collaborator.
pub fn validate_trigger(context: &TriggerContext) -> Result<VersionRequest> {
    if let Some(mode) = context.version_mode {
        if context.event != TriggerKind::Manual {
            return Err(ReleaseError::trigger(format!(
                "version mode {:?} is only valid for manual releases, not {}",
                mode, context.event
            )));
        }
    }

    match &context.event {
        TriggerKind::Manual => {
            let has_selector = context
                .apps
                .as_deref()
                .is_some_and(|apps| !apps.trim().is_empty());
            if !has_selector {
                return Err(ReleaseError::trigger(
                    "manual releases require an app selector (app names, a domain, or 'all')",
                ));
            }

            match (&context.version, context.version_mode) {
                (Some(_), Some(_)) => Err(ReleaseError::trigger(
                    "both a version and a version mode were given; supply exactly one",
                )),
                (None, None) => Err(ReleaseError::trigger(
                    "manual releases need either a version or a version mode (increment_minor, increment_patch)",
                )),
                (Some(version), None) => Ok(VersionRequest::Fixed(ReleaseVersion::parse(version)?)),
                (None, Some(mode)) => Ok(VersionRequest::Increment(mode)),
            }
        }
        TriggerKind::TagPush { tag } => Ok(VersionRequest::Fixed(ReleaseVersion::Semantic(
            version_from_tag(tag)?,
        ))),
        TriggerKind::PullRequest | TriggerKind::Push | TriggerKind::Fallback => {
            let version = match &context.version {
                Some(version) => ReleaseVersion::parse(version)?,
                None => ReleaseVersion::Latest,
            };
            Ok(VersionRequest::Fixed(version))
        }
    }
}

/// Plans releases against one repository, build graph and inventory
pub struct ReleasePlanner<'a, R: Repository + ?Sized, G: BuildGraph + ?Sized> {
    repo: &'a R,
    graph: &'a G,
    inventory: &'a Inventory,
    config: &'a Config,
}

impl<'a, R: Repository + ?Sized, G: BuildGraph + ?Sized> ReleasePlanner<'a, R, G> {
    pub fn new(repo: &'a R, graph: &'a G, inventory: &'a Inventory, config: &'a Config) -> Self {
        ReleasePlanner {
            repo,
            graph,
            inventory,
            config,
        }
    }

    pub fn plan(&self, context: &TriggerContext) -> Result<PlanOutcome> {
        let request = validate_trigger(context)?;
        let options = SelectorOptions {
            demo_domain: &self.config.selection.demo_domain,
            include_demo: context.include_demo,
        };

        // Resolve the selector up front so a bad one fails before any query.
        let explicit = context
            .apps
            .as_deref()
            .filter(|apps| !apps.trim().is_empty())
            .map(|apps| resolve_selector(self.inventory, apps, options))
            .transpose()?;

        let (apps, changes) = match &context.event {
            TriggerKind::Manual => (explicit.unwrap_or_default(), None),
            TriggerKind::TagPush { tag } => {
                let previous = self.repo.previous_tag(tag)?;
                debug!(tag = tag.as_str(), previous = ?previous, "detecting changes since previous tag");
                let changes = self.detect(previous.as_deref(), tag)?;
                (narrow(&changes.apps, explicit.as_deref()), Some(changes))
            }
            TriggerKind::PullRequest | TriggerKind::Push | TriggerKind::Fallback => {
                let changes = self.detect(context.base_ref.as_deref(), &context.head_ref)?;
                (narrow(&changes.apps, explicit.as_deref()), Some(changes))
            }
        };

        let entries = self.resolve_versions(&apps, &request)?;
        let nominal = match request {
            VersionRequest::Fixed(version) => Some(version),
            VersionRequest::Increment(_) => None,
        };

        let plan = ReleasePlan {
            event: context.event.clone(),
            version: nominal,
            entries,
        };
        info!(event = %plan.event, apps = plan.entries.len(), "release plan ready");

        let warnings = changes
            .as_ref()
            .map(|c| c.warnings.clone())
            .unwrap_or_default();
        Ok(PlanOutcome {
            plan,
            changes,
            warnings,
        })
    }

    fn detect(&self, base: Option<&str>, head: &str) -> Result<ChangeSet> {
        let detector = ChangeDetector::new(
            self.repo,
            self.graph,
            &self.config.changes,
            self.config.build_graph.batch_size,
        )?;
        detector.detect(base, head, self.inventory)
    }

    fn resolve_versions(
        &self,
        apps: &[AppDescriptor],
        request: &VersionRequest,
    ) -> Result<Vec<ReleaseMatrixEntry>> {
        let entry = |app: &AppDescriptor, version: ReleaseVersion| ReleaseMatrixEntry {
            app: app.name.clone(),
            domain: app.domain.clone(),
            target: app.target.clone(),
            version,
        };

        match request {
            VersionRequest::Fixed(version) => {
                Ok(apps.iter().map(|app| entry(app, version.clone())).collect())
            }
            VersionRequest::Increment(mode) => {
                if apps.is_empty() {
                    return Ok(Vec::new());
                }
                let latest = latest_versions(&self.repo.list_tags()?);
                Ok(apps
                    .iter()
                    .map(|app| {
                        let version = match latest.get(&app.qualified_name()) {
                            Some(current) => current.bump(*mode),
                            None => {
                                debug!(app = %app.qualified_name(), "no previous tag, seeding");
                                mode.seed()
                            }
                        };
                        entry(app, ReleaseVersion::Semantic(version))
                    })
                    .collect())
            }
        }
    }
}

/// Keep detected apps that were also explicitly selected, if any were.
fn narrow(detected: &[AppDescriptor], explicit: Option<&[AppDescriptor]>) -> Vec<AppDescriptor> {
    match explicit {
        Some(selected) => detected
            .iter()
            .filter(|app| {
                selected
                    .iter()
                    .any(|s| s.domain == app.domain && s.name == app.name)
            })
            .cloned()
            .collect(),
        None => detected.to_vec(),
    }
}
