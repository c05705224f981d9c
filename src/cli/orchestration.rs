//! Command workflows
//!
//! Wires configuration and the real collaborators (git2, bazel, gh) into the
//! planning and cleanup core, and renders the results. Argument handling
//! that needs no collaborator is kept in plain functions so it can be
//! tested directly.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analyzer::{ChangeDetector, RetentionPolicy};
use crate::cli::{Cli, Commands, TriggerArgs};
use crate::config::{load_config, Config, RetentionConfig};
use crate::domain::{CleanupResult, IncrementMode, RetentionDecision, TriggerKind};
use crate::error::ReleaseError;
use crate::git::{Git2Repository, Repository};
use crate::graph::BazelQuery;
use crate::hosting::GhCli;
use crate::inventory::Inventory;
use crate::orchestrator::{CleanupOrchestrator, CleanupPlanner, ReleaseExecutor, ReleaseOptions};
use crate::planner::{validate_trigger, ReleasePlanner, TriggerContext};
use crate::ui;

/// Configuration and collaborators for one invocation
pub struct Session {
    pub config: Config,
    repo: Git2Repository,
    graph: BazelQuery,
}

impl Session {
    pub fn open(repo_path: &Path, config_path: Option<&str>) -> Result<Self> {
        let config = load_config(config_path).context("Failed to load configuration")?;
        let repo = Git2Repository::open(repo_path).context("Failed to open git repository")?;
        let workspace = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo_path.to_path_buf());
        let graph = BazelQuery::new(
            config.build_graph.bazel.clone(),
            workspace,
            config.build_graph.metadata_kind.clone(),
        );

        Ok(Session { config, repo, graph })
    }

    fn inventory(&self) -> Result<Inventory> {
        let inventory = Inventory::discover(&self.graph, &self.config.build_graph.target_pattern)
            .context("Failed to discover apps")?;
        Ok(inventory)
    }

    fn github(&self) -> Result<GhCli> {
        let repository = self.config.repository.github_repository()?;
        let owner = self.config.registry_owner()?;
        Ok(GhCli::new(repository, owner))
    }
}

/// Build a trigger context from command-line inputs.
pub fn trigger_context(args: &TriggerArgs) -> crate::error::Result<TriggerContext> {
    let version_mode = args
        .version_mode
        .as_deref()
        .map(str::parse::<IncrementMode>)
        .transpose()?;

    Ok(TriggerContext {
        event: TriggerKind::from_event(&args.event, args.git_ref.as_deref()),
        apps: args.apps.clone(),
        version: args.version.clone(),
        version_mode,
        include_demo: args.include_demo,
        base_ref: args.base.clone(),
        head_ref: args.head.clone(),
    })
}

/// Parse `domain-app=path` asset specs.
pub fn parse_assets(specs: &[String]) -> crate::error::Result<BTreeMap<String, Vec<PathBuf>>> {
    let mut assets: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for spec in specs {
        let (app, path) = spec
            .split_once('=')
            .filter(|(app, path)| !app.is_empty() && !path.is_empty())
            .ok_or_else(|| {
                ReleaseError::trigger(format!("asset '{}' must look like domain-app=path", spec))
            })?;
        assets.entry(app.to_string()).or_default().push(PathBuf::from(path));
    }
    Ok(assets)
}

/// Retention settings with command-line overrides applied.
pub fn retention_settings(
    config: &RetentionConfig,
    keep_minor_versions: Option<usize>,
    min_age_days: Option<i64>,
) -> crate::error::Result<RetentionConfig> {
    let settings = RetentionConfig {
        keep_minor_versions: keep_minor_versions.unwrap_or(config.keep_minor_versions),
        min_age_days: min_age_days.unwrap_or(config.min_age_days),
    };
    if settings.keep_minor_versions == 0 {
        return Err(ReleaseError::config("keep-minor-versions must be at least 1"));
    }
    if settings.min_age_days < 0 {
        return Err(ReleaseError::config("min-age-days cannot be negative"));
    }
    Ok(settings)
}

/// Run a parsed command line. `Ok(false)` means the command completed but
/// reported failures (cleanup errors).
pub fn run(cli: Cli) -> Result<bool> {
    // Trigger inputs are validated before anything is opened or queried.
    let validated = match &cli.command {
        Commands::Plan { trigger, .. } | Commands::Release { trigger, .. } => {
            let context = trigger_context(trigger)?;
            validate_trigger(&context)?;
            Some(context)
        }
        _ => None,
    };

    let session = Session::open(&cli.repo, cli.config.as_deref())?;

    match cli.command {
        Commands::ListApps { json } => list_apps(&session, json).map(|_| true),
        Commands::Changes { base, head, json } => {
            changes(&session, base.as_deref(), &head, json).map(|_| true)
        }
        Commands::Plan { json, .. } => {
            let context = validated.context("trigger context missing")?;
            plan(&session, &context, json).map(|_| true)
        }
        Commands::Release {
            force,
            allow_overwrite,
            asset,
            notes,
            dry_run,
            json,
            ..
        } => {
            let context = validated.context("trigger context missing")?;
            let options = ReleaseOptions {
                force,
                allow_overwrite,
                dry_run,
                assets: parse_assets(&asset)?,
                notes,
                ..ReleaseOptions::default()
            };
            release(&session, &context, &options, json).map(|_| true)
        }
        Commands::Cleanup {
            domains,
            keep_minor_versions,
            min_age_days,
            dry_run,
            yes,
            json,
        } => {
            let settings = retention_settings(
                &session.config.retention,
                keep_minor_versions,
                min_age_days,
            )?;
            cleanup(&session, &domains, settings, dry_run, yes, json)
        }
    }
}

pub fn list_apps(session: &Session, json: bool) -> Result<()> {
    let mut inventory = session.inventory()?;
    inventory.annotate_versions(&session.repo.list_tags()?);

    if json {
        ui::print_json(inventory.apps())
    } else {
        ui::display_apps(&inventory);
        Ok(())
    }
}

pub fn changes(session: &Session, base: Option<&str>, head: &str, json: bool) -> Result<()> {
    let inventory = session.inventory()?;
    let detector = ChangeDetector::new(
        &session.repo,
        &session.graph,
        &session.config.changes,
        session.config.build_graph.batch_size,
    )?;
    let changes = detector
        .detect(base, head, &inventory)
        .context("Change detection failed")?;

    if json {
        for warning in &changes.warnings {
            ui::display_boundary_warning(warning);
        }
        ui::print_json(&changes)
    } else {
        ui::display_changes(&changes);
        Ok(())
    }
}

pub fn plan(session: &Session, context: &TriggerContext, json: bool) -> Result<()> {
    let inventory = session.inventory()?;
    let planner = ReleasePlanner::new(&session.repo, &session.graph, &inventory, &session.config);
    let outcome = planner.plan(context).context("Release planning failed")?;

    for warning in &outcome.warnings {
        ui::display_boundary_warning(warning);
    }
    if json {
        ui::print_json(&outcome.plan.to_matrix_json())
    } else {
        ui::display_plan(&outcome.plan);
        Ok(())
    }
}

pub fn release(
    session: &Session,
    context: &TriggerContext,
    options: &ReleaseOptions,
    json: bool,
) -> Result<()> {
    let inventory = session.inventory()?;
    let planner = ReleasePlanner::new(&session.repo, &session.graph, &inventory, &session.config);
    let outcome = planner.plan(context).context("Release planning failed")?;
    for warning in &outcome.warnings {
        ui::display_boundary_warning(warning);
    }

    if outcome.plan.is_empty() {
        if json {
            return ui::print_json(&outcome.plan.to_matrix_json());
        }
        ui::display_status("Nothing to release");
        return Ok(());
    }

    let github = session.github()?;
    let executor = ReleaseExecutor::new(&session.repo, &github, &github, &session.config);
    let report = executor
        .execute(&outcome.plan, options)
        .context("Release failed")?;

    if json {
        ui::print_json(&report)
    } else {
        ui::display_plan(&outcome.plan);
        ui::display_release_report(&report);
        Ok(())
    }
}

#[derive(Serialize)]
struct DomainCleanup<'a> {
    decision: &'a RetentionDecision,
    result: &'a CleanupResult,
}

pub fn cleanup(
    session: &Session,
    domains: &[String],
    settings: RetentionConfig,
    dry_run: bool,
    yes: bool,
    json: bool,
) -> Result<bool> {
    let github = session.github()?;
    let planner = CleanupPlanner::new(
        &session.repo,
        &github,
        &github,
        &session.config.registry,
        RetentionPolicy::from_config(&settings),
    );

    let now = Utc::now();
    let mut decisions = Vec::new();
    for domain in domains {
        let planned = planner
            .plan(domain, now)
            .with_context(|| format!("Cleanup planning failed for domain '{}'", domain))?;
        for warning in &planned.warnings {
            ui::display_boundary_warning(warning);
        }
        if !json {
            ui::display_retention(&planned.decision);
        }
        decisions.push(planned.decision);
    }

    let pending: usize = decisions.iter().map(|d| d.delete.len()).sum();
    if !dry_run && !yes && pending > 0 {
        let prompt = format!("Delete {} tags and their releases and packages?", pending);
        if !ui::confirm_action(&prompt)? {
            ui::display_status("Cleanup cancelled; pass --yes to run unattended");
            return Ok(true);
        }
    }

    let orchestrator = CleanupOrchestrator::new(
        &session.repo,
        &github,
        &github,
        &session.config.repository.remote,
    );

    let mut success = true;
    let mut report = Vec::new();
    let results: Vec<CleanupResult> = decisions
        .iter()
        .map(|decision| orchestrator.execute(decision, dry_run))
        .collect();

    for (decision, result) in decisions.iter().zip(&results) {
        success &= result.success();
        if json {
            report.push(DomainCleanup { decision, result });
        } else {
            ui::display_cleanup_result(result);
        }
    }

    if json {
        ui::print_json(&report)?;
    }
    info!(domains = domains.len(), success, "cleanup complete");
    Ok(success)
}
