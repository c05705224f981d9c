//! Command-line surface
//!
//! Argument types live here so they can be parsed in tests; the work each
//! command does lives in [orchestration].

pub mod orchestration;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "release-helper",
    version,
    about = "Change detection, release planning and artifact cleanup for a monorepo"
)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, global = true, default_value = ".", help = "Repository to operate on")]
    pub repo: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List every releasable app in the build graph
    ListApps {
        #[arg(long, help = "Emit JSON")]
        json: bool,
    },

    /// Show apps affected by changes since a base reference
    Changes {
        #[arg(long, help = "Base commit or tag; all apps are affected when absent")]
        base: Option<String>,

        #[arg(long, default_value = "HEAD")]
        head: String,

        #[arg(long, help = "Emit JSON")]
        json: bool,
    },

    /// Compute the release matrix for a trigger
    Plan {
        #[command(flatten)]
        trigger: TriggerArgs,

        #[arg(long, help = "Emit the matrix as JSON")]
        json: bool,
    },

    /// Plan, then tag, push and publish releases
    Release {
        #[command(flatten)]
        trigger: TriggerArgs,

        #[arg(long, help = "Move tags that point at another commit")]
        force: bool,

        #[arg(long, help = "Release over versions the registry already holds")]
        allow_overwrite: bool,

        #[arg(long, value_name = "APP=PATH", help = "Attach a file to an app's release")]
        asset: Vec<String>,

        #[arg(long, help = "Release notes body")]
        notes: Option<String>,

        #[arg(long, help = "Preview without tagging or publishing")]
        dry_run: bool,

        #[arg(long, help = "Emit JSON")]
        json: bool,
    },

    /// Apply the retention policy to one or more domains
    Cleanup {
        #[arg(required = true, help = "Domains to clean up")]
        domains: Vec<String>,

        #[arg(long, help = "Minor-version lines to keep per app")]
        keep_minor_versions: Option<usize>,

        #[arg(long, help = "Never delete anything younger than this")]
        min_age_days: Option<i64>,

        #[arg(long, help = "Preview without deleting")]
        dry_run: bool,

        #[arg(short, long, help = "Skip the confirmation prompt")]
        yes: bool,

        #[arg(long, help = "Emit JSON")]
        json: bool,
    },
}

/// Inputs that describe what triggered a release
#[derive(Debug, Clone, Args)]
pub struct TriggerArgs {
    #[arg(long, env = "GITHUB_EVENT_NAME", default_value = "workflow_dispatch")]
    pub event: String,

    #[arg(long = "ref", env = "GITHUB_REF", help = "Git ref of the event")]
    pub git_ref: Option<String>,

    #[arg(long, help = "App selector: names, domains, or 'all'")]
    pub apps: Option<String>,

    #[arg(long, help = "Explicit version, or 'latest'")]
    pub version: Option<String>,

    #[arg(long, help = "increment_minor or increment_patch")]
    pub version_mode: Option<String>,

    #[arg(long, help = "Let 'all' include the demo domain")]
    pub include_demo: bool,

    #[arg(long, help = "Base for change detection")]
    pub base: Option<String>,

    #[arg(long, default_value = "HEAD")]
    pub head: String,
}
