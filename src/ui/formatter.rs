//! Pure formatting functions for UI output.
//!
//! Everything here renders to stdout/stderr or returns a string; no prompts.

use crate::analyzer::ChangeSet;
use crate::boundary::BoundaryWarning;
use crate::domain::{CleanupResult, ReleasePlan, RetentionDecision};
use crate::inventory::Inventory;
use crate::orchestrator::ReleaseReport;
use console::style;

/// Print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Print a success message with a green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Print a status message with a yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Print a boundary warning to stderr.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠").yellow().bold(), warning);
}

pub fn display_apps(inventory: &Inventory) {
    if inventory.is_empty() {
        display_status("No releasable apps found");
        return;
    }

    println!("\n{}", style(format!("{} apps", inventory.len())).bold());
    for app in inventory.apps() {
        let version = app
            .current_version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "untagged".to_string());
        println!(
            "  {:<32} {:<10} {:<10} {}",
            app.qualified_name(),
            app.language,
            style(version).cyan(),
            style(&app.target).dim()
        );
    }
}

pub fn display_changes(changes: &ChangeSet) {
    for warning in &changes.warnings {
        display_boundary_warning(warning);
    }

    if changes.fail_open {
        display_status(&format!("All {} apps selected", changes.apps.len()));
    } else {
        println!(
            "\n{} files changed, {} relevant to builds",
            changes.changed_files.len(),
            changes.relevant_files.len()
        );
    }

    if changes.apps.is_empty() {
        display_status("No apps affected");
        return;
    }
    for name in changes.qualified_names() {
        println!("  {}", style(name).green());
    }
}

pub fn display_plan(plan: &ReleasePlan) {
    println!("\n{} ({})", style("Release plan").bold(), plan.event);
    if plan.is_empty() {
        display_status("Nothing to release");
        return;
    }
    for (app, version) in plan.versions() {
        println!("  {:<32} {}", app, style(version).cyan());
    }
}

pub fn display_release_report(report: &ReleaseReport) {
    for warning in &report.warnings {
        display_boundary_warning(warning);
    }
    let prefix = if report.dry_run { "Would publish" } else { "Published" };
    for tag in &report.tags {
        display_success(&format!("{} {}", prefix, tag));
    }
    for app in &report.untagged {
        display_status(&format!("{} released as latest (untagged)", app));
    }
}

pub fn display_retention(decision: &RetentionDecision) {
    println!(
        "\n{} {}: keep {}, delete {}",
        style("Retention").bold(),
        decision.domain,
        decision.keep.len(),
        decision.delete.len()
    );
    for tag in &decision.delete {
        let mut extras = Vec::new();
        if decision.releases.contains_key(tag) {
            extras.push("release".to_string());
        }
        if let Some(packages) = decision.packages.get(tag) {
            extras.push(format!("{} package versions", packages.len()));
        }
        if extras.is_empty() {
            println!("  {} {}", style("-").red(), tag);
        } else {
            println!("  {} {} ({})", style("-").red(), tag, extras.join(", "));
        }
    }
}

/// One-line cleanup summary.
pub fn format_cleanup_summary(result: &CleanupResult) -> String {
    let verb = if result.dry_run { "would delete" } else { "deleted" };
    format!(
        "{} {} releases, {} tags, {} package versions; {} failed",
        verb,
        result.deleted_releases.len(),
        result.deleted_tags.len(),
        result.deleted_packages.len(),
        result.errors.len()
    )
}

pub fn display_cleanup_result(result: &CleanupResult) {
    for error in &result.errors {
        display_error(&error.to_string());
    }
    let summary = format_cleanup_summary(result);
    if result.success() {
        display_success(&summary);
    } else {
        display_error(&summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CleanupError, CleanupPhase};

    #[test]
    fn test_cleanup_summary_counts() {
        let result = CleanupResult {
            dry_run: false,
            deleted_releases: vec!["demo-web.v1.0.0".to_string()],
            deleted_tags: vec!["demo-web.v1.0.0".to_string(), "demo-web.v1.1.0".to_string()],
            deleted_packages: vec![],
            errors: vec![CleanupError::new(CleanupPhase::Package, "demo-web@7", "HTTP 500")],
        };
        assert_eq!(
            format_cleanup_summary(&result),
            "deleted 1 releases, 2 tags, 0 package versions; 1 failed"
        );
    }

    #[test]
    fn test_cleanup_summary_dry_run() {
        let result = CleanupResult {
            dry_run: true,
            ..CleanupResult::default()
        };
        assert!(format_cleanup_summary(&result).starts_with("would delete"));
    }
}
