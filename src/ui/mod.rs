//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Confirmation prompts and machine-readable output

use std::io::{self, BufRead, Write};

use anyhow::Result;
use serde::Serialize;

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_apps, display_boundary_warning, display_changes, display_cleanup_result,
    display_error, display_plan, display_release_report, display_retention, display_status,
    display_success, format_cleanup_summary,
};

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Prompts user to confirm an action with a yes/no prompt.
///
/// Accepts "y" or "yes" (case-insensitive). Without an attended terminal
/// the answer is always no, so unattended runs must opt in explicitly.
pub fn confirm_action(prompt: &str) -> Result<bool> {
    if !console::user_attended_stderr() {
        return Ok(false);
    }

    // stdout is reserved for --json output
    Ok(ask(io::stdin().lock(), io::stderr().lock(), prompt)?)
}

fn ask(mut input: impl BufRead, mut output: impl Write, prompt: &str) -> io::Result<bool> {
    write!(output, "{} [y/N]: ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(is_yes(&line))
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
