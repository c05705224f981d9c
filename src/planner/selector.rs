//! App selector resolution
//!
//! A selector is a comma- or whitespace-separated list of tokens. Each token
//! is one of:
//!
//! - `all`: every app, minus the demo domain unless it is included
//! - `domain/app`: exactly one app
//! - `domain-app`: exactly one app
//! - a domain name: every app in that domain
//! - a bare app name: the one app with that name, anywhere
//!
//! The resolved list keeps selection order and never contains the same app
//! twice. Naming an app twice (for instance a domain and one of its apps) is
//! an error rather than silently collapsed.

use crate::domain::AppDescriptor;
use crate::error::{ReleaseError, Result};
use crate::inventory::Inventory;
use std::collections::HashSet;

pub const ALL: &str = "all";

/// How `all` treats the demo/sandbox domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorOptions<'a> {
    pub demo_domain: &'a str,
    pub include_demo: bool,
}

/// Resolve `selector` against the inventory.
pub fn resolve_selector(
    inventory: &Inventory,
    selector: &str,
    options: SelectorOptions<'_>,
) -> Result<Vec<AppDescriptor>> {
    let tokens: Vec<&str> = selector
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(ReleaseError::trigger("app selector is empty"));
    }

    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for token in tokens {
        for app in resolve_token(inventory, token, options)? {
            if !seen.insert((app.domain.clone(), app.name.clone())) {
                return Err(ReleaseError::DuplicateSelection(app.qualified_name()));
            }
            selected.push(app.clone());
        }
    }

    Ok(selected)
}

fn resolve_token<'i>(
    inventory: &'i Inventory,
    token: &str,
    options: SelectorOptions<'_>,
) -> Result<Vec<&'i AppDescriptor>> {
    if token == ALL {
        return Ok(inventory
            .apps()
            .iter()
            .filter(|a| options.include_demo || a.domain != options.demo_domain)
            .collect());
    }

    if let Some((domain, name)) = token.split_once('/') {
        return inventory
            .apps()
            .iter()
            .find(|a| a.domain == domain && a.name == name)
            .map(|a| vec![a])
            .ok_or_else(|| unknown(inventory, token));
    }

    if let Some(app) = inventory.apps().iter().find(|a| a.qualified_name() == token) {
        return Ok(vec![app]);
    }

    if inventory.domains().contains(token) {
        return Ok(inventory.apps().iter().filter(|a| a.domain == token).collect());
    }

    let candidates: Vec<&AppDescriptor> =
        inventory.apps().iter().filter(|a| a.name == token).collect();

    match candidates.len() {
        0 => Err(unknown(inventory, token)),
        1 => Ok(candidates),
        _ => Err(ReleaseError::AmbiguousApp {
            selector: token.to_string(),
            candidates: candidates.iter().map(|a| a.qualified_name()).collect(),
        }),
    }
}

fn unknown(inventory: &Inventory, token: &str) -> ReleaseError {
    let mut available: Vec<String> = inventory
        .domains()
        .into_iter()
        .map(str::to_string)
        .collect();
    available.extend(inventory.qualified_names());
    available.push(ALL.to_string());

    ReleaseError::UnknownApp {
        selector: token.to_string(),
        available,
    }
}
