use crate::error::{ReleaseError, Result};
use crate::git::{sort_tags_by_version_desc, Repository};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct MockTag {
    target: String,
    created: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    commits: HashMap<String, String>,
    tags: BTreeMap<String, MockTag>,
    remote_tags: BTreeSet<String>,
    changed: HashMap<(String, String), Vec<String>>,
    failing_diffs: HashSet<String>,
    failing_remote_deletes: HashSet<String>,
    failing_dates: HashSet<String>,
}

/// Mock repository for testing without actual git operations
///
/// Tags added through [MockRepository::add_tag] exist both locally and on
/// the remote.
pub struct MockRepository {
    state: Mutex<State>,
}

impl MockRepository {
    /// Create a new empty mock repository
    pub fn new() -> Self {
        MockRepository {
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `rev` resolve to `sha`
    pub fn add_commit(&self, rev: impl Into<String>, sha: impl Into<String>) {
        self.state().commits.insert(rev.into(), sha.into());
    }

    /// Add a tag pointing at `target`
    pub fn add_tag(&self, name: impl Into<String>, target: impl Into<String>, created: DateTime<Utc>) {
        let name = name.into();
        let mut state = self.state();
        state.remote_tags.insert(name.clone());
        state.tags.insert(
            name,
            MockTag {
                target: target.into(),
                created,
            },
        );
    }

    /// Set the diff returned for `base..head`
    pub fn set_changed_files(&self, base: &str, head: &str, files: &[&str]) {
        self.state().changed.insert(
            (base.to_string(), head.to_string()),
            files.iter().map(|f| f.to_string()).collect(),
        );
    }

    /// Make diffs from `base` fail
    pub fn fail_diff_from(&self, base: &str) {
        self.state().failing_diffs.insert(base.to_string());
    }

    /// Make remote deletion of `tag` fail
    pub fn fail_remote_delete(&self, tag: &str) {
        self.state().failing_remote_deletes.insert(tag.to_string());
    }

    /// Make the date lookup for `tag` fail
    pub fn fail_tag_date(&self, tag: &str) {
        self.state().failing_dates.insert(tag.to_string());
    }

    pub fn local_tags(&self) -> Vec<String> {
        self.state().tags.keys().cloned().collect()
    }

    pub fn remote_tags(&self) -> Vec<String> {
        self.state().remote_tags.iter().cloned().collect()
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let state = self.state();
        if state.failing_diffs.contains(base) {
            return Err(ReleaseError::vcs(format!("cannot diff {}..{}", base, head)));
        }
        Ok(state
            .changed
            .get(&(base.to_string(), head.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        let state = self.state();
        if let Some(sha) = state.commits.get(rev) {
            return Ok(Some(sha.clone()));
        }
        Ok(state.tags.get(rev).map(|t| t.target.clone()))
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self.state().tags.keys().cloned().collect();
        sort_tags_by_version_desc(&mut tags);
        Ok(tags)
    }

    fn tag_date(&self, name: &str) -> Result<DateTime<Utc>> {
        let state = self.state();
        if state.failing_dates.contains(name) {
            return Err(ReleaseError::vcs(format!("cannot read date of {}", name)));
        }
        state
            .tags
            .get(name)
            .map(|t| t.created)
            .ok_or_else(|| ReleaseError::vcs(format!("tag not found: {}", name)))
    }

    fn tag_target(&self, name: &str) -> Result<Option<String>> {
        Ok(self.state().tags.get(name).map(|t| t.target.clone()))
    }

    fn create_tag(&self, name: &str, target: &str, force: bool) -> Result<()> {
        let mut state = self.state();
        if state.tags.contains_key(name) && !force {
            return Err(ReleaseError::conflict(format!("tag {} already exists", name)));
        }
        state.tags.insert(
            name.to_string(),
            MockTag {
                target: target.to_string(),
                created: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.state()
            .tags
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ReleaseError::vcs(format!("tag not found: {}", name)))
    }

    fn push_tag(&self, _remote: &str, name: &str, _force: bool) -> Result<()> {
        let mut state = self.state();
        if !state.tags.contains_key(name) {
            return Err(ReleaseError::vcs(format!("tag not found: {}", name)));
        }
        state.remote_tags.insert(name.to_string());
        Ok(())
    }

    fn delete_remote_tag(&self, remote: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.failing_remote_deletes.contains(name) {
            return Err(ReleaseError::vcs(format!(
                "{} rejected deletion of {}",
                remote, name
            )));
        }
        state.remote_tags.remove(name);
        Ok(())
    }
}
