use crate::error::{ReleaseError, Result};
use crate::git::sort_tags_by_version_desc;
use chrono::{DateTime, Utc};
use git2::{ErrorCode, ObjectType, Oid, Repository as Git2Repo};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    /// Root of the working tree; `None` for bare repositories
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    fn tree_of(&self, rev: &str) -> Result<git2::Tree<'_>> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|e| ReleaseError::vcs(format!("Cannot resolve '{}': {}", rev, e)))?;
        Ok(object.peel_to_tree()?)
    }

    fn push_refspec(&self, remote_name: &str, refspec: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|_| ReleaseError::vcs(format!("No remote named '{}' found", remote_name)))?;

        let mut callbacks = remote_callbacks();
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, status
            ))),
            None => Ok(()),
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        debug!(remote = remote_name, refspec, "pushing");
        remote.push(&[refspec], Some(&mut push_options)).map_err(|e| {
            if e.class() == git2::ErrorClass::Net {
                ReleaseError::vcs(format!("Network error during push of {}: {}", refspec, e))
            } else {
                ReleaseError::vcs(format!("Push of {} failed: {}", refspec, e))
            }
        })
    }
}

/// Credentials from the usual SSH keys, the SSH agent, or the default helper.
fn remote_callbacks<'a>() -> git2::RemoteCallbacks<'a> {
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(git2::CredentialType::SSH_KEY) {
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = git2::Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }

            if let Ok(cred) = git2::Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
        }

        if allowed_types.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                return git2::Cred::userpass_plaintext("x-access-token", &token);
            }
        }

        git2::Cred::default()
    });
    callbacks
}

fn timestamp(time: git2::Time) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(time.seconds(), 0)
        .ok_or_else(|| ReleaseError::vcs(format!("Invalid timestamp {}", time.seconds())))
}

impl super::Repository for Git2Repository {
    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let base_tree = self.tree_of(base)?;
        let head_tree = self.tree_of(head)?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)?;

        let paths: BTreeSet<String> = diff
            .deltas()
            .flat_map(|delta| [delta.old_file().path(), delta.new_file().path()])
            .flatten()
            .filter_map(|path| path.to_str())
            .map(str::to_string)
            .collect();
        let paths: Vec<String> = paths.into_iter().collect();

        debug!(base, head, count = paths.len(), "diffed revisions");
        Ok(paths)
    }

    fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        match self.repo.revparse_single(rev) {
            Ok(object) => Ok(Some(object.peel_to_commit()?.id().to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(ReleaseError::vcs(format!("Cannot resolve '{}': {}", rev, e))),
        }
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let names = self.repo.tag_names(None)?;
        let mut tags: Vec<String> = names.iter().flatten().map(|s| s.to_string()).collect();
        sort_tags_by_version_desc(&mut tags);
        Ok(tags)
    }

    fn tag_date(&self, name: &str) -> Result<DateTime<Utc>> {
        let reference = self
            .repo
            .find_reference(&format!("refs/tags/{}", name))
            .map_err(|e| ReleaseError::vcs(format!("Cannot find tag '{}': {}", name, e)))?;

        let object = reference.peel(ObjectType::Any)?;
        if let Some(tag) = reference
            .target()
            .and_then(|oid| self.repo.find_tag(oid).ok())
        {
            if let Some(tagger) = tag.tagger() {
                return timestamp(tagger.when());
            }
        }

        let commit = object.peel_to_commit()?;
        timestamp(commit.time())
    }

    fn tag_target(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_reference(&format!("refs/tags/{}", name)) {
            Ok(reference) => {
                let commit = reference
                    .peel_to_commit()
                    .map_err(|e| ReleaseError::vcs(format!("Cannot peel tag '{}': {}", name, e)))?;
                Ok(Some(commit.id().to_string()))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(ReleaseError::vcs(format!(
                "Cannot find tag '{}': {}",
                name, e
            ))),
        }
    }

    fn create_tag(&self, name: &str, target: &str, force: bool) -> Result<()> {
        let oid = Oid::from_str(target)
            .or_else(|_| self.repo.revparse_single(target).map(|o| o.id()))
            .map_err(|e| ReleaseError::vcs(format!("Cannot resolve '{}': {}", target, e)))?;
        let object = self
            .repo
            .find_object(oid, None)
            .map_err(|e| ReleaseError::vcs(format!("Cannot find object: {}", e)))?;

        self.repo
            .tag_lightweight(name, &object, force)
            .map_err(|e| {
                if e.code() == ErrorCode::Exists {
                    ReleaseError::conflict(format!("Tag '{}' already exists", name))
                } else {
                    ReleaseError::vcs(format!("Cannot create tag '{}': {}", name, e))
                }
            })?;

        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.repo
            .tag_delete(name)
            .map_err(|e| ReleaseError::vcs(format!("Cannot delete tag '{}': {}", name, e)))
    }

    fn push_tag(&self, remote: &str, name: &str, force: bool) -> Result<()> {
        let prefix = if force { "+" } else { "" };
        self.push_refspec(
            remote,
            &format!("{}refs/tags/{}:refs/tags/{}", prefix, name, name),
        )
    }

    fn delete_remote_tag(&self, remote: &str, name: &str) -> Result<()> {
        self.push_refspec(remote, &format!(":refs/tags/{}", name))
    }
}
