use serde::{Serialize, Serializer};
use std::fmt;

/// What started a planning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    /// Manual dispatch; the only trigger that accepts increment modes
    Manual,
    /// A tag was pushed; the tag carries the release version
    TagPush { tag: String },
    PullRequest,
    Push,
    /// Any other event (schedules, re-runs, local invocations)
    Fallback,
}

impl TriggerKind {
    /// Map a CI event name and ref onto a trigger kind.
    pub fn from_event(event: &str, git_ref: Option<&str>) -> Self {
        match event {
            "workflow_dispatch" | "manual" | "dispatch" => TriggerKind::Manual,
            "push" => match git_ref.and_then(|r| r.strip_prefix("refs/tags/")) {
                Some(tag) => TriggerKind::TagPush {
                    tag: tag.to_string(),
                },
                None => TriggerKind::Push,
            },
            "tag" | "tag_push" => match git_ref {
                Some(r) => TriggerKind::TagPush {
                    tag: r.trim_start_matches("refs/tags/").to_string(),
                },
                None => TriggerKind::Fallback,
            },
            "pull_request" | "pull_request_target" => TriggerKind::PullRequest,
            _ => TriggerKind::Fallback,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Manual => "manual",
            TriggerKind::TagPush { .. } => "tag_push",
            TriggerKind::PullRequest => "pull_request",
            TriggerKind::Push => "push",
            TriggerKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TriggerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
