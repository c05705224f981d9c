use std::fmt;

/// Non-fatal conditions met while planning or releasing.
/// These are reported to the user but never abort a run.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// No base reference could be resolved, so every app counts as changed
    NoBaseReference { requested: Option<String> },
    /// A tag in history could not be decoded and was skipped
    UnparsableTag { tag: String, reason: String },
    /// A batched graph query failed and was retried item by item
    BatchQueryDegraded { nodes: usize, reason: String },
    /// A single graph node could not be queried
    QueryFailed { node: String, reason: String },
    /// The tag already points at the release commit
    TagAlreadyExists { tag: String },
    /// A hosted release already exists for the tag
    ReleaseAlreadyExists { tag: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::NoBaseReference { requested } => match requested {
                Some(base) => write!(
                    f,
                    "Base reference '{}' not found; treating all apps as changed",
                    base
                ),
                None => write!(f, "No base reference; treating all apps as changed"),
            },
            BoundaryWarning::UnparsableTag { tag, reason } => {
                write!(f, "Skipping tag '{}': {}", tag, reason)
            }
            BoundaryWarning::BatchQueryDegraded { nodes, reason } => write!(
                f,
                "Batch query over {} nodes failed ({}); retried individually",
                nodes, reason
            ),
            BoundaryWarning::QueryFailed { node, reason } => {
                write!(f, "Could not query '{}': {}", node, reason)
            }
            BoundaryWarning::TagAlreadyExists { tag } => {
                write!(f, "Tag '{}' already exists at the release commit", tag)
            }
            BoundaryWarning::ReleaseAlreadyExists { tag } => {
                write!(f, "Release for '{}' already exists", tag)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_base_reference_display() {
        let warning = BoundaryWarning::NoBaseReference {
            requested: Some("abc123".to_string()),
        };
        assert!(warning.to_string().contains("abc123"));
        assert!(warning.to_string().contains("all apps"));
    }

    #[test]
    fn test_unparsable_tag_display() {
        let warning = BoundaryWarning::UnparsableTag {
            tag: "nightly".to_string(),
            reason: "lacks a .v version marker".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "Skipping tag 'nightly': lacks a .v version marker"
        );
    }
}
