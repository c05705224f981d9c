use thiserror::Error;

/// Unified error type for release-helper operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Invalid trigger input: {0}")]
    InvalidTrigger(String),

    #[error("Unknown app '{selector}'. Available: {}", available.join(", "))]
    UnknownApp {
        selector: String,
        available: Vec<String>,
    },

    #[error("App name '{selector}' is ambiguous, matches: {}", candidates.join(", "))]
    AmbiguousApp {
        selector: String,
        candidates: Vec<String>,
    },

    #[error("App '{0}' was selected more than once")]
    DuplicateSelection(String),

    #[error("Duplicate app in build graph: {0}")]
    DuplicateApp(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("VCS error: {0}")]
    Vcs(String),

    #[error("Build graph query failed: {0}")]
    BuildGraph(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Release host error: {0}")]
    ReleaseHost(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results in release-helper
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::InvalidVersion(msg.into())
    }

    pub fn tag(msg: impl Into<String>) -> Self {
        ReleaseError::InvalidTag(msg.into())
    }

    pub fn trigger(msg: impl Into<String>) -> Self {
        ReleaseError::InvalidTrigger(msg.into())
    }

    pub fn vcs(msg: impl Into<String>) -> Self {
        ReleaseError::Vcs(msg.into())
    }

    pub fn build_graph(msg: impl Into<String>) -> Self {
        ReleaseError::BuildGraph(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        ReleaseError::Registry(msg.into())
    }

    pub fn release_host(msg: impl Into<String>) -> Self {
        ReleaseError::ReleaseHost(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ReleaseError::Conflict(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// True for errors raised from caller input alone, before any
    /// collaborator was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReleaseError::InvalidVersion(_)
                | ReleaseError::InvalidTag(_)
                | ReleaseError::InvalidTrigger(_)
                | ReleaseError::UnknownApp { .. }
                | ReleaseError::AmbiguousApp { .. }
                | ReleaseError::DuplicateSelection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::config("missing remote");
        assert_eq!(err.to_string(), "Configuration error: missing remote");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_unknown_app_lists_alternatives() {
        let err = ReleaseError::UnknownApp {
            selector: "nope".to_string(),
            available: vec!["demo-hello_go".to_string(), "demo-hello_python".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("nope"));
        assert!(msg.contains("demo-hello_go, demo-hello_python"));
    }

    #[test]
    fn test_ambiguous_app_names_candidates() {
        let err = ReleaseError::AmbiguousApp {
            selector: "api".to_string(),
            candidates: vec!["billing-api".to_string(), "search-api".to_string()],
        };
        assert!(err.to_string().contains("billing-api, search-api"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(ReleaseError::version("x").is_validation());
        assert!(ReleaseError::trigger("x").is_validation());
        assert!(ReleaseError::DuplicateSelection("demo-a".into()).is_validation());
        assert!(!ReleaseError::registry("x").is_validation());
        assert!(!ReleaseError::conflict("x").is_validation());
        assert!(!ReleaseError::vcs("x").is_validation());
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (ReleaseError::version("x"), "Invalid version"),
            (ReleaseError::tag("x"), "Invalid tag"),
            (ReleaseError::build_graph("x"), "Build graph query failed"),
            (ReleaseError::release_host("x"), "Release host error"),
            (ReleaseError::conflict("x"), "Conflict"),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
