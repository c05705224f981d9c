//! Domain logic - pure value types independent of any external system

pub mod app;
pub mod cleanup;
pub mod plan;
pub mod tag;
pub mod trigger;
pub mod version;

pub use app::{AppDescriptor, AppMetadata};
pub use cleanup::{
    CleanupError, CleanupPhase, CleanupResult, PackageVersionRef, RetentionDecision,
};
pub use plan::{ReleaseMatrixEntry, ReleasePlan};
pub use tag::{format_chart_tag, format_tag, parse_chart_tag, qualified_name, Tag};
pub use trigger::TriggerKind;
pub use version::{validate_semantic_version, IncrementMode, ReleaseVersion, SemanticVersion};
