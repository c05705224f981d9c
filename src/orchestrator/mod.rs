//! Mutating workflows: publishing releases and removing old artifacts

pub mod cleanup;
pub mod release;

pub use cleanup::{CleanupOrchestrator, CleanupPlan, CleanupPlanner};
pub use release::{ReleaseExecutor, ReleaseOptions, ReleaseReport, TagAction};
