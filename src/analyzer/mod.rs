//! Decision engines: which apps changed, which tags can go

pub mod change_detector;
pub mod retention;

pub use change_detector::{ChangeDetector, ChangeSet};
pub use retention::{RetentionOutcome, RetentionPolicy, TagRecord};
