//! Tag retention policy
//!
//! Pure keep/delete classification of one domain's tag history. Knows
//! nothing about hosted releases or registry packages; those are resolved
//! by the cleanup planner for the tags this module marks for deletion.
//!
//! Per app:
//! 1. Within each (major, minor) line only the highest patch is a
//!    representative. Older patches are deleted once past the age floor.
//! 2. Representatives are walked newest first. The first
//!    `keep_minor_versions` are kept, and never fewer than one.
//! 3. When more than one major line exists, the newest representative of
//!    each major line is kept wherever it falls.
//! 4. Anything not older than `min_age` is kept.

use crate::config::RetentionConfig;
use crate::domain::Tag;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A tag together with its creation date
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub tag: Tag,
    /// `None` when the date could not be read; such tags are never deleted
    pub created: Option<DateTime<Utc>>,
}

impl TagRecord {
    pub fn new(tag: Tag, created: DateTime<Utc>) -> Self {
        TagRecord {
            tag,
            created: Some(created),
        }
    }

    pub fn name(&self) -> String {
        self.tag.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionOutcome {
    pub keep: Vec<String>,
    pub delete: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_minor_versions: usize,
    pub min_age: Duration,
}

impl RetentionPolicy {
    pub fn new(keep_minor_versions: usize, min_age_days: i64) -> Self {
        RetentionPolicy {
            keep_minor_versions,
            min_age: Duration::days(min_age_days.max(0)),
        }
    }

    pub fn from_config(config: &RetentionConfig) -> Self {
        RetentionPolicy::new(config.keep_minor_versions, config.min_age_days)
    }

    /// Classify every record. Output lists are ordered by app, newest first.
    pub fn evaluate(&self, records: &[TagRecord], now: DateTime<Utc>) -> RetentionOutcome {
        let mut by_app: BTreeMap<String, Vec<&TagRecord>> = BTreeMap::new();
        for record in records {
            by_app.entry(record.tag.qualified_app()).or_default().push(record);
        }

        let mut outcome = RetentionOutcome::default();
        for records in by_app.values() {
            let app = self.evaluate_app(records, now);
            outcome.keep.extend(app.keep);
            outcome.delete.extend(app.delete);
        }
        outcome
    }

    fn old_enough(&self, record: &TagRecord, now: DateTime<Utc>) -> bool {
        match record.created {
            Some(created) => now.signed_duration_since(created) > self.min_age,
            None => false,
        }
    }

    fn evaluate_app(&self, records: &[&TagRecord], now: DateTime<Utc>) -> RetentionOutcome {
        let mut lines: BTreeMap<(u32, u32), Vec<&TagRecord>> = BTreeMap::new();
        for record in records.iter().copied() {
            lines.entry(record.tag.version.minor_line()).or_default().push(record);
        }

        let mut keep: Vec<&TagRecord> = Vec::new();
        let mut delete: Vec<&TagRecord> = Vec::new();
        let mut representatives: Vec<&TagRecord> = Vec::new();

        for mut line in lines.into_values() {
            line.sort_by(|a, b| b.tag.version.cmp(&a.tag.version));
            let (head, older) = line.split_at(1);
            representatives.push(head[0]);
            for record in older.iter().copied() {
                if self.old_enough(record, now) {
                    delete.push(record);
                } else {
                    keep.push(record);
                }
            }
        }

        representatives.sort_by(|a, b| b.tag.version.cmp(&a.tag.version));

        let majors: BTreeSet<u32> = representatives.iter().map(|r| r.tag.version.major).collect();
        let mut seen_majors = HashSet::new();
        let protected: HashSet<String> = if majors.len() > 1 {
            representatives
                .iter()
                .filter(|r| seen_majors.insert(r.tag.version.major))
                .map(|r| r.name())
                .collect()
        } else {
            HashSet::new()
        };

        for (position, record) in representatives.iter().copied().enumerate() {
            // the newest line always survives
            let in_window = position < self.keep_minor_versions.max(1);
            if in_window || protected.contains(&record.name()) || !self.old_enough(record, now) {
                keep.push(record);
            } else {
                delete.push(record);
            }
        }

        let newest_first = |a: &&TagRecord, b: &&TagRecord| b.tag.version.cmp(&a.tag.version);
        keep.sort_by(newest_first);
        delete.sort_by(newest_first);

        RetentionOutcome {
            keep: keep.iter().map(|r| r.name()).collect(),
            delete: delete.iter().map(|r| r.name()).collect(),
        }
    }
}
