//! Weekly reconciliation: which requested actions are still open, and whose.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::snapshot::{RowKey, Snapshot, TaskRow};

/// Rows of `requested` with no equal row in `completed`, in `requested` order.
///
/// Rows compare by their normalized [`RowKey`], so column order and date
/// formatting do not matter. Duplicate requested rows are all kept.
pub fn incomplete(requested: &Snapshot, completed: &Snapshot) -> Result<Snapshot> {
    if !requested.is_empty() && !completed.is_empty() {
        let left = requested.column_set();
        let right = completed.column_set();
        if left != right {
            let only_requested: Vec<_> = left.difference(&right).cloned().collect();
            let only_completed: Vec<_> = right.difference(&left).cloned().collect();
            return Err(Error::SchemaMismatch(format!(
                "only in requested: [{}], only in completed: [{}]",
                only_requested.join(", "),
                only_completed.join(", ")
            )));
        }
    }

    let done: HashSet<&RowKey> = completed.rows().iter().map(TaskRow::key).collect();
    let open = requested
        .rows()
        .iter()
        .filter(|row| !done.contains(row.key()))
        .cloned()
        .collect();

    Ok(requested.with_rows(open))
}

/// Rows for one recognized owner tag
#[derive(Debug, Clone)]
pub struct Partition {
    pub owner: String,
    pub rows: Snapshot,
}

/// Result of grouping rows by owner tag
#[derive(Debug, Clone)]
pub struct Partitioned {
    /// One entry per tag, in tag order, possibly empty
    pub partitions: Vec<Partition>,
    /// Rows whose owner matched no tag
    pub unmatched: Snapshot,
}

impl Partitioned {
    pub fn get(&self, owner: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.owner == owner)
    }

    /// Distinct owner values that matched no tag, in first-seen order
    pub fn unmatched_owners(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.unmatched
            .rows()
            .iter()
            .filter(|row| seen.insert(row.owner.as_str()))
            .map(|row| row.owner.clone())
            .collect()
    }
}

/// Summary of one partition, used in reports and events
#[derive(Debug, Clone, Serialize)]
pub struct PartitionSummary {
    pub owner: String,
    pub rows: usize,
}

/// First tag (in order) contained in `owner`, case-insensitively.
pub fn match_owner<'t>(owner: &str, tags: &'t [String]) -> Option<&'t str> {
    tag_index(owner, tags).map(|idx| tags[idx].as_str())
}

fn tag_index(owner: &str, tags: &[String]) -> Option<usize> {
    let owner = owner.to_lowercase();
    tags.iter().position(|tag| owner.contains(&tag.to_lowercase()))
}

/// Split rows by owner tag. Every row lands in at most one partition; rows
/// matching no tag are collected in `unmatched`.
pub fn partition(rows: &Snapshot, tags: &[String]) -> Partitioned {
    let mut buckets: Vec<Vec<TaskRow>> = vec![Vec::new(); tags.len()];
    let mut unmatched = Vec::new();

    for row in rows.rows() {
        match tag_index(&row.owner, tags) {
            Some(idx) => buckets[idx].push(row.clone()),
            None => unmatched.push(row.clone()),
        }
    }

    let partitions = tags
        .iter()
        .zip(buckets)
        .map(|(owner, group)| Partition {
            owner: owner.clone(),
            rows: rows.with_rows(group),
        })
        .collect();

    Partitioned {
        partitions,
        unmatched: rows.with_rows(unmatched),
    }
}

/// Rows not yet marked complete
pub fn open_rows(rows: &Snapshot) -> Snapshot {
    rows.with_rows(rows.rows().iter().filter(|r| !r.complete).cloned().collect())
}
