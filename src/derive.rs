//! Derived columns for the standalone weekly report.
//!
//! None of this feeds reconciliation; it only enriches what people read.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, TaskRow};
use crate::week::{iso_week, previous_iso_week};

pub const DAYS_OPEN: &str = "days_open";
pub const PAST_DUE: &str = "past_due";
pub const WEEK_CREATED: &str = "week_created";
pub const WEEK_COMPLETED: &str = "week_completed";
pub const DAYS_SINCE_COMPLETE: &str = "days_since_complete";

/// Derived values for one row relative to `today`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Derived {
    /// `today - create date`; negative when the sheet is ahead of the clock
    pub days_open: i64,
    /// `today - due date`; positive means overdue
    pub past_due: i64,
    pub week_created: u32,
    pub week_completed: Option<u32>,
    pub days_since_complete: Option<i64>,
}

pub fn derive(row: &TaskRow, today: NaiveDate) -> Derived {
    Derived {
        days_open: (today - row.create_date).num_days(),
        past_due: (today - row.due_date).num_days(),
        week_created: iso_week(row.create_date),
        week_completed: row.complete_date.map(iso_week),
        days_since_complete: row.complete_date.map(|d| (today - d).num_days()),
    }
}

/// Counts for the weekly summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub today: NaiveDate,
    pub week: u32,
    pub total: usize,
    pub open: usize,
    pub completed: usize,
    pub completed_last_week: usize,
    pub overdue: usize,
}

pub fn summarize(snapshot: &Snapshot, today: NaiveDate) -> ReportSummary {
    let last_week = previous_iso_week(today);
    let mut summary = ReportSummary {
        today,
        week: iso_week(today),
        total: snapshot.len(),
        open: 0,
        completed: 0,
        completed_last_week: 0,
        overdue: 0,
    };

    for row in snapshot.rows() {
        let derived = derive(row, today);
        if row.complete {
            summary.completed += 1;
            if derived.week_completed == Some(last_week) {
                summary.completed_last_week += 1;
            }
        } else {
            summary.open += 1;
            if derived.past_due > 0 {
                summary.overdue += 1;
            }
        }
    }

    summary
}

/// The snapshot as CSV with the derived columns appended.
pub fn enriched_csv(snapshot: &Snapshot, today: NaiveDate) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = snapshot.headers().iter().map(String::as_str).collect();
    header.extend([DAYS_OPEN, PAST_DUE, WEEK_CREATED, WEEK_COMPLETED, DAYS_SINCE_COMPLETE]);
    writer.write_record(&header)?;

    for row in snapshot.rows() {
        let derived = derive(row, today);
        let mut record: Vec<String> = row.raw().to_vec();
        record.push(derived.days_open.to_string());
        record.push(derived.past_due.to_string());
        record.push(derived.week_created.to_string());
        record.push(opt(derived.week_completed));
        record.push(opt(derived.days_since_complete));
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|err| Error::OperationFailed(format!("csv flush failed: {err}")))
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
