//! Offline sheet commands: `diff`, `report` and `split`.
//!
//! These read local CSV files and never touch the store or send mail.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::derive::{self, Derived, ReportSummary};
use crate::error::Result;
use crate::lock::write_atomic;
use crate::output::{emit_success, HumanOutput};
use crate::reconcile::{self, PartitionSummary};
use crate::snapshot::{Snapshot, TaskRow};

use super::context::GlobalOptions;

pub struct DiffOptions {
    pub requested: PathBuf,
    pub completed: PathBuf,
    pub out: Option<PathBuf>,
    pub global: GlobalOptions,
}

pub struct ReportOptions {
    pub file: PathBuf,
    pub out: Option<PathBuf>,
    pub global: GlobalOptions,
}

pub struct SplitOptions {
    pub file: PathBuf,
    pub out: Option<PathBuf>,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct DiffReport<'a> {
    requested: usize,
    completed: usize,
    incomplete: usize,
    rows: &'a [TaskRow],
    #[serde(skip_serializing_if = "Option::is_none")]
    out: Option<&'a Path>,
}

pub fn run_diff(opts: DiffOptions) -> Result<()> {
    let requested = Snapshot::from_path(&opts.requested)?;
    let completed = Snapshot::from_path(&opts.completed)?;
    let open = reconcile::incomplete(&requested, &completed)?;

    if let Some(out) = &opts.out {
        write_atomic(out, &open.to_csv()?)?;
    }

    let mut human = HumanOutput::new(format!(
        "actweek diff: {} of {} requested rows incomplete",
        open.len(),
        requested.len()
    ));
    human.push_summary("requested", requested.len().to_string());
    human.push_summary("completed", completed.len().to_string());
    human.push_summary("incomplete", open.len().to_string());
    if let Some(out) = &opts.out {
        human.push_summary("written", out.display().to_string());
    }
    for row in open.rows() {
        human.push_detail(format!("line {}: {} due {}", row.line, row.owner, row.due_date));
    }

    let report = DiffReport {
        requested: requested.len(),
        completed: completed.len(),
        incomplete: open.len(),
        rows: open.rows(),
        out: opts.out.as_deref(),
    };
    emit_success(opts.global.output(), "diff", &report, Some(&human))
}

#[derive(Serialize)]
struct ReportRow<'a> {
    #[serde(flatten)]
    row: &'a TaskRow,
    #[serde(flatten)]
    derived: Derived,
}

#[derive(Serialize)]
struct SheetReport<'a> {
    summary: &'a ReportSummary,
    rows: Vec<ReportRow<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    out: Option<&'a Path>,
}

pub fn run_report(opts: ReportOptions) -> Result<()> {
    let snapshot = Snapshot::from_path(&opts.file)?;
    let today = opts.global.now()?.date_naive();
    let summary = derive::summarize(&snapshot, today);

    if let Some(out) = &opts.out {
        write_atomic(out, &derive::enriched_csv(&snapshot, today)?)?;
    }

    let rows: Vec<ReportRow<'_>> = snapshot
        .rows()
        .iter()
        .map(|row| ReportRow {
            row,
            derived: derive::derive(row, today),
        })
        .collect();

    let mut human = HumanOutput::new(format!(
        "actweek report: week {} ({})",
        summary.week,
        opts.file.display()
    ));
    human.push_summary("total", summary.total.to_string());
    human.push_summary("open", summary.open.to_string());
    human.push_summary("overdue", summary.overdue.to_string());
    human.push_summary("completed", summary.completed.to_string());
    human.push_summary("completed last week", summary.completed_last_week.to_string());
    if let Some(out) = &opts.out {
        human.push_summary("written", out.display().to_string());
    }
    for entry in &rows {
        let line = match entry.derived.days_since_complete {
            Some(days) => format!(
                "line {}: {} completed {} days ago",
                entry.row.line, entry.row.owner, days
            ),
            None => format!(
                "line {}: {} open {} days, {}",
                entry.row.line,
                entry.row.owner,
                entry.derived.days_open,
                due_label(entry.derived.past_due)
            ),
        };
        human.push_detail(line);
    }

    let report = SheetReport {
        summary: &summary,
        rows,
        out: opts.out.as_deref(),
    };
    emit_success(opts.global.output(), "report", &report, Some(&human))
}

fn due_label(past_due: i64) -> String {
    match past_due {
        d if d > 0 => format!("{d} days overdue"),
        0 => "due today".to_string(),
        d => format!("due in {} days", -d),
    }
}

#[derive(Serialize)]
struct SplitReport {
    open: usize,
    owners: Vec<PartitionSummary>,
    unmatched: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    written: Vec<PathBuf>,
}

pub fn run_split(opts: SplitOptions) -> Result<()> {
    let (config, _) = opts.global.load_config()?;
    let snapshot = Snapshot::from_path(&opts.file)?;
    let open = reconcile::open_rows(&snapshot);
    let split = reconcile::partition(&open, &config.owners.tags);

    let mut written = Vec::new();
    if let Some(dir) = &opts.out {
        for part in split.partitions.iter().filter(|p| !p.rows.is_empty()) {
            let path = dir.join(format!("{}_open.csv", part.owner));
            write_atomic(&path, &part.rows.to_csv()?)?;
            written.push(path);
        }
    }

    let owners: Vec<PartitionSummary> = split
        .partitions
        .iter()
        .map(|part| PartitionSummary {
            owner: part.owner.clone(),
            rows: part.rows.len(),
        })
        .collect();

    let mut human = HumanOutput::new(format!(
        "actweek split: {} open rows across {} owners",
        open.len(),
        owners.iter().filter(|o| o.rows > 0).count()
    ));
    for owner in &owners {
        human.push_summary(owner.owner.clone(), owner.rows.to_string());
    }
    for path in &written {
        human.push_detail(format!("wrote {}", path.display()));
    }
    if !split.unmatched.is_empty() {
        human.push_warning(format!(
            "{} open row(s) with unrecognized owners: {}",
            split.unmatched.len(),
            split.unmatched_owners().join(", ")
        ));
    }

    let report = SplitReport {
        open: open.len(),
        owners,
        unmatched: split.unmatched.len(),
        written,
    };
    emit_success(opts.global.output(), "split", &report, Some(&human))
}
