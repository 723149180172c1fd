//! `actweek week`: show where a reporting week stands.

use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::storage::ObjectStore;
use crate::week::{self as weeks, WeekLedger, WeekPhase, WeekRecord};

use super::context::{GlobalOptions, Workspace};

pub struct WeekOptions {
    pub week: Option<u32>,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct WeekReport {
    week: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<WeekRecord>,
    objects: Vec<String>,
    pending: Vec<String>,
}

pub fn run(opts: WeekOptions) -> Result<()> {
    let ws = Workspace::open(&opts.global)?;
    let week = match opts.week {
        Some(week) => week,
        None => weeks::iso_week(opts.global.now()?.date_naive()),
    };

    let record = WeekLedger::new(&ws.store).read(week)?;
    let objects = ws.store.list(&format!("{week}_"))?;
    let pending = ws.store.list(&ws.config.store.inbox_prefix)?;

    let phase = record
        .as_ref()
        .map(|r| r.phase.to_string())
        .unwrap_or_else(|| "not started".to_string());
    let mut human = HumanOutput::new(format!("actweek week: week {week} {phase}"));
    human.push_summary("week", week.to_string());
    human.push_summary("phase", phase);
    if let Some(record) = &record {
        human.push_summary("year", record.year.to_string());
        human.push_summary("revision", record.revision.to_string());
        if let Some(source) = &record.requested_source {
            human.push_summary("requested from", source.clone());
        }
        if let Some(source) = &record.completed_source {
            human.push_summary("completed from", source.clone());
        }
        human.push_summary("updated", record.updated_at.to_rfc3339());
    }
    for key in &objects {
        human.push_detail(key.clone());
    }
    if !pending.is_empty() {
        human.push_warning(format!("{} sheet(s) waiting in the inbox", pending.len()));
    }
    match record.as_ref().map(|r| r.phase) {
        Some(WeekPhase::CompletedReceived) => {
            human.push_next_step(format!("actweek resume --week {week}"));
        }
        None | Some(WeekPhase::InitialReceived) => {
            human.push_next_step("actweek ingest <sheet.csv>");
        }
        Some(WeekPhase::Reconciled) => {}
    }

    let report = WeekReport {
        week,
        record,
        objects,
        pending,
    };
    emit_success(opts.global.output(), "week", &report, Some(&human))
}
