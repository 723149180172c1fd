//! Pipeline commands: `handle`, `ingest` and `resume`.

use std::io::Read;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::pipeline::Outcome;
use crate::storage::{validate_key, ObjectStore};
use crate::trigger::{InvocationResult, TriggerEvent};
use crate::week::Mode;

use super::context::{GlobalOptions, Services, Workspace};

pub struct HandleOptions {
    pub event: String,
    pub global: GlobalOptions,
}

pub struct IngestOptions {
    pub file: PathBuf,
    pub name: Option<String>,
    pub global: GlobalOptions,
}

pub struct ResumeOptions {
    pub week: u32,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    result: &'a InvocationResult,
    outcome: &'a Outcome,
}

pub fn run_handle(opts: HandleOptions) -> Result<()> {
    let raw = read_payload(&opts.event)?;
    let event = TriggerEvent::parse(&raw)?;
    handle_event(&opts.global, "handle", &event)
}

pub fn run_ingest(opts: IngestOptions) -> Result<()> {
    let ws = Workspace::open(&opts.global)?;
    let services = ws.services()?;

    let name = match opts.name {
        Some(name) => name,
        None => opts
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{} has no file name", opts.file.display()))
            })?,
    };
    let key = format!("{}{}", ws.config.store.inbox_prefix, name);
    validate_key(&key)?;

    let data = std::fs::read(&opts.file)?;
    ws.store.put(&key, &data)?;
    tracing::info!(file = %opts.file.display(), key = %key, "sheet dropped into inbox");

    let event = TriggerEvent::new(ws.store.bucket(), key);
    run_pipeline(&ws, &services, &opts.global, "ingest", &event)
}

pub fn run_resume(opts: ResumeOptions) -> Result<()> {
    let ws = Workspace::open(&opts.global)?;
    let services = ws.services()?;
    let now = opts.global.now()?;
    let mut events = opts.global.open_events()?;

    let outcome = ws.pipeline(&services).resume(opts.week, now, &mut events)?;
    let result = InvocationResult::ok(outcome.mode, outcome.message());
    emit_outcome(opts.global.output(), "resume", &result, &outcome)
}

fn handle_event(global: &GlobalOptions, command: &str, event: &TriggerEvent) -> Result<()> {
    let ws = Workspace::open(global)?;
    let services = ws.services()?;
    run_pipeline(&ws, &services, global, command, event)
}

fn run_pipeline(
    ws: &Workspace,
    services: &Services,
    global: &GlobalOptions,
    command: &str,
    event: &TriggerEvent,
) -> Result<()> {
    let now = global.now()?;
    let mut events = global.open_events()?;

    let outcome = ws.pipeline(services).handle(event, now, &mut events)?;
    let result = InvocationResult::ok(outcome.mode, outcome.message());
    emit_outcome(global.output(), command, &result, &outcome)
}

fn read_payload(source: &str) -> Result<String> {
    if source.trim() == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        Ok(raw)
    } else {
        std::fs::read_to_string(source)
            .map_err(|err| Error::InvalidArgument(format!("cannot read event file {source}: {err}")))
    }
}

pub(super) fn human_outcome(command: &str, outcome: &Outcome) -> HumanOutput {
    let label = match outcome.mode {
        Mode::Initial => "requested sheet reported",
        Mode::Reconcile => "week reconciled",
    };
    let mut human = HumanOutput::new(format!("actweek {command}: week {} {label}", outcome.week));
    human.push_summary("week", outcome.week.to_string());
    human.push_summary("mode", format!("{:?}", outcome.mode).to_lowercase());
    if let Some(source) = &outcome.source_key {
        human.push_summary("source", source.clone());
    }
    human.push_summary("archived", outcome.archived_key.clone());
    human.push_summary("rows", outcome.rows.to_string());
    human.push_summary("published", outcome.published.len().to_string());

    for published in &outcome.published {
        human.push_detail(format!(
            "{} -> {} ({} rows)",
            published.key, published.notified, published.rows
        ));
    }
    for skipped in &outcome.skipped_empty {
        human.push_detail(format!("{}: nothing to report", skipped.owner));
    }
    for warning in &outcome.warnings {
        human.push_warning(warning.clone());
    }
    human.push_next_step(format!("actweek week --week {}", outcome.week));
    human
}

fn emit_outcome(
    output: OutputOptions,
    command: &str,
    result: &InvocationResult,
    outcome: &Outcome,
) -> Result<()> {
    let human = human_outcome(command, outcome);
    emit_success(output, command, &RunReport { result, outcome }, Some(&human))
}
