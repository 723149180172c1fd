//! `actweek watch`: handle sheets as they land in the inbox directory.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use ::notify::event::ModifyKind;
use ::notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;

use crate::error::Result;
use crate::events::EventSink;
use crate::output::{emit_success, HumanOutput};
use crate::pipeline::{Outcome, Pipeline};
use crate::storage::ObjectStore;
use crate::trigger::{InvocationResult, TriggerEvent};

use super::context::{GlobalOptions, Workspace};
use super::handle::human_outcome;

const WATCH_DEBOUNCE_MS: u64 = 500;

pub struct WatchOptions {
    pub drain: bool,
    pub once: bool,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct WatchItem<'a> {
    key: &'a str,
    #[serde(flatten)]
    result: &'a InvocationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a Outcome>,
}

pub fn run(opts: WatchOptions) -> Result<()> {
    let ws = Workspace::open(&opts.global)?;
    let services = ws.services()?;
    let pipeline = ws.pipeline(&services);
    let mut events = opts.global.open_events()?;

    let inbox = ws.inbox_dir();
    std::fs::create_dir_all(&inbox)?;

    if opts.drain || opts.once {
        for key in ws.store.list(&ws.config.store.inbox_prefix)? {
            if is_sheet(&key) {
                process(&ws, &pipeline, &opts.global, &key, &mut events)?;
            }
        }
    }
    if opts.once {
        return Ok(());
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher: RecommendedWatcher = ::notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;
    watcher.watch(&inbox, RecursiveMode::NonRecursive)?;
    tracing::info!(inbox = %inbox.display(), "watching inbox");

    let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
    let mut pending = BTreeSet::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let timeout = deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));
        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) | EventKind::Modify(ModifyKind::Data(_))
                ) {
                    continue;
                }
                for path in &event.paths {
                    if let Some(name) = sheet_name(path) {
                        pending.insert(format!("{}{}", ws.config.store.inbox_prefix, name));
                    }
                }
                if !pending.is_empty() {
                    deadline = Some(Instant::now() + debounce);
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "watch error");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                deadline = None;
                for key in std::mem::take(&mut pending) {
                    if ws.store.exists(&key)? {
                        process(&ws, &pipeline, &opts.global, &key, &mut events)?;
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

/// Handle one inbox object. Pipeline failures are reported, not returned,
/// so the watch keeps going.
fn process(
    ws: &Workspace,
    pipeline: &Pipeline<'_>,
    global: &GlobalOptions,
    key: &str,
    events: &mut Option<EventSink>,
) -> Result<()> {
    let now = global.now()?;
    let event = TriggerEvent::new(ws.store.bucket(), key);
    let (result, outcome) = pipeline.invoke(&event, now, events);

    let human = match &outcome {
        Some(outcome) => human_outcome("watch", outcome),
        None => {
            let mut human = HumanOutput::new(format!(
                "actweek watch: {key} failed ({})",
                result.status_code
            ));
            human.push_warning(result.message.clone());
            human
        }
    };

    let item = WatchItem {
        key,
        result: &result,
        outcome: outcome.as_ref(),
    };
    emit_success(global.output(), "watch", &item, Some(&human))
}

fn is_sheet(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(".csv") && !key.contains(".tmp.")
}

fn sheet_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().to_string();
    if name.starts_with('.') || !is_sheet(&name) {
        return None;
    }
    Some(name)
}
