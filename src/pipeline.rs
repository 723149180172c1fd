//! The weekly pipeline: one inbound snapshot in, per-owner reports out.
//!
//! ```text
//! inbox/<file>.csv ──claim week──▶ INITIAL:   {week}_requested.csv ─▶ {week}_{owner}_report.csv
//!                               └▶ RECONCILE: {week}_completed.csv ─diff─▶ {week}_{owner}_incomplete.csv
//! ```
//!
//! Collaborators (store, notifier, resolved recipients) are passed in; the
//! pipeline holds no global state. Any collaborator failure aborts the
//! invocation without undoing earlier steps.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::events::{emit_to, EventKind, EventSink};
use crate::mailer::{Notification, Notifier};
use crate::reconcile::{self, PartitionSummary};
use crate::secrets::Recipients;
use crate::snapshot::Snapshot;
use crate::storage::ObjectStore;
use crate::trigger::{InvocationResult, TriggerEvent};
use crate::week::{self, Mode, Role, WeekLedger};

/// One published partition
#[derive(Debug, Clone, Serialize)]
pub struct Published {
    pub owner: String,
    pub key: String,
    pub rows: usize,
    pub notified: String,
}

/// Everything one run did
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub week: u32,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    pub archived_key: String,
    /// Rows considered for reporting (whole snapshot, or the incomplete set)
    pub rows: usize,
    pub published: Vec<Published>,
    pub skipped_empty: Vec<PartitionSummary>,
    pub unmatched_rows: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched_owners: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Outcome {
    pub fn message(&self) -> String {
        match self.mode {
            Mode::Initial => "Successfully processed and emailed requested CSV files.".to_string(),
            Mode::Reconcile => {
                "Successfully processed and emailed incomplete actions CSV files.".to_string()
            }
        }
    }
}

pub struct Pipeline<'a> {
    store: &'a dyn ObjectStore,
    notifier: &'a dyn Notifier,
    recipients: &'a Recipients,
    tags: &'a [String],
    inbox_prefix: &'a str,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        notifier: &'a dyn Notifier,
        recipients: &'a Recipients,
        tags: &'a [String],
        inbox_prefix: &'a str,
    ) -> Self {
        Self {
            store,
            notifier,
            recipients,
            tags,
            inbox_prefix,
        }
    }

    /// Run the pipeline and fold the outcome into a status code and message.
    pub fn invoke(
        &self,
        event: &TriggerEvent,
        now: DateTime<Utc>,
        events: &mut Option<EventSink>,
    ) -> (InvocationResult, Option<Outcome>) {
        match self.handle(event, now, events) {
            Ok(outcome) => (InvocationResult::ok(outcome.mode, outcome.message()), Some(outcome)),
            Err(err) => {
                tracing::error!(bucket = %event.bucket, key = %event.key, error = %err, "invocation failed");
                (InvocationResult::from_error(&err), None)
            }
        }
    }

    /// Process one inbound snapshot.
    pub fn handle(
        &self,
        event: &TriggerEvent,
        now: DateTime<Utc>,
        events: &mut Option<EventSink>,
    ) -> Result<Outcome> {
        if event.bucket != self.store.bucket() {
            return Err(Error::InvalidEvent(format!(
                "event for bucket '{}' but store is '{}'",
                event.bucket,
                self.store.bucket()
            )));
        }
        if !event.key.starts_with(self.inbox_prefix) {
            return Err(Error::InvalidEvent(format!(
                "key '{}' is outside the inbox prefix '{}'",
                event.key, self.inbox_prefix
            )));
        }

        // Validate before touching week state, so bad sheets change nothing.
        let inbound = Snapshot::from_csv(&self.store.get(&event.key)?)?;

        let week = week::iso_week(now.date_naive());
        let _span = tracing::info_span!("handle", week, key = %event.key).entered();

        let ledger = WeekLedger::new(self.store);
        let claim = ledger.claim(week, &event.key, now)?;
        let mode = claim.mode;

        let archived_key = week::snapshot_key(week, mode.role());
        self.store.copy(&event.key, &archived_key)?;
        self.store.delete(&event.key)?;
        tracing::info!(source = %event.key, archived = %archived_key, rows = inbound.len(), "snapshot archived");

        let mut warnings = Vec::new();
        warnings.extend(emit_to(
            events,
            EventKind::SnapshotArchived,
            week,
            serde_json::json!({
                "source": event.key,
                "key": archived_key,
                "role": mode.role(),
                "rows": inbound.len(),
            }),
        ));

        let relevant = match mode {
            Mode::Initial => inbound,
            Mode::Reconcile => {
                let requested = self.load(week, Role::Requested)?;
                reconcile::incomplete(&requested, &inbound)?
            }
        };

        let mut outcome = self.publish(week, mode, &relevant, events)?;
        outcome.source_key = Some(event.key.clone());
        outcome.archived_key = archived_key;
        warnings.append(&mut outcome.warnings);
        outcome.warnings = warnings;

        if mode == Mode::Reconcile {
            ledger.finish(&claim, now)?;
            outcome.warnings.extend(emit_to(
                events,
                EventKind::WeekReconciled,
                week,
                serde_json::json!({ "incomplete": outcome.rows }),
            ));
        }

        Ok(outcome)
    }

    /// Re-run reconciliation of a week whose completed snapshot was archived
    /// but whose reports were never finished.
    pub fn resume(
        &self,
        week: u32,
        now: DateTime<Utc>,
        events: &mut Option<EventSink>,
    ) -> Result<Outcome> {
        let ledger = WeekLedger::new(self.store);
        let claim = ledger.reclaim(week)?;

        let requested = self.load(week, Role::Requested)?;
        let completed = self.load(week, Role::Completed)?;
        let relevant = reconcile::incomplete(&requested, &completed)?;

        let mut outcome = self.publish(week, Mode::Reconcile, &relevant, events)?;
        outcome.archived_key = week::snapshot_key(week, Role::Completed);

        ledger.finish(&claim, now)?;
        outcome.warnings.extend(emit_to(
            events,
            EventKind::WeekReconciled,
            week,
            serde_json::json!({ "incomplete": outcome.rows, "resumed": true }),
        ));
        Ok(outcome)
    }

    fn load(&self, week: u32, role: Role) -> Result<Snapshot> {
        let key = week::snapshot_key(week, role);
        Snapshot::from_csv(&self.store.get(&key)?)
    }

    /// Partition `rows`, write each non-empty partition and notify its owner.
    fn publish(
        &self,
        week: u32,
        mode: Mode,
        rows: &Snapshot,
        events: &mut Option<EventSink>,
    ) -> Result<Outcome> {
        let split = reconcile::partition(rows, self.tags);
        let mut warnings = Vec::new();

        let unmatched_owners = split.unmatched_owners();
        if !split.unmatched.is_empty() {
            tracing::warn!(
                rows = split.unmatched.len(),
                owners = ?unmatched_owners,
                "rows with unrecognized owners were not reported"
            );
            warnings.push(format!(
                "{} row(s) with unrecognized owners not reported: {}",
                split.unmatched.len(),
                unmatched_owners.join(", ")
            ));
            warnings.extend(emit_to(
                events,
                EventKind::OwnersUnmatched,
                week,
                serde_json::json!({
                    "rows": split.unmatched.len(),
                    "owners": unmatched_owners,
                }),
            ));
        }

        let mut published = Vec::new();
        let mut skipped_empty = Vec::new();
        for part in &split.partitions {
            if part.rows.is_empty() {
                skipped_empty.push(PartitionSummary {
                    owner: part.owner.clone(),
                    rows: 0,
                });
                continue;
            }

            let contact = self.recipients.contact(&part.owner).ok_or_else(|| {
                Error::InvalidConfig(format!("no contact resolved for owner '{}'", part.owner))
            })?;

            let key = week::partition_key(week, &part.owner, mode);
            self.store.put(&key, &part.rows.to_csv()?)?;
            warnings.extend(emit_to(
                events,
                EventKind::ReportPublished,
                week,
                PartitionSummary {
                    owner: part.owner.clone(),
                    rows: part.rows.len(),
                },
            ));

            let notification =
                Notification::summary(&self.recipients.sender, contact, &key, part.rows.len());
            self.notifier.send(&notification)?;
            warnings.extend(emit_to(
                events,
                EventKind::NotificationSent,
                week,
                serde_json::json!({
                    "owner": part.owner,
                    "to": contact,
                    "subject": notification.subject,
                    "row_count": part.rows.len(),
                }),
            ));

            tracing::info!(owner = %part.owner, key = %key, rows = part.rows.len(), "partition published");
            published.push(Published {
                owner: part.owner.clone(),
                key,
                rows: part.rows.len(),
                notified: contact.to_string(),
            });
        }

        Ok(Outcome {
            week,
            mode,
            source_key: None,
            archived_key: String::new(),
            rows: rows.len(),
            published,
            skipped_empty,
            unmatched_rows: split.unmatched.len(),
            unmatched_owners,
            warnings,
        })
    }
}
