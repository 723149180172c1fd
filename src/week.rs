//! Reporting weeks: ISO week keys, snapshot roles and the per-week record.
//!
//! Which mode an inbound snapshot runs in is decided by [`resolve_mode`]. The
//! decision is then claimed through the week record (`{week}_state.json`),
//! which is only ever changed with a conditional write, so two deliveries of
//! the same event cannot both run the same mode.
//!
//! Object keys carry only the week number, so a week number comes round
//! again every year. The record stores its ISO year; a record left over from
//! an earlier year is replaced and the week starts again in INITIAL mode.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::ObjectStore;

/// ISO-8601 week number of a date.
pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// ISO-8601 week-numbering year of a date. Differs from the calendar year
/// around New Year.
pub fn iso_year(date: NaiveDate) -> i32 {
    date.iso_week().year()
}

/// ISO week of the previous calendar week, wrapping across years.
pub fn previous_iso_week(date: NaiveDate) -> u32 {
    iso_week(date - Duration::days(7))
}

/// Snapshot role within a week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Requested,
    Completed,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requested => "requested",
            Role::Completed => "completed",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline mode for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// First snapshot of the week: archive as `requested`, report everything
    Initial,
    /// Later snapshot: archive as `completed`, report what is still open
    Reconcile,
}

impl Mode {
    /// Role the inbound snapshot is archived under
    pub fn role(&self) -> Role {
        match self {
            Mode::Initial => Role::Requested,
            Mode::Reconcile => Role::Completed,
        }
    }

    /// Suffix of published partition objects
    pub fn report_suffix(&self) -> &'static str {
        match self {
            Mode::Initial => "report",
            Mode::Reconcile => "incomplete",
        }
    }
}

/// The whole decision table: a stored `requested` snapshot means reconcile.
pub fn resolve_mode(requested_exists: bool) -> Mode {
    if requested_exists {
        Mode::Reconcile
    } else {
        Mode::Initial
    }
}

/// `{week}_{role}.csv`
pub fn snapshot_key(week: u32, role: Role) -> String {
    format!("{week}_{role}.csv")
}

/// `{week}_{owner}_report.csv` or `{week}_{owner}_incomplete.csv`
pub fn partition_key(week: u32, owner: &str, mode: Mode) -> String {
    format!("{week}_{owner}_{}.csv", mode.report_suffix())
}

/// `{week}_state.json`
pub fn state_key(week: u32) -> String {
    format!("{week}_state.json")
}

/// Lifecycle of a reporting week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekPhase {
    InitialReceived,
    CompletedReceived,
    Reconciled,
}

impl fmt::Display for WeekPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WeekPhase::InitialReceived => "initial_received",
            WeekPhase::CompletedReceived => "completed_received",
            WeekPhase::Reconciled => "reconciled",
        };
        f.write_str(label)
    }
}

/// Persisted per-week state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekRecord {
    pub week: u32,
    /// ISO year the record belongs to
    pub year: i32,
    pub phase: WeekPhase,
    /// Incremented on every transition
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeekRecord {
    fn new(week: u32, phase: WeekPhase, now: DateTime<Utc>) -> Self {
        Self {
            week,
            year: iso_year(now.date_naive()),
            phase,
            revision: 1,
            requested_source: None,
            completed_source: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// First record of a week, claimed in `mode`.
    fn started(week: u32, mode: Mode, source_key: &str, now: DateTime<Utc>) -> Self {
        let mut record = match mode {
            Mode::Initial => Self::new(week, WeekPhase::InitialReceived, now),
            Mode::Reconcile => Self::new(week, WeekPhase::CompletedReceived, now),
        };
        match mode {
            Mode::Initial => record.requested_source = Some(source_key.to_string()),
            Mode::Reconcile => record.completed_source = Some(source_key.to_string()),
        }
        record
    }

    fn advance(&self, phase: WeekPhase, now: DateTime<Utc>) -> Self {
        Self {
            phase,
            revision: self.revision + 1,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// A mode claimed for one invocation, with the stored record bytes needed
/// for the next conditional transition.
#[derive(Debug, Clone)]
pub struct Claim {
    pub mode: Mode,
    pub record: WeekRecord,
    stored: Vec<u8>,
}

/// Read access and conditional transitions for week records.
pub struct WeekLedger<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> WeekLedger<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Current record for `week`, if any
    pub fn read(&self, week: u32) -> Result<Option<WeekRecord>> {
        match self.store.get_opt(&state_key(week))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decide and claim the mode for an inbound snapshot.
    ///
    /// Fails with [`Error::WeekClosed`] once the week has its completed
    /// snapshot, and with [`Error::Conflict`] if another invocation changed
    /// the record first. A record from another ISO year does not count.
    pub fn claim(&self, week: u32, source_key: &str, now: DateTime<Utc>) -> Result<Claim> {
        let key = state_key(week);
        let year = iso_year(now.date_naive());
        let current = self.store.get_opt(&key)?;
        let existing: Option<WeekRecord> = match &current {
            Some(bytes) => Some(serde_json::from_slice(bytes)?),
            None => None,
        };

        let (mode, record) = match existing {
            None => {
                // No record yet: fall back to the stored snapshot itself.
                let requested_exists = self.store.exists(&snapshot_key(week, Role::Requested))?;
                let mode = resolve_mode(requested_exists);
                (mode, WeekRecord::started(week, mode, source_key, now))
            }
            Some(stale) if stale.year != year => {
                tracing::info!(week, year, stale_year = stale.year, "replacing week record from an earlier year");
                (Mode::Initial, WeekRecord::started(week, Mode::Initial, source_key, now))
            }
            Some(existing) => match existing.phase {
                WeekPhase::InitialReceived => {
                    let requested = snapshot_key(week, Role::Requested);
                    if !self.store.exists(&requested)? {
                        return Err(Error::MissingSnapshot { week, key: requested });
                    }
                    let mut record = existing.advance(WeekPhase::CompletedReceived, now);
                    record.completed_source = Some(source_key.to_string());
                    (Mode::Reconcile, record)
                }
                phase => {
                    return Err(Error::WeekClosed {
                        week,
                        phase: phase.to_string(),
                    })
                }
            },
        };

        let stored = serde_json::to_vec_pretty(&record)?;
        if !self.store.put_if(&key, current.as_deref(), &stored)? {
            return Err(Error::Conflict(key));
        }

        tracing::info!(week, mode = ?mode, phase = %record.phase, revision = record.revision, "week claimed");
        Ok(Claim {
            mode,
            record,
            stored,
        })
    }

    /// Take over a reconcile whose invocation stopped before finishing.
    pub fn reclaim(&self, week: u32) -> Result<Claim> {
        let stored = self
            .store
            .get_opt(&state_key(week))?
            .ok_or_else(|| Error::InvalidArgument(format!("week {week} has no record")))?;
        let record: WeekRecord = serde_json::from_slice(&stored)?;
        if record.phase != WeekPhase::CompletedReceived {
            return Err(Error::InvalidArgument(format!(
                "week {week} is {}; only completed_received weeks can be resumed",
                record.phase
            )));
        }
        Ok(Claim {
            mode: Mode::Reconcile,
            record,
            stored,
        })
    }

    /// Mark a claimed reconcile as finished.
    pub fn finish(&self, claim: &Claim, now: DateTime<Utc>) -> Result<WeekRecord> {
        let key = state_key(claim.record.week);
        let record = claim.record.advance(WeekPhase::Reconciled, now);
        let bytes = serde_json::to_vec_pretty(&record)?;
        if !self.store.put_if(&key, Some(&claim.stored), &bytes)? {
            return Err(Error::Conflict(key));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsObjectStore;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn decision_table() {
        assert_eq!(resolve_mode(false), Mode::Initial);
        assert_eq!(resolve_mode(true), Mode::Reconcile);
        assert_eq!(Mode::Initial.role(), Role::Requested);
        assert_eq!(Mode::Reconcile.role(), Role::Completed);
    }

    #[test]
    fn keys() {
        assert_eq!(snapshot_key(7, Role::Requested), "7_requested.csv");
        assert_eq!(snapshot_key(7, Role::Completed), "7_completed.csv");
        assert_eq!(partition_key(7, "ele", Mode::Initial), "7_ele_report.csv");
        assert_eq!(partition_key(7, "merc", Mode::Reconcile), "7_merc_incomplete.csv");
        assert_eq!(state_key(7), "7_state.json");
    }

    #[test]
    fn iso_weeks_wrap_years() {
        // 2021-01-03 is a Sunday in ISO week 53 of 2020.
        assert_eq!(iso_week(NaiveDate::from_ymd_opt(2021, 1, 3).unwrap()), 53);
        assert_eq!(iso_week(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), 1);
        assert_eq!(previous_iso_week(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()), 52);
        assert_eq!(iso_year(NaiveDate::from_ymd_opt(2021, 1, 3).unwrap()), 2020);
        assert_eq!(iso_year(NaiveDate::from_ymd_opt(2024, 12, 30).unwrap()), 2025);
    }

    #[test]
    fn record_from_an_earlier_year_starts_the_week_over() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::open(temp.path(), "actions").unwrap();
        let ledger = WeekLedger::new(&store);

        ledger.claim(10, "inbox/a.csv", at(2024, 3, 4)).unwrap();
        store.put(&snapshot_key(10, Role::Requested), b"").unwrap();
        let second = ledger.claim(10, "inbox/b.csv", at(2024, 3, 6)).unwrap();
        ledger.finish(&second, at(2024, 3, 6)).unwrap();

        // 2025-03-03 is the Monday of ISO week 10, 2025.
        let next_year = ledger.claim(10, "inbox/c.csv", at(2025, 3, 3)).unwrap();
        assert_eq!(next_year.mode, Mode::Initial);
        assert_eq!(next_year.record.year, 2025);
        assert_eq!(next_year.record.phase, WeekPhase::InitialReceived);
        assert_eq!(next_year.record.revision, 1);
        assert_eq!(next_year.record.requested_source.as_deref(), Some("inbox/c.csv"));
        assert_eq!(next_year.record.completed_source, None);
        assert_eq!(ledger.read(10).unwrap(), Some(next_year.record));
    }

    #[test]
    fn claimed_week_without_requested_snapshot_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::open(temp.path(), "actions").unwrap();
        let ledger = WeekLedger::new(&store);

        // Claimed, but the archive copy never happened.
        let first = ledger.claim(14, "inbox/a.csv", at(2024, 4, 1)).unwrap();

        let err = ledger.claim(14, "inbox/b.csv", at(2024, 4, 3)).unwrap_err();
        assert!(matches!(&err, Error::MissingSnapshot { week: 14, key } if key == "14_requested.csv"));
        assert_eq!(ledger.read(14).unwrap(), Some(first.record));
    }

    #[test]
    fn claim_walks_the_week() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::open(temp.path(), "actions").unwrap();
        let ledger = WeekLedger::new(&store);

        let first = ledger.claim(10, "inbox/a.csv", at(2024, 3, 4)).unwrap();
        assert_eq!(first.mode, Mode::Initial);
        assert_eq!(first.record.phase, WeekPhase::InitialReceived);
        assert_eq!(first.record.year, 2024);
        assert_eq!(first.record.requested_source.as_deref(), Some("inbox/a.csv"));
        store.put(&snapshot_key(10, Role::Requested), b"").unwrap();

        let second = ledger.claim(10, "inbox/b.csv", at(2024, 3, 6)).unwrap();
        assert_eq!(second.mode, Mode::Reconcile);
        assert_eq!(second.record.revision, 2);
        assert_eq!(second.record.requested_source.as_deref(), Some("inbox/a.csv"));
        assert_eq!(second.record.completed_source.as_deref(), Some("inbox/b.csv"));

        let done = ledger.finish(&second, at(2024, 3, 6)).unwrap();
        assert_eq!(done.phase, WeekPhase::Reconciled);
        assert_eq!(ledger.read(10).unwrap(), Some(done));

        let err = ledger.claim(10, "inbox/c.csv", at(2024, 3, 7)).unwrap_err();
        assert!(matches!(err, Error::WeekClosed { week: 10, .. }));
    }

    #[test]
    fn existing_requested_snapshot_without_record_reconciles() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::open(temp.path(), "actions").unwrap();
        store.put(&snapshot_key(11, Role::Requested), b"").unwrap();

        let claim = WeekLedger::new(&store)
            .claim(11, "inbox/b.csv", at(2024, 3, 12))
            .unwrap();
        assert_eq!(claim.mode, Mode::Reconcile);
        assert_eq!(claim.record.phase, WeekPhase::CompletedReceived);
    }

    #[test]
    fn stale_finish_is_a_conflict() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::open(temp.path(), "actions").unwrap();
        let ledger = WeekLedger::new(&store);

        ledger.claim(12, "inbox/a.csv", at(2024, 3, 18)).unwrap();
        store.put(&snapshot_key(12, Role::Requested), b"").unwrap();
        let claim = ledger.claim(12, "inbox/b.csv", at(2024, 3, 19)).unwrap();
        store.put(&state_key(12), b"{}").unwrap();

        assert!(matches!(ledger.finish(&claim, at(2024, 3, 19)), Err(Error::Conflict(_))));
    }

    #[test]
    fn reclaim_only_unfinished_reconciles() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::open(temp.path(), "actions").unwrap();
        let ledger = WeekLedger::new(&store);

        assert!(matches!(ledger.reclaim(13), Err(Error::InvalidArgument(_))));
        ledger.claim(13, "inbox/a.csv", at(2024, 3, 25)).unwrap();
        assert!(matches!(ledger.reclaim(13), Err(Error::InvalidArgument(_))));
        store.put(&snapshot_key(13, Role::Requested), b"").unwrap();

        ledger.claim(13, "inbox/b.csv", at(2024, 3, 26)).unwrap();
        let claim = ledger.reclaim(13).unwrap();
        assert_eq!(claim.mode, Mode::Reconcile);
        let done = ledger.finish(&claim, at(2024, 3, 27)).unwrap();
        assert_eq!(done.revision, 3);
    }
}
