use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{format_date, BusinessCalendar, Clock};
use crate::error::{RolloverError, StoreError};
use crate::keys::{archive_key, decode, Assignments, AttendanceFlag, StorageKeys};
use crate::storage::{KeyValueStore, WriteBatch};
use crate::worker::roll_over_record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverSummary {
    pub previous: NaiveDate,
    pub today: NaiveDate,
    pub route_assignments_archived: bool,
    pub map_assignments_archived: bool,
    pub attendance_archived: bool,
    pub workers_transformed: usize,
    pub workers_kept: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RolloverOutcome {
    /// No marker was recorded yet; only the marker is written.
    FirstRun { today: NaiveDate },
    SameDay { today: NaiveDate },
    RolledOver(RolloverSummary),
}

impl RolloverOutcome {
    pub fn today(&self) -> NaiveDate {
        match self {
            RolloverOutcome::FirstRun { today } | RolloverOutcome::SameDay { today } => *today,
            RolloverOutcome::RolledOver(summary) => summary.today,
        }
    }
}

/// Every write a rollover needs, computed before anything is written.
#[derive(Debug, Clone)]
pub struct RolloverPlan {
    pub outcome: RolloverOutcome,
    pub batch: WriteBatch,
}

#[derive(Debug, Clone, Default)]
pub struct DailyRollover {
    keys: StorageKeys,
    calendar: BusinessCalendar,
}

impl DailyRollover {
    pub fn new(keys: StorageKeys, calendar: BusinessCalendar) -> Self {
        Self { keys, calendar }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    /// Runs the once-per-day transition. The whole rollover, date marker
    /// included, lands as one batch guarded on the marker it was planned from.
    pub fn run(
        &self,
        store: &dyn KeyValueStore,
        clock: &dyn Clock,
    ) -> Result<RolloverOutcome, RolloverError> {
        let today = self.calendar.today(clock);
        let plan = self.plan(store, today)?;
        store.commit(plan.batch)?;

        match &plan.outcome {
            RolloverOutcome::FirstRun { today } => {
                info!(today = %today, "no previous app date recorded; marker initialised");
            }
            RolloverOutcome::SameDay { today } => {
                debug!(today = %today, "already rolled over today");
            }
            RolloverOutcome::RolledOver(summary) => {
                info!(
                    previous = %summary.previous,
                    today = %summary.today,
                    route_assignments_archived = summary.route_assignments_archived,
                    map_assignments_archived = summary.map_assignments_archived,
                    attendance_archived = summary.attendance_archived,
                    workers_transformed = summary.workers_transformed,
                    workers_kept = summary.workers_kept,
                    "new day detected; daily assignments and worker statuses reset"
                );
            }
        }
        Ok(plan.outcome)
    }

    pub fn plan(
        &self,
        store: &dyn KeyValueStore,
        today: NaiveDate,
    ) -> Result<RolloverPlan, RolloverError> {
        let marker_key = self.keys.last_app_date.as_str();
        let raw_marker = store.get(marker_key)?;
        let previous: Option<NaiveDate> = decode(marker_key, raw_marker.clone())?;
        let mut batch = WriteBatch::guarded(marker_key, raw_marker);

        let outcome = match previous {
            None => RolloverOutcome::FirstRun { today },
            Some(previous) if previous == today => RolloverOutcome::SameDay { today },
            Some(previous) => {
                if previous > today {
                    warn!(previous = %previous, today = %today, "last app date is ahead of today");
                }
                RolloverOutcome::RolledOver(self.plan_new_day(store, &mut batch, previous, today)?)
            }
        };

        batch.set(marker_key, Value::String(format_date(today)));
        Ok(RolloverPlan { outcome, batch })
    }

    fn plan_new_day(
        &self,
        store: &dyn KeyValueStore,
        batch: &mut WriteBatch,
        previous: NaiveDate,
        today: NaiveDate,
    ) -> Result<RolloverSummary, StoreError> {
        let route_assignments_archived =
            archive_assignments(store, batch, self.keys.route_assignments.as_str(), previous)?;
        let map_assignments_archived =
            archive_assignments(store, batch, self.keys.map_assignments.as_str(), previous)?;

        let flag_key = self.keys.attendance_finalized.as_str();
        let flag: Option<AttendanceFlag> = decode(flag_key, store.get(flag_key)?)?;
        let attendance_archived = flag.is_some_and(|flag| flag.is_set());
        if attendance_archived {
            batch.set(archive_key(flag_key, previous), Value::Bool(true));
        }
        batch.remove(flag_key);

        let workers_key = self.keys.workers.as_str();
        let mut workers: Vec<Value> =
            decode(workers_key, store.get(workers_key)?)?.unwrap_or_default();
        let mut workers_transformed = 0;
        let mut workers_kept = 0;
        if !workers.is_empty() {
            for record in workers.iter_mut() {
                let rolled = roll_over_record(record, today)
                    .map_err(|err| StoreError::decode(workers_key, err))?;
                if rolled {
                    workers_transformed += 1;
                } else {
                    workers_kept += 1;
                }
            }
            batch.set(workers_key, Value::Array(workers));
        }

        Ok(RolloverSummary {
            previous,
            today,
            route_assignments_archived,
            map_assignments_archived,
            attendance_archived,
            workers_transformed,
            workers_kept,
        })
    }
}

/// Copies a non-empty live slot to `<key>_<previous>` verbatim, then clears the slot.
fn archive_assignments(
    store: &dyn KeyValueStore,
    batch: &mut WriteBatch,
    key: &str,
    previous: NaiveDate,
) -> Result<bool, StoreError> {
    let raw = store.get(key)?;
    let assignments: Option<Assignments> = decode(key, raw.clone())?;
    let archived = match (assignments, raw) {
        (Some(assignments), Some(raw)) if !assignments.is_empty() => {
            batch.set(archive_key(key, previous), raw);
            true
        }
        _ => false,
    };
    batch.remove(key);
    Ok(archived)
}
