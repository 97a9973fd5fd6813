//! Worker records as stored under the worker-list key, and the booking state
//! machine that the daily rollover advances.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::format_date;

const BOOKING_STATUS: &str = "bookingStatus";
const BOOKED_DATE: &str = "bookedDate";

/// Fields describing same-day activity. Rollover strips them from active workers.
pub const DAILY_ACTIVITY_FIELDS: [&str; 5] = [
    "showed",
    "showedDate",
    "confirmationStatus",
    "routeManager",
    "cartId",
];

/// Accumulated payout figures for the last completed day. Rollover keeps them.
pub const PAYOUT_FIELDS: [&str; 6] = [
    "commission",
    "grossSales",
    "equivalent",
    "deductions",
    "bonuses",
    "payoutCompleted",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Today,
    NextDay,
    Calendar,
    NoShow,
    QuitFired,
    WdrTnb,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Today => "today",
            BookingStatus::NextDay => "next_day",
            BookingStatus::Calendar => "calendar",
            BookingStatus::NoShow => "no_show",
            BookingStatus::QuitFired => "quit_fired",
            BookingStatus::WdrTnb => "wdr_tnb",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactiveReason {
    QuitFired,
    WdrTnb,
}

/// What the worker is booked for, independent of how the day went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleIntent {
    Unscheduled,
    NextDay(Option<NaiveDate>),
    Calendar(Option<NaiveDate>),
    Today(Option<NaiveDate>),
}

impl ScheduleIntent {
    fn booked_date(&self) -> Option<NaiveDate> {
        match self {
            ScheduleIntent::Unscheduled => None,
            ScheduleIntent::NextDay(date)
            | ScheduleIntent::Calendar(date)
            | ScheduleIntent::Today(date) => *date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyOutcome {
    Pending,
    NoShow,
}

/// Split view of the single stored `bookingStatus` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    Active {
        intent: ScheduleIntent,
        outcome: DailyOutcome,
    },
    Inactive {
        reason: InactiveReason,
        booked_date: Option<NaiveDate>,
    },
}

impl BookingState {
    pub fn from_presentational(
        status: Option<BookingStatus>,
        booked_date: Option<NaiveDate>,
    ) -> Self {
        let active = |intent| BookingState::Active {
            intent,
            outcome: DailyOutcome::Pending,
        };
        match status {
            None => active(ScheduleIntent::Unscheduled),
            Some(BookingStatus::NextDay) => active(ScheduleIntent::NextDay(booked_date)),
            Some(BookingStatus::Calendar) => active(ScheduleIntent::Calendar(booked_date)),
            Some(BookingStatus::Today) => active(ScheduleIntent::Today(booked_date)),
            Some(BookingStatus::NoShow) => BookingState::Active {
                intent: ScheduleIntent::Today(booked_date),
                outcome: DailyOutcome::NoShow,
            },
            Some(BookingStatus::QuitFired) => BookingState::Inactive {
                reason: InactiveReason::QuitFired,
                booked_date,
            },
            Some(BookingStatus::WdrTnb) => BookingState::Inactive {
                reason: InactiveReason::WdrTnb,
                booked_date,
            },
        }
    }

    pub fn into_presentational(self) -> (Option<BookingStatus>, Option<NaiveDate>) {
        match self {
            BookingState::Inactive {
                reason: InactiveReason::QuitFired,
                booked_date,
            } => (Some(BookingStatus::QuitFired), booked_date),
            BookingState::Inactive {
                reason: InactiveReason::WdrTnb,
                booked_date,
            } => (Some(BookingStatus::WdrTnb), booked_date),
            BookingState::Active {
                intent,
                outcome: DailyOutcome::NoShow,
            } => (Some(BookingStatus::NoShow), intent.booked_date()),
            BookingState::Active { intent, .. } => match intent {
                ScheduleIntent::Unscheduled => (None, None),
                ScheduleIntent::NextDay(date) => (Some(BookingStatus::NextDay), date),
                ScheduleIntent::Calendar(date) => (Some(BookingStatus::Calendar), date),
                ScheduleIntent::Today(date) => (Some(BookingStatus::Today), date),
            },
        }
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, BookingState::Inactive { .. })
    }

    /// Moves the state to the business day `today`, clearing the daily outcome.
    pub fn advance(self, today: NaiveDate) -> Self {
        let BookingState::Active { intent, .. } = self else {
            return self;
        };
        let intent = match intent {
            ScheduleIntent::NextDay(_) => ScheduleIntent::Today(Some(today)),
            ScheduleIntent::Calendar(Some(date)) if date == today => ScheduleIntent::Today(None),
            ScheduleIntent::Calendar(date) => ScheduleIntent::Calendar(date),
            ScheduleIntent::Today(_) | ScheduleIntent::Unscheduled => ScheduleIntent::Unscheduled,
        };
        BookingState::Active {
            intent,
            outcome: DailyOutcome::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_status: Option<BookingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_date: Option<NaiveDate>,
    /// Every other attribute, carried verbatim.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl Worker {
    pub fn label(&self) -> String {
        ["id", "number", "name"]
            .iter()
            .find_map(|key| match self.fields.get(*key) {
                Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
                Some(Value::Number(number)) => Some(number.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "<unnamed>".to_string())
    }

    pub fn booking_state(&self) -> BookingState {
        BookingState::from_presentational(self.booking_status, self.booked_date)
    }

    pub fn set_booking_state(&mut self, state: BookingState) {
        let (status, booked_date) = state.into_presentational();
        self.booking_status = status;
        self.booked_date = booked_date;
    }

    pub fn is_inactive(&self) -> bool {
        self.booking_state().is_inactive()
    }
}

/// Rolls one stored worker object over to business day `today`, editing it in
/// place. Inactive workers are left exactly as stored and yield `false`.
///
/// Only the daily activity fields and the `bookingStatus`/`bookedDate` pair
/// are touched; the pair is rewritten only when its decoded value changes, so
/// member order and explicit `null`s survive elsewhere.
pub fn roll_over_record(record: &mut Value, today: NaiveDate) -> Result<bool, serde_json::Error> {
    let worker = Worker::deserialize(&*record)?;
    let state = worker.booking_state();
    if state.is_inactive() {
        return Ok(false);
    }
    let Value::Object(fields) = record else {
        return Ok(true);
    };

    for field in DAILY_ACTIVITY_FIELDS {
        fields.shift_remove(field);
    }
    let (status, booked_date) = state.advance(today).into_presentational();
    if status != worker.booking_status {
        match status {
            Some(status) => {
                fields.insert(BOOKING_STATUS.to_string(), Value::String(status.to_string()));
            }
            None => {
                fields.shift_remove(BOOKING_STATUS);
            }
        }
    }
    if booked_date != worker.booked_date {
        match booked_date {
            Some(date) => {
                fields.insert(BOOKED_DATE.to_string(), Value::String(format_date(date)));
            }
            None => {
                fields.shift_remove(BOOKED_DATE);
            }
        }
    }
    Ok(true)
}
