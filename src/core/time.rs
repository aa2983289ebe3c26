//! Date and time windows
//!
//! DateRange: inclusive day range of an authorisation
//! TimeWindow: instant range of one occurrence

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::error::{CoreError, ValidationFailure};

/// Inclusive date range. `end < start` is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Result<Self, CoreError> {
        if end < start {
            return Err(ValidationFailure {
                field: "date_range",
                reason: format!("end {end} precedes start {start}"),
            }
            .into());
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn contains(&self, day: Date) -> bool {
        self.start <= day && day <= self.end
    }

    /// Whether the whole range lies in the past.
    pub fn has_passed(&self, today: Date) -> bool {
        self.end < today
    }

    /// Whether a time window falls inside this range (by calendar day).
    pub fn covers_window(&self, window: &TimeWindow) -> bool {
        self.contains(window.start().date()) && self.contains(window.end().date())
    }
}

/// Instant window of one occurrence. `end < start` is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl TimeWindow {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self, CoreError> {
        if end < start {
            return Err(ValidationFailure {
                field: "window",
                reason: format!("end {end} precedes start {start}"),
            }
            .into());
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    pub fn end(&self) -> OffsetDateTime {
        self.end
    }

    pub fn has_started(&self, now: OffsetDateTime) -> bool {
        self.start <= now
    }

    pub fn has_ended(&self, now: OffsetDateTime) -> bool {
        self.end < now
    }

    pub fn is_future(&self, now: OffsetDateTime) -> bool {
        now < self.start
    }
}
