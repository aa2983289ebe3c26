//! Status derivation
//!
//! Authorisation status moves only through explicit actions. Occurrence
//! status is never stored free-form: it is a pure function of the parent
//! status, the window, the attached movements and the clock.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::domain::Direction;
use super::error::{CoreError, InvalidStateTransition};
use super::movement::Movement;
use super::time::{DateRange, TimeWindow};

/// Authorisation lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorisationStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
    Expired,
}

impl AuthorisationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Denied | Self::Cancelled | Self::Expired)
    }

    /// `approve`: Pending -> Approved. Refused once the range has passed.
    pub fn approve(self, range: &DateRange, today: Date) -> Result<Self, CoreError> {
        match self {
            Self::Pending if range.has_passed(today) => Err(self.refusal(
                "approve",
                format!("end date {} has passed", range.end()),
            )),
            Self::Pending => Ok(Self::Approved),
            _ => Err(self.refusal("approve", "only a pending authorisation can be approved")),
        }
    }

    /// `deny`: Pending -> Denied.
    pub fn deny(self) -> Result<Self, CoreError> {
        match self {
            Self::Pending => Ok(Self::Denied),
            _ => Err(self.refusal("deny", "only a pending authorisation can be denied")),
        }
    }

    /// `cancel`: Approved -> Cancelled.
    pub fn cancel(self) -> Result<Self, CoreError> {
        match self {
            Self::Approved => Ok(Self::Cancelled),
            _ => Err(self.refusal("cancel", "only an approved authorisation can be cancelled")),
        }
    }

    /// `expire`: Pending -> Expired, once the range has passed.
    pub fn expire(self, range: &DateRange, today: Date) -> Result<Self, CoreError> {
        match self {
            Self::Pending if range.has_passed(today) => Ok(Self::Expired),
            Self::Pending => Err(self.refusal("expire", "end date has not passed")),
            _ => Err(self.refusal("expire", "only a pending authorisation can expire")),
        }
    }

    /// `defer`: any decided state back to Pending, used when resynced data
    /// resets an authorisation that is not yet in the past.
    pub fn defer(self, range: &DateRange, today: Date) -> Result<Self, CoreError> {
        match self {
            Self::Pending => Err(self.refusal("defer", "already pending")),
            _ if range.has_passed(today) => {
                Err(self.refusal("defer", "authorisation is already in the past"))
            }
            _ => Ok(Self::Pending),
        }
    }

    fn refusal(self, action: &'static str, reason: impl Into<String>) -> CoreError {
        InvalidStateTransition {
            entity: "authorisation",
            from: self.as_str(),
            action,
            reason: reason.into(),
        }
        .into()
    }
}

/// Occurrence lifecycle status. Derived, never stored free-form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Pending,
    Scheduled,
    InProgress,
    Overdue,
    Completed,
    Cancelled,
    Denied,
    Expired,
}

impl OccurrenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Denied => "denied",
            Self::Expired => "expired",
        }
    }
}

/// Derive the status of one occurrence.
///
/// Pure in (parent status, cancellation flag, window, movement set, now).
/// The movement set is ordered by `occurred_at` internally; the latest
/// movement decides whether the absence is open (OUT) or closed (IN).
pub fn derive_occurrence_status(
    parent: AuthorisationStatus,
    cancelled: bool,
    window: &TimeWindow,
    movements: &[&Movement],
    now: OffsetDateTime,
) -> OccurrenceStatus {
    let latest = movements.iter().max_by_key(|m| m.occurred_at);
    let completed = latest.is_some_and(|m| m.direction == Direction::In);
    let out_open = latest.is_some_and(|m| m.direction == Direction::Out);

    match parent {
        AuthorisationStatus::Pending => OccurrenceStatus::Pending,
        AuthorisationStatus::Denied => OccurrenceStatus::Denied,
        AuthorisationStatus::Expired => OccurrenceStatus::Expired,
        AuthorisationStatus::Cancelled => {
            // Cancelling an authorisation expires past occurrences and
            // cancels future ones; a recorded return stays completed.
            if completed {
                OccurrenceStatus::Completed
            } else if window.has_ended(now) {
                OccurrenceStatus::Expired
            } else {
                OccurrenceStatus::Cancelled
            }
        }
        AuthorisationStatus::Approved => {
            if completed {
                OccurrenceStatus::Completed
            } else if cancelled {
                if window.has_ended(now) && movements.is_empty() {
                    OccurrenceStatus::Expired
                } else {
                    OccurrenceStatus::Cancelled
                }
            } else if out_open {
                if !window.has_started(now) {
                    OccurrenceStatus::Scheduled
                } else if window.has_ended(now) {
                    OccurrenceStatus::Overdue
                } else {
                    OccurrenceStatus::InProgress
                }
            } else if window.has_ended(now) {
                OccurrenceStatus::Expired
            } else {
                OccurrenceStatus::Scheduled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;
    use crate::core::identity::{PrisonCode, SubjectId};

    fn range() -> DateRange {
        DateRange::new(date!(2026 - 03 - 01), date!(2026 - 03 - 31)).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 17:00 UTC),
        )
        .unwrap()
    }

    fn movement(direction: Direction, at: OffsetDateTime) -> Movement {
        Movement::record(
            SubjectId::parse("A1234BC").unwrap(),
            None,
            direction,
            at,
            PrisonCode::parse("LEI").unwrap(),
        )
    }

    #[test]
    fn approve_requires_pending() {
        let today = date!(2026 - 03 - 05);
        assert_eq!(
            AuthorisationStatus::Pending.approve(&range(), today).unwrap(),
            AuthorisationStatus::Approved
        );
        assert!(AuthorisationStatus::Denied.approve(&range(), today).is_err());
    }

    #[test]
    fn approve_refused_once_range_has_passed() {
        let err = AuthorisationStatus::Pending
            .approve(&range(), date!(2026 - 04 - 01))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition(_)));
    }

    #[test]
    fn defer_resets_decided_states() {
        let today = date!(2026 - 03 - 05);
        assert_eq!(
            AuthorisationStatus::Approved.defer(&range(), today).unwrap(),
            AuthorisationStatus::Pending
        );
        assert!(
            AuthorisationStatus::Approved
                .defer(&range(), date!(2026 - 04 - 02))
                .is_err()
        );
        assert!(AuthorisationStatus::Pending.defer(&range(), today).is_err());
    }

    #[test]
    fn expire_only_after_end_date() {
        assert!(
            AuthorisationStatus::Pending
                .expire(&range(), date!(2026 - 03 - 20))
                .is_err()
        );
        assert_eq!(
            AuthorisationStatus::Pending
                .expire(&range(), date!(2026 - 04 - 01))
                .unwrap(),
            AuthorisationStatus::Expired
        );
    }

    #[test]
    fn pending_parent_pins_occurrence_pending() {
        let status = derive_occurrence_status(
            AuthorisationStatus::Pending,
            false,
            &window(),
            &[],
            datetime!(2026-03-09 12:00 UTC),
        );
        assert_eq!(status, OccurrenceStatus::Pending);
    }

    #[test]
    fn approved_future_window_is_scheduled() {
        let status = derive_occurrence_status(
            AuthorisationStatus::Approved,
            false,
            &window(),
            &[],
            datetime!(2026-03-09 12:00 UTC),
        );
        assert_eq!(status, OccurrenceStatus::Scheduled);
    }

    #[test]
    fn open_out_is_in_progress_then_overdue() {
        let out = movement(Direction::Out, datetime!(2026-03-10 09:05 UTC));
        let during = derive_occurrence_status(
            AuthorisationStatus::Approved,
            false,
            &window(),
            &[&out],
            datetime!(2026-03-10 12:00 UTC),
        );
        assert_eq!(during, OccurrenceStatus::InProgress);

        let after = derive_occurrence_status(
            AuthorisationStatus::Approved,
            false,
            &window(),
            &[&out],
            datetime!(2026-03-10 18:00 UTC),
        );
        assert_eq!(after, OccurrenceStatus::Overdue);
    }

    #[test]
    fn terminating_in_completes() {
        let out = movement(Direction::Out, datetime!(2026-03-10 09:05 UTC));
        let back = movement(Direction::In, datetime!(2026-03-10 16:30 UTC));
        let status = derive_occurrence_status(
            AuthorisationStatus::Approved,
            false,
            &window(),
            &[&out, &back],
            datetime!(2026-03-11 09:00 UTC),
        );
        assert_eq!(status, OccurrenceStatus::Completed);
    }

    #[test]
    fn untouched_elapsed_window_expires() {
        let status = derive_occurrence_status(
            AuthorisationStatus::Approved,
            false,
            &window(),
            &[],
            datetime!(2026-03-11 09:00 UTC),
        );
        assert_eq!(status, OccurrenceStatus::Expired);
    }

    #[test]
    fn cancelled_parent_splits_past_and_future() {
        let future = derive_occurrence_status(
            AuthorisationStatus::Cancelled,
            false,
            &window(),
            &[],
            datetime!(2026-03-09 12:00 UTC),
        );
        assert_eq!(future, OccurrenceStatus::Cancelled);

        let past = derive_occurrence_status(
            AuthorisationStatus::Cancelled,
            false,
            &window(),
            &[],
            datetime!(2026-03-11 12:00 UTC),
        );
        assert_eq!(past, OccurrenceStatus::Expired);
    }
}
