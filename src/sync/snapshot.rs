//! Incoming snapshot shape
//!
//! The legacy system of record pushes camelCase JSON. Everything arrives as
//! loosely-typed strings; parsing into domain types happens at reconciliation
//! time so a malformed snapshot aborts the unit of work with a specific kind.

use serde::Deserialize;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::core::{
    AuthorisationStatus, Categorisation, CoreError, Direction, EntryCode, ValidationFailure,
};

/// Full or partial hierarchy for one subject.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceSnapshot {
    #[serde(default)]
    pub authorisations: Vec<AuthorisationIn>,
    #[serde(default)]
    pub unscheduled_movements: Vec<MovementIn>,
}

impl AbsenceSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| {
            ValidationFailure {
                field: "snapshot",
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorisationIn {
    pub legacy_id: i64,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub categorisation: CategorisationIn,
    #[serde(default)]
    pub status: Option<String>,
    pub date_range: DateRangeIn,
    #[serde(default)]
    pub prison_code: Option<String>,
    #[serde(default)]
    pub accompaniment: Option<String>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub repeating: bool,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub occurrences: Vec<OccurrenceIn>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorisationIn {
    #[serde(default)]
    pub type_code: Option<String>,
    #[serde(default)]
    pub sub_type_code: Option<String>,
    #[serde(default)]
    pub reason_category_code: Option<String>,
    #[serde(default)]
    pub reason_code: Option<String>,
}

impl CategorisationIn {
    pub fn to_categorisation(&self) -> Result<Categorisation, CoreError> {
        Ok(Categorisation {
            absence_type: parse_code(self.type_code.as_deref())?,
            absence_sub_type: parse_code(self.sub_type_code.as_deref())?,
            reason_category: parse_code(self.reason_category_code.as_deref())?,
            reason: parse_code(self.reason_code.as_deref())?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.type_code.is_none()
            && self.sub_type_code.is_none()
            && self.reason_category_code.is_none()
            && self.reason_code.is_none()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeIn {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceIn {
    pub legacy_id: i64,
    #[serde(default)]
    pub id: Option<Uuid>,
    /// None = inherit the authorisation's categorisation.
    #[serde(default)]
    pub categorisation: Option<CategorisationIn>,
    pub window: WindowIn,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub movements: Vec<MovementIn>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowIn {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementIn {
    pub legacy_id: i64,
    #[serde(default)]
    pub id: Option<Uuid>,
    pub direction: String,
    pub occurred_at: String,
    #[serde(default)]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub accompaniment: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default, alias = "location")]
    pub recording_prison: Option<String>,
}

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub(crate) fn parse_code(raw: Option<&str>) -> Result<Option<EntryCode>, CoreError> {
    raw.map(EntryCode::parse).transpose()
}

pub(crate) fn parse_date(raw: &str, field: &'static str) -> Result<Date, CoreError> {
    Date::parse(raw, DATE_FORMAT).map_err(|e| {
        ValidationFailure {
            field,
            reason: format!("`{raw}` is not a date: {e}"),
        }
        .into()
    })
}

pub(crate) fn parse_datetime(raw: &str, field: &'static str) -> Result<OffsetDateTime, CoreError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| {
        ValidationFailure {
            field,
            reason: format!("`{raw}` is not an RFC 3339 timestamp: {e}"),
        }
        .into()
    })
}

pub(crate) fn parse_direction(raw: &str) -> Result<Direction, CoreError> {
    match raw.to_ascii_lowercase().as_str() {
        "out" => Ok(Direction::Out),
        "in" => Ok(Direction::In),
        _ => Err(ValidationFailure {
            field: "direction",
            reason: format!("`{raw}` is neither OUT nor IN"),
        }
        .into()),
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<AuthorisationStatus, CoreError> {
    match raw.to_ascii_lowercase().as_str() {
        "pending" => Ok(AuthorisationStatus::Pending),
        "approved" => Ok(AuthorisationStatus::Approved),
        "denied" => Ok(AuthorisationStatus::Denied),
        "cancelled" => Ok(AuthorisationStatus::Cancelled),
        "expired" => Ok(AuthorisationStatus::Expired),
        _ => Err(ValidationFailure {
            field: "status",
            reason: format!("`{raw}` is not an authorisation status"),
        }
        .into()),
    }
}
