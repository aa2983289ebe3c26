//! Authorisation: a granted permission for temporary absence.
//!
//! Owns zero or more occurrences (by reference, not containment - the
//! hierarchy lives in the store, keyed by `authorisation_id`).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::audit::FieldSummary;
use super::identity::{AuthorisationId, EntryCode, LegacyId, PrisonCode, SubjectId};
use super::path::{Categorisation, ReasonPath};
use super::status::AuthorisationStatus;
use super::time::DateRange;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorisation {
    pub id: AuthorisationId,
    pub subject_id: SubjectId,
    pub prison_code: PrisonCode,
    pub status: AuthorisationStatus,
    pub categorisation: Categorisation,
    pub reason_path: ReasonPath,
    pub accompaniment: Option<EntryCode>,
    pub transport: Option<EntryCode>,
    pub repeating: bool,
    pub range: DateRange,
    pub comments: Option<String>,
    pub locations: BTreeSet<String>,
    pub legacy_id: Option<LegacyId>,
}

impl Authorisation {
    pub fn new(subject_id: SubjectId, prison_code: PrisonCode, range: DateRange) -> Self {
        Self {
            id: AuthorisationId::generate(),
            subject_id,
            prison_code,
            status: AuthorisationStatus::Pending,
            categorisation: Categorisation::default(),
            reason_path: ReasonPath::empty(),
            accompaniment: None,
            transport: None,
            repeating: false,
            range,
            comments: None,
            locations: BTreeSet::new(),
            legacy_id: None,
        }
    }

    /// Flat field view for audit diffing.
    pub fn field_summary(&self) -> FieldSummary {
        let mut fields = FieldSummary::new();
        fields.insert("subject", self.subject_id.to_string());
        fields.insert("prison", self.prison_code.to_string());
        fields.insert("status", self.status.as_str().to_string());
        fields.insert("reason_path", self.reason_path.to_string());
        if let Some(accompaniment) = &self.accompaniment {
            fields.insert("accompaniment", accompaniment.to_string());
        }
        if let Some(transport) = &self.transport {
            fields.insert("transport", transport.to_string());
        }
        fields.insert("repeating", self.repeating.to_string());
        fields.insert("range_start", self.range.start().to_string());
        fields.insert("range_end", self.range.end().to_string());
        if let Some(comments) = &self.comments {
            fields.insert("comments", comments.clone());
        }
        if !self.locations.is_empty() {
            let joined: Vec<&str> = self.locations.iter().map(String::as_str).collect();
            fields.insert("locations", joined.join(","));
        }
        if let Some(legacy) = &self.legacy_id {
            fields.insert("legacy_id", legacy.to_string());
        }
        fields
    }
}
