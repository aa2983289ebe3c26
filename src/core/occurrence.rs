//! Occurrence: one concrete scheduled instance of an absence.
//!
//! Carries its own categorisation copy - a repeat series may diverge from
//! the owning authorisation occurrence by occurrence.

use serde::{Deserialize, Serialize};

use super::audit::FieldSummary;
use super::identity::{AuthorisationId, LegacyId, OccurrenceId};
use super::path::{Categorisation, ReasonPath};
use super::status::OccurrenceStatus;
use super::time::TimeWindow;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub authorisation_id: AuthorisationId,
    /// Last derived status; recomputed whenever movements or the parent change.
    pub status: OccurrenceStatus,
    /// Explicit per-occurrence cancellation, independent of the parent.
    pub cancelled: bool,
    pub window: TimeWindow,
    pub categorisation: Categorisation,
    pub reason_path: ReasonPath,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub comments: Option<String>,
    pub legacy_id: Option<LegacyId>,
}

impl Occurrence {
    pub fn new(authorisation_id: AuthorisationId, window: TimeWindow) -> Self {
        Self {
            id: OccurrenceId::generate(),
            authorisation_id,
            status: OccurrenceStatus::Pending,
            cancelled: false,
            window,
            categorisation: Categorisation::default(),
            reason_path: ReasonPath::empty(),
            location: None,
            contact: None,
            comments: None,
            legacy_id: None,
        }
    }

    /// Flat field view for audit diffing.
    pub fn field_summary(&self) -> FieldSummary {
        let mut fields = FieldSummary::new();
        fields.insert("authorisation", self.authorisation_id.to_string());
        fields.insert("status", self.status.as_str().to_string());
        fields.insert("cancelled", self.cancelled.to_string());
        fields.insert("window_start", self.window.start().to_string());
        fields.insert("window_end", self.window.end().to_string());
        fields.insert("reason_path", self.reason_path.to_string());
        if let Some(location) = &self.location {
            fields.insert("location", location.clone());
        }
        if let Some(contact) = &self.contact {
            fields.insert("contact", contact.clone());
        }
        if let Some(comments) = &self.comments {
            fields.insert("comments", comments.clone());
        }
        if let Some(legacy) = &self.legacy_id {
            fields.insert("legacy_id", legacy.to_string());
        }
        fields
    }
}
