//! Movement: one recorded physical departure (OUT) or return (IN).
//!
//! A movement with no occurrence reference is "unscheduled" - recorded
//! outside any planned absence.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::audit::FieldSummary;
use super::domain::Direction;
use super::identity::{EntryCode, LegacyId, MovementId, OccurrenceId, PrisonCode, SubjectId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub subject_id: SubjectId,
    /// None = unscheduled.
    pub occurrence_id: Option<OccurrenceId>,
    pub direction: Direction,
    pub occurred_at: OffsetDateTime,
    pub reason: Option<EntryCode>,
    pub accompaniment: Option<EntryCode>,
    pub comments: Option<String>,
    pub recording_prison: PrisonCode,
    pub legacy_id: Option<LegacyId>,
}

impl Movement {
    /// Record a new movement with a fresh id.
    pub fn record(
        subject_id: SubjectId,
        occurrence_id: Option<OccurrenceId>,
        direction: Direction,
        occurred_at: OffsetDateTime,
        recording_prison: PrisonCode,
    ) -> Self {
        Self {
            id: MovementId::generate(),
            subject_id,
            occurrence_id,
            direction,
            occurred_at,
            reason: None,
            accompaniment: None,
            comments: None,
            recording_prison,
            legacy_id: None,
        }
    }

    pub fn is_unscheduled(&self) -> bool {
        self.occurrence_id.is_none()
    }

    /// Flat field view for audit diffing.
    pub fn field_summary(&self) -> FieldSummary {
        let mut fields = FieldSummary::new();
        fields.insert("subject", self.subject_id.to_string());
        if let Some(occurrence) = &self.occurrence_id {
            fields.insert("occurrence", occurrence.to_string());
        }
        fields.insert("direction", self.direction.as_str().to_string());
        fields.insert("occurred_at", self.occurred_at.to_string());
        if let Some(reason) = &self.reason {
            fields.insert("reason", reason.to_string());
        }
        if let Some(accompaniment) = &self.accompaniment {
            fields.insert("accompaniment", accompaniment.to_string());
        }
        if let Some(comments) = &self.comments {
            fields.insert("comments", comments.clone());
        }
        fields.insert("recording_prison", self.recording_prison.to_string());
        if let Some(legacy) = &self.legacy_id {
            fields.insert("legacy_id", legacy.to_string());
        }
        fields
    }
}
