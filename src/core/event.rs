//! Domain events
//!
//! Events are plain values returned from engine operations; durable enqueue
//! to any bus is a caller-owned step. `migrate` marks its events published
//! at creation (historical backfill), `resync` leaves them queued.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::domain::{ChangeSource, Direction};
use super::identity::{AuthorisationId, MovementId, OccurrenceId, SubjectId};
use super::status::{AuthorisationStatus, OccurrenceStatus};

/// What changed, described for downstream consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    AuthorisationCreated {
        id: AuthorisationId,
        subject: SubjectId,
    },
    AuthorisationUpdated {
        id: AuthorisationId,
        subject: SubjectId,
    },
    AuthorisationDeleted {
        id: AuthorisationId,
        subject: SubjectId,
    },
    AuthorisationStatusChanged {
        id: AuthorisationId,
        subject: SubjectId,
        from: AuthorisationStatus,
        to: AuthorisationStatus,
    },
    OccurrenceCreated {
        id: OccurrenceId,
        authorisation: AuthorisationId,
    },
    OccurrenceUpdated {
        id: OccurrenceId,
        authorisation: AuthorisationId,
    },
    OccurrenceDeleted {
        id: OccurrenceId,
        authorisation: AuthorisationId,
    },
    OccurrenceStatusChanged {
        id: OccurrenceId,
        from: OccurrenceStatus,
        to: OccurrenceStatus,
    },
    MovementRecorded {
        id: MovementId,
        subject: SubjectId,
        direction: Direction,
    },
    MovementUpdated {
        id: MovementId,
        subject: SubjectId,
    },
    MovementDeleted {
        id: MovementId,
        subject: SubjectId,
    },
    /// A movement switched between scheduled and unscheduled, or between
    /// occurrences, keeping its identity.
    MovementReassigned {
        id: MovementId,
        from_occurrence: Option<OccurrenceId>,
        to_occurrence: Option<OccurrenceId>,
    },
    AuthorisationTransferred {
        id: AuthorisationId,
        from_subject: SubjectId,
        to_subject: SubjectId,
    },
    MovementTransferred {
        id: MovementId,
        from_subject: SubjectId,
        to_subject: SubjectId,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthorisationCreated { .. } => "authorisation_created",
            Self::AuthorisationUpdated { .. } => "authorisation_updated",
            Self::AuthorisationDeleted { .. } => "authorisation_deleted",
            Self::AuthorisationStatusChanged { .. } => "authorisation_status_changed",
            Self::OccurrenceCreated { .. } => "occurrence_created",
            Self::OccurrenceUpdated { .. } => "occurrence_updated",
            Self::OccurrenceDeleted { .. } => "occurrence_deleted",
            Self::OccurrenceStatusChanged { .. } => "occurrence_status_changed",
            Self::MovementRecorded { .. } => "movement_recorded",
            Self::MovementUpdated { .. } => "movement_updated",
            Self::MovementDeleted { .. } => "movement_deleted",
            Self::MovementReassigned { .. } => "movement_reassigned",
            Self::AuthorisationTransferred { .. } => "authorisation_transferred",
            Self::MovementTransferred { .. } => "movement_transferred",
        }
    }
}

/// An event plus its emission metadata and publication state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: DomainEvent,
    pub source: ChangeSource,
    pub occurred_at: OffsetDateTime,
    pub published: bool,
}

impl EventEnvelope {
    /// Queued for normal publication.
    pub fn queued(event: DomainEvent, source: ChangeSource, occurred_at: OffsetDateTime) -> Self {
        Self {
            event,
            source,
            occurred_at,
            published: false,
        }
    }

    pub fn mark_published(&mut self) {
        self.published = true;
    }
}
