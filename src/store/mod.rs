//! Storage boundary
//!
//! The engine plans mutations against a loaded per-subject working set and
//! commits them as one `ChangeSet` - the unit-of-work boundary. Same-subject
//! exclusion between overlapping operations is the store's responsibility;
//! the core never mutates across subjects in one plan except `transfer`,
//! which names both subjects up front.

pub mod memory;

use thiserror::Error;

use crate::core::{
    AuditFact, Authorisation, AuthorisationId, EntityKind, EventEnvelope, LegacyId, Movement,
    MovementId, Occurrence, OccurrenceId, PrisonCode, SubjectId,
};
use crate::error::{Effect, Transience};

pub use memory::{MemoryDirectory, MemoryStore};

/// Storage/collaborator failures, distinct from domain refusals.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum StoreError {
    #[error("duplicate legacy id {legacy} for {kind}")]
    LegacyIdConflict { kind: EntityKind, legacy: LegacyId },

    #[error("{kind} `{id}` references missing parent `{parent}`")]
    MissingParent {
        kind: EntityKind,
        id: String,
        parent: String,
    },

    #[error("subject `{0}` is locked by another operation")]
    SubjectLocked(SubjectId),
}

impl StoreError {
    pub fn transience(&self) -> Transience {
        match self {
            StoreError::SubjectLocked(_) => Transience::Retryable,
            _ => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        // Commits validate before applying anything.
        Effect::None
    }
}

/// Identity summary of a subject, fetched once per operation before any
/// mutation begins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectSummary {
    pub subject_id: SubjectId,
    pub prison_code: PrisonCode,
}

/// External collaborator answering "who is this subject".
pub trait SubjectDirectory {
    /// `NotFound` if the subject is unknown.
    fn summary(&self, subject: &SubjectId) -> Result<SubjectSummary, crate::core::CoreError>;
}

/// Everything persisted for one subject.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectRecords {
    pub authorisations: Vec<Authorisation>,
    pub occurrences: Vec<Occurrence>,
    pub movements: Vec<Movement>,
}

impl SubjectRecords {
    pub fn occurrences_of(&self, auth: AuthorisationId) -> impl Iterator<Item = &Occurrence> {
        self.occurrences
            .iter()
            .filter(move |o| o.authorisation_id == auth)
    }

    pub fn movements_of(&self, occurrence: OccurrenceId) -> impl Iterator<Item = &Movement> {
        self.movements
            .iter()
            .filter(move |m| m.occurrence_id == Some(occurrence))
    }

    pub fn unscheduled_movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.iter().filter(|m| m.is_unscheduled())
    }

    pub fn is_empty(&self) -> bool {
        self.authorisations.is_empty() && self.occurrences.is_empty() && self.movements.is_empty()
    }
}

/// One atomic unit of work: upserts, deletes, and the facts describing them.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    pub upserted_authorisations: Vec<Authorisation>,
    pub upserted_occurrences: Vec<Occurrence>,
    pub upserted_movements: Vec<Movement>,
    pub deleted_authorisations: Vec<AuthorisationId>,
    pub deleted_occurrences: Vec<OccurrenceId>,
    pub deleted_movements: Vec<MovementId>,
    pub audit: Vec<AuditFact>,
    pub events: Vec<EventEnvelope>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upserted_authorisations.is_empty()
            && self.upserted_occurrences.is_empty()
            && self.upserted_movements.is_empty()
            && self.deleted_authorisations.is_empty()
            && self.deleted_occurrences.is_empty()
            && self.deleted_movements.is_empty()
            && self.audit.is_empty()
            && self.events.is_empty()
    }

    /// Historical backfill: events leave the engine already published.
    pub fn mark_events_published(&mut self) {
        for envelope in &mut self.events {
            envelope.mark_published();
        }
    }

    pub fn absorb(&mut self, other: ChangeSet) {
        self.upserted_authorisations
            .extend(other.upserted_authorisations);
        self.upserted_occurrences.extend(other.upserted_occurrences);
        self.upserted_movements.extend(other.upserted_movements);
        self.deleted_authorisations
            .extend(other.deleted_authorisations);
        self.deleted_occurrences.extend(other.deleted_occurrences);
        self.deleted_movements.extend(other.deleted_movements);
        self.audit.extend(other.audit);
        self.events.extend(other.events);
    }
}

/// Persistent store of the entity hierarchy, one collection per kind,
/// keyed by internal id with a unique `(kind, legacy_id)` constraint.
pub trait SubjectStore {
    fn load_subject(&self, subject: &SubjectId) -> Result<SubjectRecords, StoreError>;

    fn find_authorisation(&self, id: AuthorisationId) -> Option<Authorisation>;
    fn find_authorisation_by_legacy(&self, legacy: LegacyId) -> Option<Authorisation>;
    fn find_occurrence(&self, id: OccurrenceId) -> Option<Occurrence>;
    fn find_occurrence_by_legacy(&self, legacy: LegacyId) -> Option<Occurrence>;
    fn find_movement(&self, id: MovementId) -> Option<Movement>;
    fn find_movement_by_legacy(&self, legacy: LegacyId) -> Option<Movement>;

    /// Distinct subjects with any persisted records.
    fn subjects(&self) -> Vec<SubjectId>;

    /// Apply a change set atomically: validate everything, then apply all,
    /// or refuse and apply nothing.
    fn commit(&mut self, changes: ChangeSet) -> Result<(), StoreError>;
}
