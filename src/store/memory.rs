//! In-memory store
//!
//! Reference implementation of the storage boundary: three keyed
//! collections, legacy-id indexes, and an append-only audit/event log.
//! Commit validates the whole change set before touching any collection.

use std::collections::BTreeMap;

use crate::core::{
    AuditFact, Authorisation, AuthorisationId, CoreError, EntityKind, EventEnvelope, LegacyId,
    Movement, MovementId, NotFound, Occurrence, OccurrenceId, SubjectId,
};

use super::{ChangeSet, StoreError, SubjectDirectory, SubjectRecords, SubjectStore, SubjectSummary};

#[derive(Debug, Default)]
pub struct MemoryStore {
    authorisations: BTreeMap<AuthorisationId, Authorisation>,
    occurrences: BTreeMap<OccurrenceId, Occurrence>,
    movements: BTreeMap<MovementId, Movement>,
    auth_legacy: BTreeMap<LegacyId, AuthorisationId>,
    occurrence_legacy: BTreeMap<LegacyId, OccurrenceId>,
    movement_legacy: BTreeMap<LegacyId, MovementId>,
    /// entity id -> ordered facts; position is the per-entity sequence.
    audit_log: BTreeMap<String, Vec<AuditFact>>,
    events: Vec<EventEnvelope>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Facts recorded for one entity, in sequence order.
    pub fn audit_for(&self, entity_id: &str) -> &[AuditFact] {
        self.audit_log
            .get(entity_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn audit_fact_count(&self) -> usize {
        self.audit_log.values().map(Vec::len).sum()
    }

    pub fn events(&self) -> &[EventEnvelope] {
        &self.events
    }

    /// Hand unpublished events to the caller-owned publication step.
    pub fn drain_unpublished_events(&mut self) -> Vec<EventEnvelope> {
        let mut drained = Vec::new();
        for envelope in &mut self.events {
            if !envelope.published {
                drained.push(envelope.clone());
                envelope.mark_published();
            }
        }
        drained
    }

    fn validate(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        for auth in &changes.upserted_authorisations {
            if let Some(legacy) = auth.legacy_id
                && let Some(held_by) = self.auth_legacy.get(&legacy)
                && *held_by != auth.id
                && !changes.deleted_authorisations.contains(held_by)
            {
                return Err(StoreError::LegacyIdConflict {
                    kind: EntityKind::Authorisation,
                    legacy,
                });
            }
        }
        for occurrence in &changes.upserted_occurrences {
            if let Some(legacy) = occurrence.legacy_id
                && let Some(held_by) = self.occurrence_legacy.get(&legacy)
                && *held_by != occurrence.id
                && !changes.deleted_occurrences.contains(held_by)
            {
                return Err(StoreError::LegacyIdConflict {
                    kind: EntityKind::Occurrence,
                    legacy,
                });
            }
            // A parent deleted and re-upserted in the same change set counts
            // as present.
            let parent_present = changes
                .upserted_authorisations
                .iter()
                .any(|a| a.id == occurrence.authorisation_id)
                || (self.authorisations.contains_key(&occurrence.authorisation_id)
                    && !changes
                        .deleted_authorisations
                        .contains(&occurrence.authorisation_id));
            if !parent_present {
                return Err(StoreError::MissingParent {
                    kind: EntityKind::Occurrence,
                    id: occurrence.id.to_string(),
                    parent: occurrence.authorisation_id.to_string(),
                });
            }
        }
        for movement in &changes.upserted_movements {
            if let Some(legacy) = movement.legacy_id
                && let Some(held_by) = self.movement_legacy.get(&legacy)
                && *held_by != movement.id
                && !changes.deleted_movements.contains(held_by)
            {
                return Err(StoreError::LegacyIdConflict {
                    kind: EntityKind::Movement,
                    legacy,
                });
            }
            if let Some(occurrence_id) = movement.occurrence_id {
                let parent_present = changes
                    .upserted_occurrences
                    .iter()
                    .any(|o| o.id == occurrence_id)
                    || (self.occurrences.contains_key(&occurrence_id)
                        && !changes.deleted_occurrences.contains(&occurrence_id));
                if !parent_present {
                    return Err(StoreError::MissingParent {
                        kind: EntityKind::Movement,
                        id: movement.id.to_string(),
                        parent: occurrence_id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl SubjectStore for MemoryStore {
    fn load_subject(&self, subject: &SubjectId) -> Result<SubjectRecords, StoreError> {
        let authorisations: Vec<Authorisation> = self
            .authorisations
            .values()
            .filter(|a| &a.subject_id == subject)
            .cloned()
            .collect();
        let occurrences: Vec<Occurrence> = self
            .occurrences
            .values()
            .filter(|o| {
                authorisations
                    .iter()
                    .any(|a| a.id == o.authorisation_id)
            })
            .cloned()
            .collect();
        let movements: Vec<Movement> = self
            .movements
            .values()
            .filter(|m| &m.subject_id == subject)
            .cloned()
            .collect();
        Ok(SubjectRecords {
            authorisations,
            occurrences,
            movements,
        })
    }

    fn find_authorisation(&self, id: AuthorisationId) -> Option<Authorisation> {
        self.authorisations.get(&id).cloned()
    }

    fn find_authorisation_by_legacy(&self, legacy: LegacyId) -> Option<Authorisation> {
        self.auth_legacy
            .get(&legacy)
            .and_then(|id| self.authorisations.get(id))
            .cloned()
    }

    fn find_occurrence(&self, id: OccurrenceId) -> Option<Occurrence> {
        self.occurrences.get(&id).cloned()
    }

    fn find_occurrence_by_legacy(&self, legacy: LegacyId) -> Option<Occurrence> {
        self.occurrence_legacy
            .get(&legacy)
            .and_then(|id| self.occurrences.get(id))
            .cloned()
    }

    fn find_movement(&self, id: MovementId) -> Option<Movement> {
        self.movements.get(&id).cloned()
    }

    fn find_movement_by_legacy(&self, legacy: LegacyId) -> Option<Movement> {
        self.movement_legacy
            .get(&legacy)
            .and_then(|id| self.movements.get(id))
            .cloned()
    }

    fn subjects(&self) -> Vec<SubjectId> {
        let mut subjects: Vec<SubjectId> = self
            .authorisations
            .values()
            .map(|a| a.subject_id.clone())
            .chain(self.movements.values().map(|m| m.subject_id.clone()))
            .collect();
        subjects.sort();
        subjects.dedup();
        subjects
    }

    fn commit(&mut self, changes: ChangeSet) -> Result<(), StoreError> {
        self.validate(&changes)?;

        // Deletes first so reassigned legacy ids land cleanly.
        for id in &changes.deleted_movements {
            if let Some(movement) = self.movements.remove(id)
                && let Some(legacy) = movement.legacy_id
            {
                self.movement_legacy.remove(&legacy);
            }
        }
        for id in &changes.deleted_occurrences {
            if let Some(occurrence) = self.occurrences.remove(id)
                && let Some(legacy) = occurrence.legacy_id
            {
                self.occurrence_legacy.remove(&legacy);
            }
        }
        for id in &changes.deleted_authorisations {
            if let Some(auth) = self.authorisations.remove(id)
                && let Some(legacy) = auth.legacy_id
            {
                self.auth_legacy.remove(&legacy);
            }
        }

        for auth in changes.upserted_authorisations {
            if let Some(legacy) = auth.legacy_id {
                self.auth_legacy.insert(legacy, auth.id);
            }
            self.authorisations.insert(auth.id, auth);
        }
        for occurrence in changes.upserted_occurrences {
            if let Some(legacy) = occurrence.legacy_id {
                self.occurrence_legacy.insert(legacy, occurrence.id);
            }
            self.occurrences.insert(occurrence.id, occurrence);
        }
        for movement in changes.upserted_movements {
            if let Some(legacy) = movement.legacy_id {
                self.movement_legacy.insert(legacy, movement.id);
            }
            self.movements.insert(movement.id, movement);
        }

        for fact in changes.audit {
            self.audit_log
                .entry(fact.entity_id.clone())
                .or_default()
                .push(fact);
        }
        self.events.extend(changes.events);
        Ok(())
    }
}

/// In-memory subject directory for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    subjects: BTreeMap<SubjectId, SubjectSummary>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, summary: SubjectSummary) {
        self.subjects.insert(summary.subject_id.clone(), summary);
    }
}

impl SubjectDirectory for MemoryDirectory {
    fn summary(&self, subject: &SubjectId) -> Result<SubjectSummary, CoreError> {
        self.subjects
            .get(subject)
            .cloned()
            .ok_or_else(|| NotFound::subject(subject.to_string()).into())
    }
}
