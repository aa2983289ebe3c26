//! Snapshot reconciliation
//!
//! Plans a `ChangeSet` from one subject's loaded records and an incoming
//! snapshot. Two modes: full replace (tear down, rebuild) and merge (match
//! by internal id first, then legacy id; update in place; create the
//! unmatched; delete anything whose identity appears nowhere in the
//! snapshot). Planning is pure - nothing touches the store until the caller
//! commits - so any failure aborts the unit of work with prior state intact.

use std::collections::{BTreeMap, BTreeSet};

use time::OffsetDateTime;
use tracing::debug;

use crate::core::{
    AuditFact, Authorisation, AuthorisationId, AuthorisationStatus, Categorisation, DateRange,
    DomainEvent, EntityKind, EntryCode, EventEnvelope, LegacyId, Movement, MovementId, Occurrence,
    OccurrenceId, OccurrenceStatus, OpContext, PrisonCode, ReasonPath, RefDomain,
    ReferenceCatalog, TimeWindow, ValidationFailure, derive_occurrence_status, resolve_path,
};
use crate::store::{ChangeSet, SubjectRecords, SubjectSummary};

use super::SyncError;
use super::snapshot::{
    AbsenceSnapshot, AuthorisationIn, MovementIn, OccurrenceIn, parse_code, parse_date,
    parse_datetime, parse_direction, parse_status,
};

/// Accumulates upserts, deletes, audit facts and events for one plan.
pub(crate) struct Builder<'a> {
    ctx: &'a OpContext,
    now: OffsetDateTime,
    pub changes: ChangeSet,
}

impl<'a> Builder<'a> {
    pub fn new(ctx: &'a OpContext, now: OffsetDateTime) -> Self {
        Self {
            ctx,
            now,
            changes: ChangeSet::default(),
        }
    }

    pub fn event(&mut self, event: DomainEvent) {
        self.changes
            .events
            .push(EventEnvelope::queued(event, self.ctx.source, self.now));
    }

    pub fn create_authorisation(&mut self, auth: &Authorisation) {
        self.changes.audit.push(AuditFact::created(
            self.ctx,
            EntityKind::Authorisation,
            auth.id.to_string(),
            &auth.field_summary(),
            self.now,
        ));
        self.event(DomainEvent::AuthorisationCreated {
            id: auth.id,
            subject: auth.subject_id.clone(),
        });
        self.changes.upserted_authorisations.push(auth.clone());
    }

    /// Returns true when anything changed. No-op updates append nothing.
    pub fn update_authorisation(&mut self, before: &Authorisation, after: &Authorisation) -> bool {
        let Some(fact) = AuditFact::updated(
            self.ctx,
            EntityKind::Authorisation,
            after.id.to_string(),
            &before.field_summary(),
            &after.field_summary(),
            self.now,
        ) else {
            return false;
        };
        let status_changed = before.status != after.status;
        let other_changes = fact.changes.iter().any(|c| c.field != "status");
        self.changes.audit.push(fact);
        if status_changed {
            self.event(DomainEvent::AuthorisationStatusChanged {
                id: after.id,
                subject: after.subject_id.clone(),
                from: before.status,
                to: after.status,
            });
        }
        if other_changes {
            self.event(DomainEvent::AuthorisationUpdated {
                id: after.id,
                subject: after.subject_id.clone(),
            });
        }
        self.changes.upserted_authorisations.push(after.clone());
        true
    }

    pub fn delete_authorisation(&mut self, auth: &Authorisation) {
        self.changes.audit.push(AuditFact::deleted(
            self.ctx,
            EntityKind::Authorisation,
            auth.id.to_string(),
            &auth.field_summary(),
            self.now,
        ));
        self.event(DomainEvent::AuthorisationDeleted {
            id: auth.id,
            subject: auth.subject_id.clone(),
        });
        self.changes.deleted_authorisations.push(auth.id);
    }

    pub fn create_occurrence(&mut self, occurrence: &Occurrence) {
        self.changes.audit.push(AuditFact::created(
            self.ctx,
            EntityKind::Occurrence,
            occurrence.id.to_string(),
            &occurrence.field_summary(),
            self.now,
        ));
        self.event(DomainEvent::OccurrenceCreated {
            id: occurrence.id,
            authorisation: occurrence.authorisation_id,
        });
        self.changes.upserted_occurrences.push(occurrence.clone());
    }

    pub fn update_occurrence(&mut self, before: &Occurrence, after: &Occurrence) -> bool {
        let Some(fact) = AuditFact::updated(
            self.ctx,
            EntityKind::Occurrence,
            after.id.to_string(),
            &before.field_summary(),
            &after.field_summary(),
            self.now,
        ) else {
            return false;
        };
        let status_changed = before.status != after.status;
        let other_changes = fact.changes.iter().any(|c| c.field != "status");
        self.changes.audit.push(fact);
        if status_changed {
            self.event(DomainEvent::OccurrenceStatusChanged {
                id: after.id,
                from: before.status,
                to: after.status,
            });
        }
        if other_changes {
            self.event(DomainEvent::OccurrenceUpdated {
                id: after.id,
                authorisation: after.authorisation_id,
            });
        }
        self.changes.upserted_occurrences.push(after.clone());
        true
    }

    pub fn delete_occurrence(&mut self, occurrence: &Occurrence) {
        self.changes.audit.push(AuditFact::deleted(
            self.ctx,
            EntityKind::Occurrence,
            occurrence.id.to_string(),
            &occurrence.field_summary(),
            self.now,
        ));
        self.event(DomainEvent::OccurrenceDeleted {
            id: occurrence.id,
            authorisation: occurrence.authorisation_id,
        });
        self.changes.deleted_occurrences.push(occurrence.id);
    }

    pub fn create_movement(&mut self, movement: &Movement) {
        self.changes.audit.push(AuditFact::created(
            self.ctx,
            EntityKind::Movement,
            movement.id.to_string(),
            &movement.field_summary(),
            self.now,
        ));
        self.event(DomainEvent::MovementRecorded {
            id: movement.id,
            subject: movement.subject_id.clone(),
            direction: movement.direction,
        });
        self.changes.upserted_movements.push(movement.clone());
    }

    pub fn update_movement(&mut self, before: &Movement, after: &Movement) -> bool {
        let Some(fact) = AuditFact::updated(
            self.ctx,
            EntityKind::Movement,
            after.id.to_string(),
            &before.field_summary(),
            &after.field_summary(),
            self.now,
        ) else {
            return false;
        };
        let reassigned = before.occurrence_id != after.occurrence_id;
        let other_changes = fact.changes.iter().any(|c| c.field != "occurrence");
        self.changes.audit.push(fact);
        if reassigned {
            self.event(DomainEvent::MovementReassigned {
                id: after.id,
                from_occurrence: before.occurrence_id,
                to_occurrence: after.occurrence_id,
            });
        }
        if other_changes {
            self.event(DomainEvent::MovementUpdated {
                id: after.id,
                subject: after.subject_id.clone(),
            });
        }
        self.changes.upserted_movements.push(after.clone());
        true
    }

    pub fn delete_movement(&mut self, movement: &Movement) {
        self.changes.audit.push(AuditFact::deleted(
            self.ctx,
            EntityKind::Movement,
            movement.id.to_string(),
            &movement.field_summary(),
            self.now,
        ));
        self.event(DomainEvent::MovementDeleted {
            id: movement.id,
            subject: movement.subject_id.clone(),
        });
        self.changes.deleted_movements.push(movement.id);
    }
}

/// The reconciliation engine. Holds the immutable catalog snapshot for the
/// duration of one operation.
pub struct Reconciler<'c> {
    catalog: &'c ReferenceCatalog,
}

impl<'c> Reconciler<'c> {
    pub fn new(catalog: &'c ReferenceCatalog) -> Self {
        Self { catalog }
    }

    /// Delete everything for the subject, rebuild from the snapshot.
    pub fn full_replace(
        &self,
        ctx: &OpContext,
        summary: &SubjectSummary,
        existing: &SubjectRecords,
        snapshot: &AbsenceSnapshot,
        now: OffsetDateTime,
    ) -> Result<ChangeSet, SyncError> {
        let mut builder = Builder::new(ctx, now);

        for movement in &existing.movements {
            builder.delete_movement(movement);
        }
        for occurrence in &existing.occurrences {
            builder.delete_occurrence(occurrence);
        }
        for auth in &existing.authorisations {
            builder.delete_authorisation(auth);
        }

        for auth_in in &snapshot.authorisations {
            let auth = self.new_authorisation(summary, auth_in, now)?;
            builder.create_authorisation(&auth);
            for occurrence_in in &auth_in.occurrences {
                let mut occurrence = self.new_occurrence(&auth, occurrence_in)?;
                let mut attached: Vec<Movement> = Vec::new();
                for movement_in in &occurrence_in.movements {
                    let movement =
                        self.new_movement(summary, Some(occurrence.id), movement_in)?;
                    attached.push(movement);
                }
                let refs: Vec<&Movement> = attached.iter().collect();
                occurrence.status = derive_occurrence_status(
                    auth.status,
                    occurrence.cancelled,
                    &occurrence.window,
                    &refs,
                    now,
                );
                builder.create_occurrence(&occurrence);
                for movement in attached {
                    builder.create_movement(&movement);
                }
            }
        }
        for movement_in in &snapshot.unscheduled_movements {
            let movement = self.new_movement(summary, None, movement_in)?;
            builder.create_movement(&movement);
        }

        debug!(
            subject = %summary.subject_id,
            created = builder.changes.upserted_authorisations.len(),
            "full replace planned"
        );
        Ok(builder.changes)
    }

    /// Match, update, create, delete. Identity that appears nowhere in the
    /// snapshot is removed; deletion cascades down the hierarchy.
    pub fn merge(
        &self,
        ctx: &OpContext,
        summary: &SubjectSummary,
        existing: &SubjectRecords,
        snapshot: &AbsenceSnapshot,
        now: OffsetDateTime,
    ) -> Result<ChangeSet, SyncError> {
        let mut builder = Builder::new(ctx, now);

        let auths_by_id: BTreeMap<AuthorisationId, &Authorisation> =
            existing.authorisations.iter().map(|a| (a.id, a)).collect();
        let auths_by_legacy: BTreeMap<LegacyId, AuthorisationId> = existing
            .authorisations
            .iter()
            .filter_map(|a| a.legacy_id.map(|l| (l, a.id)))
            .collect();
        let occurrences_by_id: BTreeMap<OccurrenceId, &Occurrence> =
            existing.occurrences.iter().map(|o| (o.id, o)).collect();
        let occurrences_by_legacy: BTreeMap<LegacyId, OccurrenceId> = existing
            .occurrences
            .iter()
            .filter_map(|o| o.legacy_id.map(|l| (l, o.id)))
            .collect();
        let movements_by_id: BTreeMap<MovementId, &Movement> =
            existing.movements.iter().map(|m| (m.id, m)).collect();
        let movements_by_legacy: BTreeMap<LegacyId, MovementId> = existing
            .movements
            .iter()
            .filter_map(|m| m.legacy_id.map(|l| (l, m.id)))
            .collect();

        let mut matched_auths: BTreeSet<AuthorisationId> = BTreeSet::new();
        let mut matched_occurrences: BTreeSet<OccurrenceId> = BTreeSet::new();
        let mut matched_movements: BTreeSet<MovementId> = BTreeSet::new();

        for auth_in in &snapshot.authorisations {
            let matched = match_identity(
                auth_in.id.map(AuthorisationId::from_uuid),
                auth_in.legacy_id,
                &auths_by_id,
                &auths_by_legacy,
            )?;

            let auth = match matched {
                Some(id) => {
                    matched_auths.insert(id);
                    let before = auths_by_id[&id];
                    let after = self.apply_authorisation(before, auth_in, now)?;
                    builder.update_authorisation(before, &after);
                    after
                }
                None => {
                    let auth = self.new_authorisation(summary, auth_in, now)?;
                    builder.create_authorisation(&auth);
                    auth
                }
            };

            for occurrence_in in &auth_in.occurrences {
                let matched = match_identity(
                    occurrence_in.id.map(OccurrenceId::from_uuid),
                    occurrence_in.legacy_id,
                    &occurrences_by_id,
                    &occurrences_by_legacy,
                )?;

                let (before, mut occurrence) = match matched {
                    Some(id) => {
                        matched_occurrences.insert(id);
                        let before = occurrences_by_id[&id];
                        (
                            Some(before),
                            self.apply_occurrence(before, &auth, occurrence_in)?,
                        )
                    }
                    None => (None, self.new_occurrence(&auth, occurrence_in)?),
                };

                let mut attached: Vec<Movement> = Vec::new();
                for movement_in in &occurrence_in.movements {
                    let movement = self.place_movement(
                        &mut builder,
                        summary,
                        Some(occurrence.id),
                        movement_in,
                        &movements_by_id,
                        &movements_by_legacy,
                        &mut matched_movements,
                    )?;
                    attached.push(movement);
                }
                let refs: Vec<&Movement> = attached.iter().collect();
                occurrence.status = derive_occurrence_status(
                    auth.status,
                    occurrence.cancelled,
                    &occurrence.window,
                    &refs,
                    now,
                );

                match before {
                    Some(before) => {
                        builder.update_occurrence(before, &occurrence);
                    }
                    None => builder.create_occurrence(&occurrence),
                }
            }
        }

        for movement_in in &snapshot.unscheduled_movements {
            self.place_movement(
                &mut builder,
                summary,
                None,
                movement_in,
                &movements_by_id,
                &movements_by_legacy,
                &mut matched_movements,
            )?;
        }

        // Orphan removal: three passes, leaf-first, give cascade semantics -
        // an unmatched authorisation can only leave matched descendants when
        // the snapshot re-homed them.
        for movement in &existing.movements {
            if !matched_movements.contains(&movement.id) {
                builder.delete_movement(movement);
            }
        }
        for occurrence in &existing.occurrences {
            if !matched_occurrences.contains(&occurrence.id) {
                builder.delete_occurrence(occurrence);
            }
        }
        for auth in &existing.authorisations {
            if !matched_auths.contains(&auth.id) {
                builder.delete_authorisation(auth);
            }
        }

        debug!(
            subject = %summary.subject_id,
            facts = builder.changes.audit.len(),
            events = builder.changes.events.len(),
            "merge planned"
        );
        Ok(builder.changes)
    }

    // ---- record construction ------------------------------------------------

    pub(crate) fn new_authorisation(
        &self,
        summary: &SubjectSummary,
        auth_in: &AuthorisationIn,
        now: OffsetDateTime,
    ) -> Result<Authorisation, SyncError> {
        let range = parse_range(auth_in)?;
        let categorisation = auth_in.categorisation.to_categorisation()?;
        let reason_path = resolve_path(&categorisation, self.catalog)?;
        let incoming = auth_in.status.as_deref().map(parse_status).transpose()?;
        let status = reconcile_status(AuthorisationStatus::Pending, incoming, &range, now);
        let prison_code = match auth_in.prison_code.as_deref() {
            Some(raw) => PrisonCode::parse(raw)?,
            None => summary.prison_code.clone(),
        };

        Ok(Authorisation {
            id: auth_in
                .id
                .map(AuthorisationId::from_uuid)
                .unwrap_or_else(AuthorisationId::generate),
            subject_id: summary.subject_id.clone(),
            prison_code,
            status,
            categorisation,
            reason_path,
            accompaniment: self.escort_code(RefDomain::Accompaniment, &auth_in.accompaniment)?,
            transport: self.escort_code(RefDomain::Transport, &auth_in.transport)?,
            repeating: auth_in.repeating,
            range,
            comments: auth_in.comments.clone(),
            locations: auth_in.locations.iter().cloned().collect(),
            legacy_id: Some(LegacyId::new(auth_in.legacy_id)?),
        })
    }

    pub(crate) fn apply_authorisation(
        &self,
        before: &Authorisation,
        auth_in: &AuthorisationIn,
        now: OffsetDateTime,
    ) -> Result<Authorisation, SyncError> {
        let range = parse_range(auth_in)?;
        let categorisation = auth_in.categorisation.to_categorisation()?;
        let reason_path = resolve_path(&categorisation, self.catalog)?;
        let incoming = auth_in.status.as_deref().map(parse_status).transpose()?;
        let status = reconcile_status(before.status, incoming, &range, now);
        let prison_code = match auth_in.prison_code.as_deref() {
            Some(raw) => PrisonCode::parse(raw)?,
            None => before.prison_code.clone(),
        };

        Ok(Authorisation {
            id: before.id,
            subject_id: before.subject_id.clone(),
            prison_code,
            status,
            categorisation,
            reason_path,
            accompaniment: self.escort_code(RefDomain::Accompaniment, &auth_in.accompaniment)?,
            transport: self.escort_code(RefDomain::Transport, &auth_in.transport)?,
            repeating: auth_in.repeating,
            range,
            comments: auth_in.comments.clone(),
            locations: auth_in.locations.iter().cloned().collect(),
            legacy_id: Some(LegacyId::new(auth_in.legacy_id)?),
        })
    }

    pub(crate) fn new_occurrence(
        &self,
        auth: &Authorisation,
        occurrence_in: &OccurrenceIn,
    ) -> Result<Occurrence, SyncError> {
        let (categorisation, reason_path, window) =
            self.occurrence_parts(auth, occurrence_in)?;
        Ok(Occurrence {
            id: occurrence_in
                .id
                .map(OccurrenceId::from_uuid)
                .unwrap_or_else(OccurrenceId::generate),
            authorisation_id: auth.id,
            status: OccurrenceStatus::Pending,
            cancelled: occurrence_in.cancelled,
            window,
            categorisation,
            reason_path,
            location: occurrence_in.location.clone(),
            contact: occurrence_in.contact.clone(),
            comments: occurrence_in.comments.clone(),
            legacy_id: Some(LegacyId::new(occurrence_in.legacy_id)?),
        })
    }

    pub(crate) fn apply_occurrence(
        &self,
        before: &Occurrence,
        auth: &Authorisation,
        occurrence_in: &OccurrenceIn,
    ) -> Result<Occurrence, SyncError> {
        let (categorisation, reason_path, window) =
            self.occurrence_parts(auth, occurrence_in)?;
        Ok(Occurrence {
            id: before.id,
            authorisation_id: auth.id,
            status: before.status,
            cancelled: occurrence_in.cancelled,
            window,
            categorisation,
            reason_path,
            location: occurrence_in.location.clone(),
            contact: occurrence_in.contact.clone(),
            comments: occurrence_in.comments.clone(),
            legacy_id: Some(LegacyId::new(occurrence_in.legacy_id)?),
        })
    }

    fn occurrence_parts(
        &self,
        auth: &Authorisation,
        occurrence_in: &OccurrenceIn,
    ) -> Result<(Categorisation, ReasonPath, TimeWindow), SyncError> {
        let categorisation = match &occurrence_in.categorisation {
            Some(own) if !own.is_empty() => own.to_categorisation()?,
            _ => auth.categorisation.clone(),
        };
        let reason_path = resolve_path(&categorisation, self.catalog)?;
        let window = TimeWindow::new(
            parse_datetime(&occurrence_in.window.start, "window")?,
            parse_datetime(&occurrence_in.window.end, "window")?,
        )?;
        if !auth.range.covers_window(&window) {
            return Err(SyncError::Core(
                ValidationFailure {
                    field: "window",
                    reason: format!(
                        "occurrence window {}..{} falls outside authorisation range {}..{}",
                        window.start(),
                        window.end(),
                        auth.range.start(),
                        auth.range.end()
                    ),
                }
                .into(),
            ));
        }
        Ok((categorisation, reason_path, window))
    }

    pub(crate) fn new_movement(
        &self,
        summary: &SubjectSummary,
        occurrence_id: Option<OccurrenceId>,
        movement_in: &MovementIn,
    ) -> Result<Movement, SyncError> {
        let reason = self.escort_code(RefDomain::AbsenceReason, &movement_in.reason_code)?;
        let accompaniment =
            self.escort_code(RefDomain::Accompaniment, &movement_in.accompaniment)?;
        let recording_prison = match movement_in.recording_prison.as_deref() {
            Some(raw) => PrisonCode::parse(raw)?,
            None => summary.prison_code.clone(),
        };
        Ok(Movement {
            id: movement_in
                .id
                .map(MovementId::from_uuid)
                .unwrap_or_else(MovementId::generate),
            subject_id: summary.subject_id.clone(),
            occurrence_id,
            direction: parse_direction(&movement_in.direction)?,
            occurred_at: parse_datetime(&movement_in.occurred_at, "occurred_at")?,
            reason,
            accompaniment,
            comments: movement_in.comments.clone(),
            recording_prison,
            legacy_id: Some(LegacyId::new(movement_in.legacy_id)?),
        })
    }

    pub(crate) fn apply_movement(
        &self,
        before: &Movement,
        occurrence_id: Option<OccurrenceId>,
        movement_in: &MovementIn,
    ) -> Result<Movement, SyncError> {
        let reason = self.escort_code(RefDomain::AbsenceReason, &movement_in.reason_code)?;
        let accompaniment =
            self.escort_code(RefDomain::Accompaniment, &movement_in.accompaniment)?;
        let recording_prison = match movement_in.recording_prison.as_deref() {
            Some(raw) => PrisonCode::parse(raw)?,
            None => before.recording_prison.clone(),
        };
        Ok(Movement {
            id: before.id,
            subject_id: before.subject_id.clone(),
            occurrence_id,
            direction: parse_direction(&movement_in.direction)?,
            occurred_at: parse_datetime(&movement_in.occurred_at, "occurred_at")?,
            reason,
            accompaniment,
            comments: movement_in.comments.clone(),
            recording_prison,
            legacy_id: Some(LegacyId::new(movement_in.legacy_id)?),
        })
    }

    /// Match-or-create one movement under the given occurrence (None for
    /// unscheduled). An identity match pointing at a different occurrence is
    /// a reassignment, not a delete-and-recreate.
    #[allow(clippy::too_many_arguments)]
    fn place_movement(
        &self,
        builder: &mut Builder<'_>,
        summary: &SubjectSummary,
        occurrence_id: Option<OccurrenceId>,
        movement_in: &MovementIn,
        movements_by_id: &BTreeMap<MovementId, &Movement>,
        movements_by_legacy: &BTreeMap<LegacyId, MovementId>,
        matched_movements: &mut BTreeSet<MovementId>,
    ) -> Result<Movement, SyncError> {
        let matched = match_identity(
            movement_in.id.map(MovementId::from_uuid),
            movement_in.legacy_id,
            movements_by_id,
            movements_by_legacy,
        )?;

        match matched {
            Some(id) => {
                matched_movements.insert(id);
                let before = movements_by_id[&id];
                let after = self.apply_movement(before, occurrence_id, movement_in)?;
                builder.update_movement(before, &after);
                Ok(after)
            }
            None => {
                let movement = self.new_movement(summary, occurrence_id, movement_in)?;
                builder.create_movement(&movement);
                Ok(movement)
            }
        }
    }

    fn escort_code(
        &self,
        domain: RefDomain,
        raw: &Option<String>,
    ) -> Result<Option<EntryCode>, SyncError> {
        let Some(code) = parse_code(raw.as_deref())? else {
            return Ok(None);
        };
        self.catalog.require(domain, &code)?;
        Ok(Some(code))
    }
}

fn parse_range(auth_in: &AuthorisationIn) -> Result<DateRange, SyncError> {
    Ok(DateRange::new(
        parse_date(&auth_in.date_range.start, "date_range")?,
        parse_date(&auth_in.date_range.end, "date_range")?,
    )?)
}

/// Adopt the snapshot's status, with two corrections: a reset to pending is
/// honoured only while the range is still live, and a pending authorisation
/// whose range has passed without approval is expired.
fn reconcile_status(
    current: AuthorisationStatus,
    incoming: Option<AuthorisationStatus>,
    range: &DateRange,
    now: OffsetDateTime,
) -> AuthorisationStatus {
    let target = incoming.unwrap_or(current);
    if target == AuthorisationStatus::Pending && range.has_passed(now.date()) {
        AuthorisationStatus::Expired
    } else {
        target
    }
}

/// Internal id first, then legacy id.
fn match_identity<K: Ord + Copy, V>(
    id: Option<K>,
    raw_legacy: i64,
    by_id: &BTreeMap<K, V>,
    by_legacy: &BTreeMap<LegacyId, K>,
) -> Result<Option<K>, SyncError> {
    if let Some(id) = id
        && by_id.contains_key(&id)
    {
        return Ok(Some(id));
    }
    let legacy = LegacyId::new(raw_legacy)?;
    Ok(by_legacy.get(&legacy).copied())
}
