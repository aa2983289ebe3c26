//! Single-record sync
//!
//! Create-or-update one authorisation, occurrence or movement by
//! id-or-legacy-id match, outside a full snapshot. Used for incremental
//! legacy updates between resyncs.

use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::core::{
    Authorisation, AuthorisationId, IdentityMismatch, Movement, MovementId, NotFound, Occurrence,
    OccurrenceId, OpContext, ReferenceCatalog, SubjectId, ValidationFailure,
    derive_occurrence_status,
};
use crate::store::{ChangeSet, SubjectRecords, SubjectStore, SubjectSummary};

use super::SyncError;
use super::engine::{Builder, Reconciler};
use super::snapshot::{AuthorisationIn, MovementIn, OccurrenceIn};

/// One incremental record pushed by the system of record.
#[derive(Clone, Debug)]
pub enum SingleRecord {
    Authorisation {
        subject: SubjectId,
        record: AuthorisationIn,
    },
    Occurrence {
        authorisation: AuthorisationId,
        record: OccurrenceIn,
    },
    Movement {
        subject: SubjectId,
        occurrence: Option<OccurrenceId>,
        record: MovementIn,
    },
}

impl SingleRecord {
    pub(crate) fn subject_of(&self, store: &impl SubjectStore) -> Result<SubjectId, SyncError> {
        match self {
            Self::Authorisation { subject, .. } | Self::Movement { subject, .. } => {
                Ok(subject.clone())
            }
            Self::Occurrence { authorisation, .. } => store
                .find_authorisation(*authorisation)
                .map(|a| a.subject_id)
                .ok_or_else(|| {
                    NotFound::entity(
                        crate::core::EntityKind::Authorisation,
                        authorisation.to_string(),
                    )
                    .into()
                })
                .map_err(SyncError::Core),
        }
    }
}

pub(crate) fn plan_single(
    catalog: &ReferenceCatalog,
    store: &impl SubjectStore,
    ctx: &OpContext,
    summary: &SubjectSummary,
    records: &SubjectRecords,
    record: &SingleRecord,
    now: OffsetDateTime,
) -> Result<ChangeSet, SyncError> {
    let reconciler = Reconciler::new(catalog);
    let mut builder = Builder::new(ctx, now);
    match record {
        SingleRecord::Authorisation { subject, record } => {
            plan_authorisation(&reconciler, &mut builder, store, subject, summary, records, record, now)?;
        }
        SingleRecord::Occurrence {
            authorisation,
            record,
        } => {
            plan_occurrence(&reconciler, &mut builder, store, *authorisation, records, record, now)?;
        }
        SingleRecord::Movement {
            subject,
            occurrence,
            record,
        } => {
            plan_movement(&reconciler, &mut builder, store, subject, summary, records, *occurrence, record, now)?;
        }
    }
    Ok(builder.changes)
}

#[allow(clippy::too_many_arguments)]
fn plan_authorisation(
    reconciler: &Reconciler<'_>,
    builder: &mut Builder<'_>,
    store: &impl SubjectStore,
    subject: &SubjectId,
    summary: &SubjectSummary,
    records: &SubjectRecords,
    record: &AuthorisationIn,
    now: OffsetDateTime,
) -> Result<(), SyncError> {
    if !record.occurrences.is_empty() {
        return Err(SyncError::Core(
            ValidationFailure {
                field: "occurrences",
                reason: "single-record sync carries no children".into(),
            }
            .into(),
        ));
    }

    let matched = find_authorisation(store, record)?;
    match matched {
        Some(before) => {
            if &before.subject_id != subject {
                return Err(SyncError::Core(
                    IdentityMismatch {
                        kind: "authorisation",
                        id: before.id.to_string(),
                        subject: subject.to_string(),
                    }
                    .into(),
                ));
            }
            let after = reconciler.apply_authorisation(&before, record, now)?;
            let status_changed = before.status != after.status;
            builder.update_authorisation(&before, &after);
            if status_changed {
                recompute_children(builder, records, &after, None, now);
            }
        }
        None => {
            let auth = reconciler.new_authorisation(summary, record, now)?;
            builder.create_authorisation(&auth);
        }
    }
    Ok(())
}

fn plan_occurrence(
    reconciler: &Reconciler<'_>,
    builder: &mut Builder<'_>,
    store: &impl SubjectStore,
    authorisation: AuthorisationId,
    records: &SubjectRecords,
    record: &OccurrenceIn,
    now: OffsetDateTime,
) -> Result<(), SyncError> {
    if !record.movements.is_empty() {
        return Err(SyncError::Core(
            ValidationFailure {
                field: "movements",
                reason: "single-record sync carries no children".into(),
            }
            .into(),
        ));
    }
    let parent = records
        .authorisations
        .iter()
        .find(|a| a.id == authorisation)
        .ok_or_else(|| {
            SyncError::Core(
                NotFound::entity(
                    crate::core::EntityKind::Authorisation,
                    authorisation.to_string(),
                )
                .into(),
            )
        })?;

    let matched = find_occurrence(store, record)?;
    match matched {
        Some(before) => {
            let mut after = reconciler.apply_occurrence(&before, parent, record)?;
            let attached: Vec<&Movement> = records.movements_of(before.id).collect();
            after.status =
                derive_occurrence_status(parent.status, after.cancelled, &after.window, &attached, now);
            builder.update_occurrence(&before, &after);
        }
        None => {
            let mut occurrence = reconciler.new_occurrence(parent, record)?;
            occurrence.status =
                derive_occurrence_status(parent.status, occurrence.cancelled, &occurrence.window, &[], now);
            builder.create_occurrence(&occurrence);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn plan_movement(
    reconciler: &Reconciler<'_>,
    builder: &mut Builder<'_>,
    store: &impl SubjectStore,
    subject: &SubjectId,
    summary: &SubjectSummary,
    records: &SubjectRecords,
    occurrence: Option<OccurrenceId>,
    record: &MovementIn,
    now: OffsetDateTime,
) -> Result<(), SyncError> {
    if let Some(occurrence_id) = occurrence {
        let owned = records.occurrences.iter().any(|o| o.id == occurrence_id);
        if !owned {
            return Err(SyncError::Core(
                IdentityMismatch {
                    kind: "occurrence",
                    id: occurrence_id.to_string(),
                    subject: subject.to_string(),
                }
                .into(),
            ));
        }
    }

    let matched = find_movement(store, record)?;
    match matched {
        Some(before) => {
            if &before.subject_id != subject {
                return Err(SyncError::Core(
                    IdentityMismatch {
                        kind: "movement",
                        id: before.id.to_string(),
                        subject: subject.to_string(),
                    }
                    .into(),
                ));
            }
            let after = reconciler.apply_movement(&before, occurrence, record)?;
            let mut touched: BTreeSet<OccurrenceId> = BTreeSet::new();
            touched.extend(before.occurrence_id);
            touched.extend(after.occurrence_id);
            builder.update_movement(&before, &after);
            // One recompute per parent, even when the movement switched
            // between two occurrences of the same authorisation.
            let parents: BTreeSet<AuthorisationId> = touched
                .iter()
                .filter_map(|occurrence_id| {
                    records
                        .occurrences
                        .iter()
                        .find(|o| o.id == *occurrence_id)
                        .map(|o| o.authorisation_id)
                })
                .collect();
            for parent_id in parents {
                if let Some(auth) = records.authorisations.iter().find(|a| a.id == parent_id) {
                    recompute_children(builder, records, auth, Some(&after), now);
                }
            }
        }
        None => {
            let movement = reconciler.new_movement(summary, occurrence, record)?;
            builder.create_movement(&movement);
            if let Some(occurrence_id) = movement.occurrence_id
                && let Some(auth) = records
                    .occurrences
                    .iter()
                    .find(|o| o.id == occurrence_id)
                    .and_then(|o| records.authorisations.iter().find(|a| a.id == o.authorisation_id))
            {
                recompute_children(builder, records, auth, Some(&movement), now);
            }
        }
    }
    Ok(())
}

/// Re-derive the status of every occurrence under `auth`, accounting for a
/// movement that changed in this plan.
fn recompute_children(
    builder: &mut Builder<'_>,
    records: &SubjectRecords,
    auth: &Authorisation,
    moved: Option<&Movement>,
    now: OffsetDateTime,
) {
    for occurrence in records.occurrences_of(auth.id) {
        let attached: Vec<&Movement> = records
            .movements_of(occurrence.id)
            .filter(|m| moved.is_none_or(|moved| m.id != moved.id))
            .chain(
                moved
                    .filter(|m| m.occurrence_id == Some(occurrence.id))
                    .into_iter(),
            )
            .collect();
        let status = derive_occurrence_status(
            auth.status,
            occurrence.cancelled,
            &occurrence.window,
            &attached,
            now,
        );
        if status != occurrence.status {
            let mut after = occurrence.clone();
            after.status = status;
            builder.update_occurrence(occurrence, &after);
        }
    }
}

fn find_authorisation(
    store: &impl SubjectStore,
    record: &AuthorisationIn,
) -> Result<Option<Authorisation>, SyncError> {
    if let Some(id) = record.id
        && let Some(found) = store.find_authorisation(AuthorisationId::from_uuid(id))
    {
        return Ok(Some(found));
    }
    let legacy = crate::core::LegacyId::new(record.legacy_id)?;
    Ok(store.find_authorisation_by_legacy(legacy))
}

fn find_occurrence(
    store: &impl SubjectStore,
    record: &OccurrenceIn,
) -> Result<Option<Occurrence>, SyncError> {
    if let Some(id) = record.id
        && let Some(found) = store.find_occurrence(OccurrenceId::from_uuid(id))
    {
        return Ok(Some(found));
    }
    let legacy = crate::core::LegacyId::new(record.legacy_id)?;
    Ok(store.find_occurrence_by_legacy(legacy))
}

fn find_movement(
    store: &impl SubjectStore,
    record: &MovementIn,
) -> Result<Option<Movement>, SyncError> {
    if let Some(id) = record.id
        && let Some(found) = store.find_movement(MovementId::from_uuid(id))
    {
        return Ok(Some(found));
    }
    let legacy = crate::core::LegacyId::new(record.legacy_id)?;
    Ok(store.find_movement_by_legacy(legacy))
}
