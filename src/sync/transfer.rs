//! Cross-subject reassignment
//!
//! Moves selected authorisation sub-trees and unscheduled movements from
//! one subject to another. Every referenced id must belong to the `from`
//! subject; anything else is an identity mismatch and aborts the plan.

use time::OffsetDateTime;

use crate::core::{
    AuditFact, AuthorisationId, DomainEvent, EntityKind, IdentityMismatch, MovementId, OpContext,
    SubjectId, ValidationFailure,
};
use crate::store::{ChangeSet, SubjectRecords, SubjectSummary};

use super::SyncError;
use super::engine::Builder;

/// Which sub-trees to move.
#[derive(Clone, Debug, Default)]
pub struct TransferSelection {
    pub authorisation_ids: Vec<AuthorisationId>,
    pub unscheduled_movement_ids: Vec<MovementId>,
}

pub(crate) fn plan_transfer(
    ctx: &OpContext,
    from: &SubjectId,
    from_records: &SubjectRecords,
    to: &SubjectSummary,
    selection: &TransferSelection,
    now: OffsetDateTime,
) -> Result<ChangeSet, SyncError> {
    let mut builder = Builder::new(ctx, now);

    for auth_id in &selection.authorisation_ids {
        let before = from_records
            .authorisations
            .iter()
            .find(|a| a.id == *auth_id)
            .ok_or_else(|| {
                SyncError::Core(
                    IdentityMismatch {
                        kind: "authorisation",
                        id: auth_id.to_string(),
                        subject: from.to_string(),
                    }
                    .into(),
                )
            })?;

        let mut after = before.clone();
        after.subject_id = to.subject_id.clone();
        if let Some(fact) = AuditFact::updated(
            ctx,
            EntityKind::Authorisation,
            after.id.to_string(),
            &before.field_summary(),
            &after.field_summary(),
            now,
        ) {
            builder.changes.audit.push(fact);
        }
        builder.event(DomainEvent::AuthorisationTransferred {
            id: after.id,
            from_subject: from.clone(),
            to_subject: to.subject_id.clone(),
        });
        builder.changes.upserted_authorisations.push(after);

        // Movements recorded under this sub-tree follow their subject.
        for occurrence in from_records.occurrences_of(*auth_id) {
            for movement in from_records.movements_of(occurrence.id) {
                let mut moved = movement.clone();
                moved.subject_id = to.subject_id.clone();
                if let Some(fact) = AuditFact::updated(
                    ctx,
                    EntityKind::Movement,
                    moved.id.to_string(),
                    &movement.field_summary(),
                    &moved.field_summary(),
                    now,
                ) {
                    builder.changes.audit.push(fact);
                }
                builder.event(DomainEvent::MovementTransferred {
                    id: moved.id,
                    from_subject: from.clone(),
                    to_subject: to.subject_id.clone(),
                });
                builder.changes.upserted_movements.push(moved);
            }
        }
    }

    for movement_id in &selection.unscheduled_movement_ids {
        let before = from_records
            .movements
            .iter()
            .find(|m| m.id == *movement_id)
            .ok_or_else(|| {
                SyncError::Core(
                    IdentityMismatch {
                        kind: "movement",
                        id: movement_id.to_string(),
                        subject: from.to_string(),
                    }
                    .into(),
                )
            })?;
        if !before.is_unscheduled() {
            return Err(SyncError::Core(
                ValidationFailure {
                    field: "unscheduled_movement_ids",
                    reason: format!("movement {} is attached to an occurrence", before.id),
                }
                .into(),
            ));
        }

        let mut after = before.clone();
        after.subject_id = to.subject_id.clone();
        if let Some(fact) = AuditFact::updated(
            ctx,
            EntityKind::Movement,
            after.id.to_string(),
            &before.field_summary(),
            &after.field_summary(),
            now,
        ) {
            builder.changes.audit.push(fact);
        }
        builder.event(DomainEvent::MovementTransferred {
            id: after.id,
            from_subject: from.clone(),
            to_subject: to.subject_id.clone(),
        });
        builder.changes.upserted_movements.push(after);
    }

    Ok(builder.changes)
}
