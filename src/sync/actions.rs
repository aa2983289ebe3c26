//! Explicit authorisation actions
//!
//! Approve, deny, cancel, expire, defer. Each runs the status machine,
//! cascades an occurrence recompute, and appends audit + event facts.
//! Entities are never mutated outside these actions or reconciliation.

use time::OffsetDateTime;

use crate::core::{
    Authorisation, AuthorisationId, AuthorisationStatus, Movement, OpContext,
    derive_occurrence_status,
};
use crate::store::{ChangeSet, SubjectRecords};

use super::SyncError;
use super::engine::Builder;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorisationAction {
    Approve,
    Deny,
    Cancel,
    Expire,
    Defer,
}

impl AuthorisationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
            Self::Defer => "defer",
        }
    }

    fn apply(
        &self,
        auth: &Authorisation,
        now: OffsetDateTime,
    ) -> Result<AuthorisationStatus, SyncError> {
        let today = now.date();
        let next = match self {
            Self::Approve => auth.status.approve(&auth.range, today)?,
            Self::Deny => auth.status.deny()?,
            Self::Cancel => auth.status.cancel()?,
            Self::Expire => auth.status.expire(&auth.range, today)?,
            Self::Defer => auth.status.defer(&auth.range, today)?,
        };
        Ok(next)
    }
}

pub(crate) fn plan_action(
    ctx: &OpContext,
    records: &SubjectRecords,
    authorisation: AuthorisationId,
    action: AuthorisationAction,
    now: OffsetDateTime,
) -> Result<ChangeSet, SyncError> {
    let before = records
        .authorisations
        .iter()
        .find(|a| a.id == authorisation)
        .ok_or_else(|| {
            SyncError::Core(
                crate::core::NotFound::entity(
                    crate::core::EntityKind::Authorisation,
                    authorisation.to_string(),
                )
                .into(),
            )
        })?;

    let mut after = before.clone();
    after.status = action.apply(before, now)?;

    let mut builder = Builder::new(ctx, now);
    builder.update_authorisation(before, &after);

    // Cascade: every owned occurrence re-derives under the new parent status.
    for occurrence in records.occurrences_of(after.id) {
        let attached: Vec<&Movement> = records.movements_of(occurrence.id).collect();
        let status = derive_occurrence_status(
            after.status,
            occurrence.cancelled,
            &occurrence.window,
            &attached,
            now,
        );
        if status != occurrence.status {
            let mut updated = occurrence.clone();
            updated.status = status;
            builder.update_occurrence(occurrence, &updated);
        }
    }

    Ok(builder.changes)
}
