//! Periodic status sweep
//!
//! The only time-triggered responsibility in the core: re-derive statuses
//! for records whose window or range has elapsed since the last recompute.
//! Runs one unit of work per subject, so it may overlap a reconciliation
//! for a different subject.

use time::OffsetDateTime;

use crate::core::{AuthorisationStatus, Movement, OpContext, derive_occurrence_status};
use crate::store::{ChangeSet, SubjectRecords};

use super::engine::Builder;

pub(crate) fn plan_sweep(
    ctx: &OpContext,
    records: &SubjectRecords,
    now: OffsetDateTime,
) -> ChangeSet {
    let mut builder = Builder::new(ctx, now);
    let today = now.date();

    let mut swept = records.authorisations.clone();
    for auth in &mut swept {
        if auth.status == AuthorisationStatus::Pending && auth.range.has_passed(today) {
            let before = auth.clone();
            auth.status = AuthorisationStatus::Expired;
            builder.update_authorisation(&before, auth);
        }
    }

    for auth in &swept {
        for occurrence in records.occurrences_of(auth.id) {
            let attached: Vec<&Movement> = records.movements_of(occurrence.id).collect();
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

    builder.changes
}
