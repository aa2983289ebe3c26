//! Reconciliation operations
//!
//! The four operation contracts exposed to the transport layer - `migrate`,
//! `resync`, `sync_single`, `transfer` - plus explicit authorisation actions
//! and the periodic status sweep. Each invocation is one synchronous unit of
//! work: fetch the subject's identity summary once, load, plan, commit.
//! Emitted events are returned to the caller, which owns durable enqueue.

pub mod actions;
pub mod engine;
pub mod single;
pub mod snapshot;
pub mod sweep;
pub mod transfer;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::core::{
    AuditFact, AuthorisationId, CoreError, EntityKind, EventEnvelope, NotFound, OpContext,
    ReferenceCatalog, SubjectId, ValidationFailure,
};
use crate::error::{Effect, Transience};
use crate::store::{StoreError, SubjectDirectory, SubjectRecords, SubjectStore};

pub use actions::AuthorisationAction;
pub use engine::Reconciler;
pub use single::SingleRecord;
pub use snapshot::{
    AbsenceSnapshot, AuthorisationIn, CategorisationIn, DateRangeIn, MovementIn, OccurrenceIn,
    WindowIn,
};
pub use transfer::TransferSelection;

/// Reconciliation capability errors.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn transience(&self) -> Transience {
        match self {
            SyncError::Core(e) => e.transience(),
            SyncError::Store(e) => e.transience(),
        }
    }

    pub fn effect(&self) -> Effect {
        // Planning is pure; commit validates before applying.
        Effect::None
    }
}

/// What one operation did: the resulting hierarchy plus the facts it
/// appended. Events are also persisted; this copy is for the caller's
/// publication step.
#[derive(Clone, Debug, Default)]
pub struct SyncOutcome {
    pub records: SubjectRecords,
    pub audit: Vec<AuditFact>,
    pub events: Vec<EventEnvelope>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.audit.is_empty() && self.events.is_empty()
    }

    fn count(&self, action: crate::core::AuditAction) -> usize {
        self.audit.iter().filter(|f| f.action == action).count()
    }

    pub fn created(&self) -> usize {
        self.count(crate::core::AuditAction::Created)
    }

    pub fn updated(&self) -> usize {
        self.count(crate::core::AuditAction::Updated)
    }

    pub fn deleted(&self) -> usize {
        self.count(crate::core::AuditAction::Deleted)
    }
}

/// Entry point for all reconciliation operations against one store.
pub struct Synchroniser<'a, S, D> {
    store: &'a mut S,
    directory: &'a D,
    catalog: &'a ReferenceCatalog,
}

impl<'a, S: SubjectStore, D: SubjectDirectory> Synchroniser<'a, S, D> {
    pub fn new(store: &'a mut S, directory: &'a D, catalog: &'a ReferenceCatalog) -> Self {
        Self {
            store,
            directory,
            catalog,
        }
    }

    /// Full-replace reconciliation. Historical backfill: produced events are
    /// marked already-published.
    pub fn migrate(
        &mut self,
        ctx: &OpContext,
        subject: &SubjectId,
        snapshot: &AbsenceSnapshot,
        now: OffsetDateTime,
    ) -> Result<SyncOutcome, SyncError> {
        let summary = self.directory.summary(subject)?;
        let existing = self.store.load_subject(subject)?;
        let mut changes =
            Reconciler::new(self.catalog).full_replace(ctx, &summary, &existing, snapshot, now)?;
        changes.mark_events_published();
        self.finish(subject, changes, "migrate")
    }

    /// Merge reconciliation. Events are queued for normal publication.
    pub fn resync(
        &mut self,
        ctx: &OpContext,
        subject: &SubjectId,
        snapshot: &AbsenceSnapshot,
        now: OffsetDateTime,
    ) -> Result<SyncOutcome, SyncError> {
        let summary = self.directory.summary(subject)?;
        let existing = self.store.load_subject(subject)?;
        let changes =
            Reconciler::new(self.catalog).merge(ctx, &summary, &existing, snapshot, now)?;
        self.finish(subject, changes, "resync")
    }

    /// Create-or-update a single record by id-or-legacy-id match.
    pub fn sync_single(
        &mut self,
        ctx: &OpContext,
        record: &SingleRecord,
        now: OffsetDateTime,
    ) -> Result<SyncOutcome, SyncError> {
        let subject = record.subject_of(&*self.store)?;
        let summary = self.directory.summary(&subject)?;
        let records = self.store.load_subject(&subject)?;
        let changes = single::plan_single(
            self.catalog,
            &*self.store,
            ctx,
            &summary,
            &records,
            record,
            now,
        )?;
        self.finish(&subject, changes, "sync_single")
    }

    /// Reassign selected sub-trees between two subjects.
    pub fn transfer(
        &mut self,
        ctx: &OpContext,
        from: &SubjectId,
        to: &SubjectId,
        selection: &TransferSelection,
        now: OffsetDateTime,
    ) -> Result<SyncOutcome, SyncError> {
        if from == to {
            return Err(SyncError::Core(
                ValidationFailure {
                    field: "subject",
                    reason: "transfer source and destination are the same subject".into(),
                }
                .into(),
            ));
        }
        self.directory.summary(from)?;
        let to_summary = self.directory.summary(to)?;
        let from_records = self.store.load_subject(from)?;
        let changes = transfer::plan_transfer(ctx, from, &from_records, &to_summary, selection, now)?;
        self.finish(to, changes, "transfer")
    }

    /// Run one explicit action against an authorisation, cascading the
    /// occurrence recompute.
    pub fn act(
        &mut self,
        ctx: &OpContext,
        authorisation: AuthorisationId,
        action: AuthorisationAction,
        now: OffsetDateTime,
    ) -> Result<SyncOutcome, SyncError> {
        let auth = self
            .store
            .find_authorisation(authorisation)
            .ok_or_else(|| {
                SyncError::Core(
                    NotFound::entity(EntityKind::Authorisation, authorisation.to_string()).into(),
                )
            })?;
        let subject = auth.subject_id.clone();
        let records = self.store.load_subject(&subject)?;
        let changes = actions::plan_action(ctx, &records, authorisation, action, now)?;
        self.finish(&subject, changes, action.as_str())
    }

    /// Recompute elapsed-window statuses across every subject, one unit of
    /// work per subject.
    pub fn sweep(&mut self, ctx: &OpContext, now: OffsetDateTime) -> Result<SyncOutcome, SyncError> {
        let mut outcome = SyncOutcome::default();
        for subject in self.store.subjects() {
            let records = self.store.load_subject(&subject)?;
            let changes = sweep::plan_sweep(ctx, &records, now);
            if changes.is_empty() {
                continue;
            }
            outcome.audit.extend(changes.audit.iter().cloned());
            outcome.events.extend(changes.events.iter().cloned());
            self.store.commit(changes)?;
        }
        info!(
            facts = outcome.audit.len(),
            events = outcome.events.len(),
            "sweep complete"
        );
        Ok(outcome)
    }

    fn finish(
        &mut self,
        subject: &SubjectId,
        changes: crate::store::ChangeSet,
        op: &'static str,
    ) -> Result<SyncOutcome, SyncError> {
        let audit = changes.audit.clone();
        let events = changes.events.clone();
        self.store.commit(changes)?;
        let records = self.store.load_subject(subject)?;
        info!(
            subject = %subject,
            facts = audit.len(),
            events = events.len(),
            "{op} complete"
        );
        Ok(SyncOutcome {
            records,
            audit,
            events,
        })
    }
}
