//! Core domain types for furlough
//!
//! Module hierarchy follows type dependency order:
//! - identity: SubjectId, ActorId, entity ids, LegacyId
//! - domain: RefDomain, Direction, EntityKind, ChangeSource
//! - time: DateRange, TimeWindow
//! - catalog: ReferenceEntry, ReferenceLink, ReferenceCatalog
//! - path: Categorisation, PathStep, ReasonPath + resolution
//! - status: AuthorisationStatus, OccurrenceStatus + derivation
//! - authorisation / occurrence / movement: the entity hierarchy
//! - audit: AuditFact, FieldChange
//! - event: DomainEvent, EventEnvelope
//! - context: OpContext

pub mod audit;
pub mod authorisation;
pub mod catalog;
pub mod context;
pub mod domain;
pub mod error;
pub mod event;
pub mod identity;
pub mod movement;
pub mod occurrence;
pub mod path;
pub mod status;
pub mod time;

pub use audit::{AuditAction, AuditFact, FieldChange, FieldSummary, diff_summaries};
pub use authorisation::Authorisation;
pub use catalog::{ReferenceCatalog, ReferenceEntry, ReferenceLink};
pub use context::OpContext;
pub use domain::{ChangeSource, Direction, EntityKind, RefDomain};
pub use error::{
    CategorisationNotFound, CoreError, IdentityMismatch, InvalidId, InvalidStateTransition,
    NotFound, ValidationFailure,
};
pub use event::{DomainEvent, EventEnvelope};
pub use identity::{
    ActorId, AuthorisationId, EntryCode, LegacyId, MovementId, OccurrenceId, PrisonCode, SubjectId,
};
pub use movement::Movement;
pub use occurrence::Occurrence;
pub use path::{Categorisation, PathStep, ReasonPath, resolve_path};
pub use status::{AuthorisationStatus, OccurrenceStatus, derive_occurrence_status};
pub use time::{DateRange, TimeWindow};
