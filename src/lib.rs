#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::core::{
    ActorId, AuditAction, AuditFact, Authorisation, AuthorisationId, AuthorisationStatus,
    Categorisation, ChangeSource, CoreError, DateRange, Direction, DomainEvent, EntityKind,
    EntryCode, EventEnvelope, FieldChange, LegacyId, Movement, MovementId, Occurrence,
    OccurrenceId, OccurrenceStatus, OpContext, PathStep, PrisonCode, ReasonPath, RefDomain,
    ReferenceCatalog, ReferenceEntry, ReferenceLink, SubjectId, TimeWindow,
};
pub use crate::store::{
    ChangeSet, MemoryDirectory, MemoryStore, SubjectDirectory, SubjectRecords, SubjectStore,
};
pub use crate::sync::{AbsenceSnapshot, SyncOutcome, Synchroniser};
