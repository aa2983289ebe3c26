//! Core capability errors (identity parsing, validation, lifecycle refusals).
//!
//! These are bounded and stable: core errors represent domain/refusal states,
//! not library implementation details. Every one of them aborts only the
//! current unit of work and is reportable to the caller by kind.

use thiserror::Error;

use crate::error::{Effect, Transience};

use super::domain::{EntityKind, RefDomain};

/// Invalid identifier string.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum InvalidId {
    #[error("subject id `{raw}` is invalid: {reason}")]
    Subject { raw: String, reason: String },
    #[error("actor id `{raw}` is invalid: {reason}")]
    Actor { raw: String, reason: String },
    #[error("prison code `{raw}` is invalid: {reason}")]
    Prison { raw: String, reason: String },
    #[error("entry code `{raw}` is invalid: {reason}")]
    Entry { raw: String, reason: String },
    #[error("legacy id `{raw}` is invalid: {reason}")]
    Legacy { raw: String, reason: String },
}

/// Referenced subject or entity absent from the store or directory.
#[derive(Debug, Error, Clone)]
#[error("{kind} `{id}` not found")]
pub struct NotFound {
    pub kind: &'static str,
    pub id: String,
}

impl NotFound {
    pub fn subject(id: impl Into<String>) -> Self {
        Self {
            kind: "subject",
            id: id.into(),
        }
    }

    pub fn entity(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str(),
            id: id.into(),
        }
    }
}

/// Unknown code in a requested categorisation domain.
#[derive(Debug, Error, Clone)]
#[error("no `{domain}` entry with code `{code}`")]
pub struct CategorisationNotFound {
    pub domain: RefDomain,
    pub code: String,
}

/// Action attempted from a state that forbids it. A conflict, not a crash.
#[derive(Debug, Error, Clone)]
#[error("cannot {action} {entity} in state {from}: {reason}")]
pub struct InvalidStateTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub action: &'static str,
    pub reason: String,
}

/// Operation references an id not owned by the stated subject.
#[derive(Debug, Error, Clone)]
#[error("{kind} `{id}` does not belong to subject `{subject}`")]
pub struct IdentityMismatch {
    pub kind: &'static str,
    pub id: String,
    pub subject: String,
}

/// Structurally invalid input (e.g. inverted date range).
#[derive(Debug, Error, Clone)]
#[error("invalid {field}: {reason}")]
pub struct ValidationFailure {
    pub field: &'static str,
    pub reason: String,
}

/// Canonical error enum for the core capability.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    CategorisationNotFound(#[from] CategorisationNotFound),
    #[error(transparent)]
    InvalidStateTransition(#[from] InvalidStateTransition),
    #[error(transparent)]
    IdentityMismatch(#[from] IdentityMismatch),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        // Core errors are pure domain/input failures.
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
