//! Domain enums
//!
//! RefDomain: which reference-data domain a coded entry belongs to
//! Direction: OUT or IN movement
//! EntityKind: the three persisted entity kinds
//! ChangeSource: where a mutation originated

use serde::{Deserialize, Serialize};

/// Reference-data domain.
///
/// A single tagged value per entry - domain-specific behaviour is expressed
/// through dispatch on this tag, never through one concrete type per domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefDomain {
    AbsenceType,
    AbsenceSubType,
    ReasonCategory,
    AbsenceReason,
    Accompaniment,
    Transport,
}

impl RefDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbsenceType => "absence_type",
            Self::AbsenceSubType => "absence_sub_type",
            Self::ReasonCategory => "reason_category",
            Self::AbsenceReason => "absence_reason",
            Self::Accompaniment => "accompaniment",
            Self::Transport => "transport",
        }
    }

    /// Canonical order of domains within a reason path.
    pub const PATH_ORDER: [RefDomain; 4] = [
        RefDomain::AbsenceType,
        RefDomain::AbsenceSubType,
        RefDomain::ReasonCategory,
        RefDomain::AbsenceReason,
    ];

    /// Position within the canonical path order, if this domain appears in it.
    pub fn path_position(&self) -> Option<usize> {
        Self::PATH_ORDER.iter().position(|d| d == self)
    }
}

impl std::fmt::Display for RefDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recorded physical movement direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::In => "in",
        }
    }
}

/// The three persisted entity kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Authorisation,
    Occurrence,
    Movement,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorisation => "authorisation",
            Self::Occurrence => "occurrence",
            Self::Movement => "movement",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a mutation originated. Threaded through audit and event facts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// Pushed by the legacy system of record (migrate/resync/single sync).
    Legacy,
    /// Authored locally through an explicit action.
    Local,
}

impl ChangeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Local => "local",
        }
    }
}
