//! Identity atoms
//!
//! SubjectId: the supervised person, as known to the custody estate
//! ActorId: who performed an operation
//! PrisonCode: establishment code
//! AuthorisationId / OccurrenceId / MovementId: durable intra-system keys
//! LegacyId: durable cross-system key assigned by the system of record
//! EntryCode: coded reference-data value within a domain

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{CoreError, InvalidId};

/// Subject identifier - uppercase alphanumeric, non-empty.
///
/// The format is owned by the custody estate (e.g. `A1234BC`); we only
/// canonicalise case and reject anything non-alphanumeric.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let canonical = s.trim().to_ascii_uppercase();
        if canonical.is_empty() {
            return Err(InvalidId::Subject {
                raw: s.to_string(),
                reason: "empty".into(),
            }
            .into());
        }
        if !canonical.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(InvalidId::Subject {
                raw: s.to_string(),
                reason: "contains non-alphanumeric character".into(),
            }
            .into());
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({:?})", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Actor identifier - non-empty string.
///
/// Callers name themselves. No validation beyond non-empty.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            Err(InvalidId::Actor {
                raw: s,
                reason: "empty".into(),
            }
            .into())
        } else {
            Ok(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({:?})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Establishment code - short uppercase alphanumeric.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrisonCode(String);

impl PrisonCode {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let canonical = s.trim().to_ascii_uppercase();
        if canonical.is_empty() {
            return Err(InvalidId::Prison {
                raw: s.to_string(),
                reason: "empty".into(),
            }
            .into());
        }
        if canonical.len() > 6 {
            return Err(InvalidId::Prison {
                raw: s.to_string(),
                reason: "longer than 6 characters".into(),
            }
            .into());
        }
        if !canonical.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(InvalidId::Prison {
                raw: s.to_string(),
                reason: "contains non-alphanumeric character".into(),
            }
            .into());
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrisonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrisonCode({:?})", self.0)
    }
}

impl fmt::Display for PrisonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coded reference-data value - uppercase alphanumeric plus underscore.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryCode(String);

impl EntryCode {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let canonical = s.trim().to_ascii_uppercase();
        if canonical.is_empty() {
            return Err(InvalidId::Entry {
                raw: s.to_string(),
                reason: "empty".into(),
            }
            .into());
        }
        if !canonical
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(InvalidId::Entry {
                raw: s.to_string(),
                reason: "contains invalid character".into(),
            }
            .into());
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryCode({:?})", self.0)
    }
}

impl fmt::Display for EntryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the system of record. Unique per entity kind.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyId(i64);

impl LegacyId {
    pub fn new(n: i64) -> Result<Self, CoreError> {
        if n <= 0 {
            Err(InvalidId::Legacy {
                raw: n.to_string(),
                reason: "must be positive".into(),
            }
            .into())
        } else {
            Ok(Self(n))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LegacyId({})", self.0)
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh id. Only the engine creates new entities.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Durable intra-system key of an authorisation.
    AuthorisationId
}
uuid_id! {
    /// Durable intra-system key of an occurrence.
    OccurrenceId
}
uuid_id! {
    /// Durable intra-system key of a movement.
    MovementId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_canonicalises_case() {
        let id = SubjectId::parse("a1234bc").unwrap();
        assert_eq!(id.as_str(), "A1234BC");
    }

    #[test]
    fn subject_id_rejects_punctuation() {
        assert!(SubjectId::parse("A-1234").is_err());
        assert!(SubjectId::parse("").is_err());
    }

    #[test]
    fn legacy_id_must_be_positive() {
        assert!(LegacyId::new(0).is_err());
        assert!(LegacyId::new(-4).is_err());
        assert_eq!(LegacyId::new(42).unwrap().value(), 42);
    }

    #[test]
    fn entry_code_allows_underscore() {
        let code = EntryCode::parse("pw_r15").unwrap();
        assert_eq!(code.as_str(), "PW_R15");
    }
}
