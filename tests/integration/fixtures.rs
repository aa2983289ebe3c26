//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use furlough::store::SubjectSummary;
use furlough::{
    AbsenceSnapshot, ActorId, MemoryDirectory, OpContext, PrisonCode, ReferenceCatalog, SubjectId,
};
use time::OffsetDateTime;
use time::macros::datetime;

pub use furlough::store::{MemoryStore, SubjectStore};

pub const CATALOG_JSON: &str = r#"{
    "entries": [
        {"domain": "absence_type", "code": "SR", "description": "Standard ROTL", "sequence": 1},
        {"domain": "absence_type", "code": "PP", "description": "Police production", "sequence": 2},
        {"domain": "absence_sub_type", "code": "RDR", "description": "Resettlement day release", "sequence": 1},
        {"domain": "absence_sub_type", "code": "ROR", "description": "Resettlement overnight release", "sequence": 2},
        {"domain": "reason_category", "code": "PW", "description": "Paid work", "sequence": 1},
        {"domain": "reason_category", "code": "FB", "description": "Family bonds", "sequence": 2},
        {"domain": "absence_reason", "code": "R15", "description": "Paid work placement", "sequence": 1},
        {"domain": "absence_reason", "code": "R20", "description": "Training placement", "sequence": 2},
        {"domain": "absence_reason", "code": "C5", "description": "Compassionate visit", "sequence": 3},
        {"domain": "accompaniment", "code": "U", "description": "Unaccompanied", "sequence": 1},
        {"domain": "accompaniment", "code": "E", "description": "Escorted", "sequence": 2},
        {"domain": "transport", "code": "VAN", "description": "Prison van", "sequence": 1}
    ],
    "links": [
        {"fromDomain": "absence_type", "fromCode": "SR", "toDomain": "absence_sub_type", "toCode": "RDR"},
        {"fromDomain": "absence_type", "fromCode": "SR", "toDomain": "absence_sub_type", "toCode": "ROR"},
        {"fromDomain": "absence_sub_type", "fromCode": "RDR", "toDomain": "reason_category", "toCode": "PW"},
        {"fromDomain": "reason_category", "fromCode": "PW", "toDomain": "absence_reason", "toCode": "R15"},
        {"fromDomain": "reason_category", "fromCode": "PW", "toDomain": "absence_reason", "toCode": "R20"}
    ]
}"#;

pub fn catalog() -> ReferenceCatalog {
    ReferenceCatalog::from_json_str(CATALOG_JSON).unwrap()
}

pub fn subject_a() -> SubjectId {
    SubjectId::parse("A1234BC").unwrap()
}

pub fn subject_b() -> SubjectId {
    SubjectId::parse("B5678CD").unwrap()
}

pub fn directory() -> MemoryDirectory {
    let mut directory = MemoryDirectory::new();
    directory.insert(SubjectSummary {
        subject_id: subject_a(),
        prison_code: PrisonCode::parse("LEI").unwrap(),
    });
    directory.insert(SubjectSummary {
        subject_id: subject_b(),
        prison_code: PrisonCode::parse("WWI").unwrap(),
    });
    directory
}

pub fn ctx() -> OpContext {
    OpContext::legacy(ActorId::new("nomis-sync").unwrap())
}

/// Mid-absence-range reference instant used across the suites.
pub fn now() -> OffsetDateTime {
    datetime!(2026-03-05 12:00 UTC)
}

pub fn snap(value: serde_json::Value) -> AbsenceSnapshot {
    serde_json::from_value(value).unwrap()
}

/// One approved authorisation (SR/RDR, derived PW, reason R15) with a single
/// occurrence and an OUT movement already recorded.
pub fn basic_snapshot() -> AbsenceSnapshot {
    snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "SR", "subTypeCode": "RDR", "reasonCode": "R15"},
            "status": "APPROVED",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"},
            "accompaniment": "U",
            "comments": "work placement",
            "locations": ["Sheffield"],
            "occurrences": [{
                "legacyId": 201,
                "window": {"start": "2026-03-10T09:00:00Z", "end": "2026-03-10T17:00:00Z"},
                "location": "Sheffield",
                "movements": []
            }]
        }],
        "unscheduledMovements": []
    }))
}
