//! End-to-end reconciliation suites against the in-memory store.

#[path = "integration/fixtures.rs"]
mod fixtures;

use fixtures::{MemoryStore, SubjectStore, basic_snapshot, catalog, ctx, directory, now, snap, subject_a, subject_b};
use furlough::core::{CoreError, NotFound};
use furlough::sync::{AuthorisationAction, SyncError, TransferSelection};
use furlough::{AuthorisationStatus, DomainEvent, OccurrenceStatus, SubjectId, Synchroniser};
use time::macros::datetime;

#[test]
fn resync_builds_hierarchy_and_resolves_categorisation() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let outcome = sync
        .resync(&ctx(), &subject_a(), &basic_snapshot(), now())
        .unwrap();

    assert_eq!(outcome.records.authorisations.len(), 1);
    let auth = &outcome.records.authorisations[0];
    assert_eq!(auth.status, AuthorisationStatus::Approved);
    assert_eq!(
        auth.reason_path.to_string(),
        "absence_type:SR>absence_sub_type:RDR>reason_category:PW>absence_reason:R15"
    );

    assert_eq!(outcome.records.occurrences.len(), 1);
    assert_eq!(
        outcome.records.occurrences[0].status,
        OccurrenceStatus::Scheduled
    );

    assert_eq!(outcome.created(), 2);
    assert!(outcome.events.iter().any(|e| matches!(
        e.event,
        DomainEvent::AuthorisationCreated { .. }
    )));
    assert!(!outcome.events.iter().any(|e| e.published));
}

#[test]
fn merge_is_idempotent() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    sync.resync(&ctx(), &subject_a(), &basic_snapshot(), now())
        .unwrap();
    let second = sync
        .resync(&ctx(), &subject_a(), &basic_snapshot(), now())
        .unwrap();

    assert!(second.is_noop(), "identical resync must append nothing");
    assert_eq!(second.records.authorisations.len(), 1);
}

#[test]
fn migrate_marks_events_published() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let outcome = sync
        .migrate(&ctx(), &subject_a(), &basic_snapshot(), now())
        .unwrap();
    assert!(!outcome.events.is_empty());
    assert!(outcome.events.iter().all(|e| e.published));

    drop(sync);
    assert!(store.drain_unpublished_events().is_empty());
}

#[test]
fn migrate_then_merge_matches_single_migrate() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let migrated = sync
        .migrate(&ctx(), &subject_a(), &basic_snapshot(), now())
        .unwrap();
    let merged = sync
        .resync(&ctx(), &subject_a(), &basic_snapshot(), now())
        .unwrap();

    assert!(merged.is_noop());
    assert_eq!(migrated.records, merged.records);
}

#[test]
fn merge_deletion_cascades() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let seeded = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "SR", "subTypeCode": "RDR", "reasonCode": "R15"},
            "status": "APPROVED",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"},
            "occurrences": [{
                "legacyId": 201,
                "window": {"start": "2026-03-02T09:00:00Z", "end": "2026-03-02T17:00:00Z"},
                "movements": [
                    {"legacyId": 301, "direction": "OUT", "occurredAt": "2026-03-02T09:05:00Z"},
                    {"legacyId": 302, "direction": "IN", "occurredAt": "2026-03-02T16:30:00Z"}
                ]
            }]
        }]
    }));
    sync.resync(&ctx(), &subject_a(), &seeded, now()).unwrap();

    let emptied = sync
        .resync(&ctx(), &subject_a(), &snap(serde_json::json!({})), now())
        .unwrap();

    assert!(emptied.records.is_empty());
    assert_eq!(emptied.deleted(), 4);
    assert!(emptied.events.iter().any(|e| matches!(
        e.event,
        DomainEvent::MovementDeleted { .. }
    )));
}

#[test]
fn movement_moves_to_unscheduled_without_recreation() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);
    let later = datetime!(2026-03-12 08:00 UTC);

    let scheduled = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "SR", "subTypeCode": "RDR", "reasonCode": "R15"},
            "status": "APPROVED",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"},
            "occurrences": [{
                "legacyId": 201,
                "window": {"start": "2026-03-10T09:00:00Z", "end": "2026-03-10T17:00:00Z"},
                "movements": [
                    {"legacyId": 301, "direction": "OUT", "occurredAt": "2026-03-10T09:05:00Z"}
                ]
            }]
        }]
    }));
    let first = sync.resync(&ctx(), &subject_a(), &scheduled, later).unwrap();
    let movement_id = first.records.movements[0].id;
    assert_eq!(first.records.occurrences[0].status, OccurrenceStatus::Overdue);

    let rehomed = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "SR", "subTypeCode": "RDR", "reasonCode": "R15"},
            "status": "APPROVED",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"},
            "occurrences": [{
                "legacyId": 201,
                "window": {"start": "2026-03-10T09:00:00Z", "end": "2026-03-10T17:00:00Z"},
                "movements": []
            }]
        }],
        "unscheduledMovements": [
            {"legacyId": 301, "direction": "OUT", "occurredAt": "2026-03-10T09:05:00Z"}
        ]
    }));
    let second = sync.resync(&ctx(), &subject_a(), &rehomed, later).unwrap();

    let movement = &second.records.movements[0];
    assert_eq!(movement.id, movement_id, "identity must survive reassignment");
    assert!(movement.is_unscheduled());
    assert!(second.events.iter().any(|e| matches!(
        e.event,
        DomainEvent::MovementReassigned { to_occurrence: None, .. }
    )));
    assert!(!second.events.iter().any(|e| matches!(
        e.event,
        DomainEvent::MovementRecorded { .. } | DomainEvent::MovementDeleted { .. }
    )));
    // Vacated occurrence re-derives from its (now empty) movement set.
    assert_eq!(second.records.occurrences[0].status, OccurrenceStatus::Expired);

    let third = sync.resync(&ctx(), &subject_a(), &rehomed, later).unwrap();
    assert!(third.is_noop());
}

#[test]
fn approving_past_authorisation_is_a_conflict() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let pending = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "PP"},
            "status": "PENDING",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"}
        }]
    }));
    let outcome = sync.resync(&ctx(), &subject_a(), &pending, now()).unwrap();
    let auth_id = outcome.records.authorisations[0].id;

    let err = sync
        .act(
            &ctx(),
            auth_id,
            AuthorisationAction::Approve,
            datetime!(2026-04-05 09:00 UTC),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Core(CoreError::InvalidStateTransition(_))
    ));

    // The refused action left no trace.
    let unchanged = sync
        .resync(&ctx(), &subject_a(), &pending, now())
        .unwrap();
    assert_eq!(
        unchanged.records.authorisations[0].status,
        AuthorisationStatus::Pending
    );
}

#[test]
fn approve_cascades_occurrence_recompute() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let pending = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "SR", "subTypeCode": "RDR"},
            "status": "PENDING",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"},
            "occurrences": [{
                "legacyId": 201,
                "window": {"start": "2026-03-10T09:00:00Z", "end": "2026-03-10T17:00:00Z"}
            }]
        }]
    }));
    let outcome = sync.resync(&ctx(), &subject_a(), &pending, now()).unwrap();
    assert_eq!(
        outcome.records.occurrences[0].status,
        OccurrenceStatus::Pending
    );
    let auth_id = outcome.records.authorisations[0].id;

    let approved = sync
        .act(&ctx(), auth_id, AuthorisationAction::Approve, now())
        .unwrap();
    assert_eq!(
        approved.records.authorisations[0].status,
        AuthorisationStatus::Approved
    );
    assert_eq!(
        approved.records.occurrences[0].status,
        OccurrenceStatus::Scheduled
    );
    assert!(approved.events.iter().any(|e| matches!(
        e.event,
        DomainEvent::AuthorisationStatusChanged { to: AuthorisationStatus::Approved, .. }
    )));
    assert!(approved.events.iter().any(|e| matches!(
        e.event,
        DomainEvent::OccurrenceStatusChanged { to: OccurrenceStatus::Scheduled, .. }
    )));
}

#[test]
fn sweep_expires_elapsed_windows_and_pending_ranges() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    sync.resync(&ctx(), &subject_a(), &basic_snapshot(), now())
        .unwrap();
    let pending = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 102,
            "categorisation": {"typeCode": "PP"},
            "status": "PENDING",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-20"}
        }]
    }));
    sync.resync(&ctx(), &subject_b(), &pending, now()).unwrap();

    let swept = sync.sweep(&ctx(), datetime!(2026-04-02 03:00 UTC)).unwrap();
    assert!(!swept.is_noop());

    drop(sync);
    let records_a = store.load_subject(&subject_a()).unwrap();
    assert_eq!(records_a.occurrences[0].status, OccurrenceStatus::Expired);
    let records_b = store.load_subject(&subject_b()).unwrap();
    assert_eq!(
        records_b.authorisations[0].status,
        AuthorisationStatus::Expired
    );
}

#[test]
fn unknown_categorisation_aborts_whole_snapshot() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let tainted = snap(serde_json::json!({
        "authorisations": [
            {
                "legacyId": 101,
                "categorisation": {"typeCode": "SR", "subTypeCode": "RDR"},
                "status": "APPROVED",
                "dateRange": {"start": "2026-03-01", "end": "2026-03-31"}
            },
            {
                "legacyId": 102,
                "categorisation": {"typeCode": "XX"},
                "status": "APPROVED",
                "dateRange": {"start": "2026-03-01", "end": "2026-03-31"}
            }
        ]
    }));
    let err = sync.resync(&ctx(), &subject_a(), &tainted, now()).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Core(CoreError::CategorisationNotFound(_))
    ));

    drop(sync);
    assert!(store.load_subject(&subject_a()).unwrap().is_empty());
    assert_eq!(store.audit_fact_count(), 0);
}

#[test]
fn unknown_subject_is_not_found() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let ghost = SubjectId::parse("Z9999ZZ").unwrap();
    let err = sync
        .resync(&ctx(), &ghost, &basic_snapshot(), now())
        .unwrap_err();
    assert!(matches!(err, SyncError::Core(CoreError::NotFound(NotFound { kind: "subject", .. }))));
}

#[test]
fn occurrence_window_must_fall_inside_range() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let outlier = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "PP"},
            "status": "APPROVED",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"},
            "occurrences": [{
                "legacyId": 201,
                "window": {"start": "2026-04-02T09:00:00Z", "end": "2026-04-02T17:00:00Z"}
            }]
        }]
    }));
    let err = sync.resync(&ctx(), &subject_a(), &outlier, now()).unwrap_err();
    assert!(matches!(err, SyncError::Core(CoreError::Validation(_))));
}

#[test]
fn transfer_moves_subtrees_between_subjects() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let seeded = snap(serde_json::json!({
        "authorisations": [{
            "legacyId": 101,
            "categorisation": {"typeCode": "SR", "subTypeCode": "RDR", "reasonCode": "R15"},
            "status": "APPROVED",
            "dateRange": {"start": "2026-03-01", "end": "2026-03-31"},
            "occurrences": [{
                "legacyId": 201,
                "window": {"start": "2026-03-02T09:00:00Z", "end": "2026-03-02T17:00:00Z"},
                "movements": [
                    {"legacyId": 301, "direction": "OUT", "occurredAt": "2026-03-02T09:05:00Z"}
                ]
            }]
        }],
        "unscheduledMovements": [
            {"legacyId": 401, "direction": "IN", "occurredAt": "2026-03-03T20:00:00Z"}
        ]
    }));
    let outcome = sync.resync(&ctx(), &subject_a(), &seeded, now()).unwrap();
    let auth_id = outcome.records.authorisations[0].id;
    let stray_id = outcome
        .records
        .unscheduled_movements()
        .next()
        .unwrap()
        .id;

    let selection = TransferSelection {
        authorisation_ids: vec![auth_id],
        unscheduled_movement_ids: vec![stray_id],
    };
    let transferred = sync
        .transfer(&ctx(), &subject_a(), &subject_b(), &selection, now())
        .unwrap();

    assert_eq!(transferred.records.authorisations.len(), 1);
    assert_eq!(transferred.records.movements.len(), 2);
    assert!(
        transferred
            .records
            .movements
            .iter()
            .all(|m| m.subject_id == subject_b())
    );
    assert!(transferred.events.iter().any(|e| matches!(
        e.event,
        DomainEvent::AuthorisationTransferred { .. }
    )));

    drop(sync);
    assert!(store.load_subject(&subject_a()).unwrap().is_empty());
}

#[test]
fn transfer_rejects_foreign_ids() {
    let catalog = catalog();
    let directory = directory();
    let mut store = MemoryStore::new();
    let mut sync = Synchroniser::new(&mut store, &directory, &catalog);

    let outcome = sync
        .resync(&ctx(), &subject_b(), &basic_snapshot(), now())
        .unwrap();
    let foreign_auth = outcome.records.authorisations[0].id;

    let selection = TransferSelection {
        authorisation_ids: vec![foreign_auth],
        unscheduled_movement_ids: vec![],
    };
    let err = sync
        .transfer(&ctx(), &subject_a(), &subject_b(), &selection, now())
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Core(CoreError::IdentityMismatch(_))
    ));
}
