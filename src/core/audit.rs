//! Audit facts
//!
//! An explicit before/after field diff appended by the engine at the point
//! of each mutation. Decoupled from storage versioning; an empty diff means
//! no fact is appended at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::context::OpContext;
use super::domain::{ChangeSource, EntityKind};
use super::identity::ActorId;

/// Flat string view of an entity's fields, keyed by field name.
pub type FieldSummary = BTreeMap<&'static str, String>;

/// One changed field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Diff two summaries. Returns the changes in field-name order.
pub fn diff_summaries(before: &FieldSummary, after: &FieldSummary) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for (field, old) in before {
        match after.get(field) {
            Some(new) if new == old => {}
            Some(new) => changes.push(FieldChange {
                field: field.to_string(),
                before: Some(old.clone()),
                after: Some(new.clone()),
            }),
            None => changes.push(FieldChange {
                field: field.to_string(),
                before: Some(old.clone()),
                after: None,
            }),
        }
    }
    for (field, new) in after {
        if !before.contains_key(field) {
            changes.push(FieldChange {
                field: field.to_string(),
                before: None,
                after: Some(new.clone()),
            });
        }
    }
    changes.sort_by(|a, b| a.field.cmp(&b.field));
    changes
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// One appended audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFact {
    pub entity: EntityKind,
    pub entity_id: String,
    pub action: AuditAction,
    pub changes: Vec<FieldChange>,
    pub actor: ActorId,
    pub reason: Option<String>,
    pub source: ChangeSource,
    pub recorded_at: OffsetDateTime,
}

impl AuditFact {
    pub fn created(
        ctx: &OpContext,
        entity: EntityKind,
        entity_id: String,
        after: &FieldSummary,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            entity,
            entity_id,
            action: AuditAction::Created,
            changes: diff_summaries(&FieldSummary::new(), after),
            actor: ctx.actor.clone(),
            reason: ctx.reason.clone(),
            source: ctx.source,
            recorded_at: now,
        }
    }

    /// None when nothing changed - a no-op update appends no fact.
    pub fn updated(
        ctx: &OpContext,
        entity: EntityKind,
        entity_id: String,
        before: &FieldSummary,
        after: &FieldSummary,
        now: OffsetDateTime,
    ) -> Option<Self> {
        let changes = diff_summaries(before, after);
        if changes.is_empty() {
            return None;
        }
        Some(Self {
            entity,
            entity_id,
            action: AuditAction::Updated,
            changes,
            actor: ctx.actor.clone(),
            reason: ctx.reason.clone(),
            source: ctx.source,
            recorded_at: now,
        })
    }

    pub fn deleted(
        ctx: &OpContext,
        entity: EntityKind,
        entity_id: String,
        before: &FieldSummary,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            entity,
            entity_id,
            action: AuditAction::Deleted,
            changes: diff_summaries(before, &FieldSummary::new()),
            actor: ctx.actor.clone(),
            reason: ctx.reason.clone(),
            source: ctx.source,
            recorded_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_summaries_diff_empty() {
        let mut summary = FieldSummary::new();
        summary.insert("status", "approved".into());
        assert!(diff_summaries(&summary, &summary.clone()).is_empty());
    }

    #[test]
    fn diff_reports_added_removed_and_changed() {
        let mut before = FieldSummary::new();
        before.insert("status", "pending".into());
        before.insert("comments", "keep".into());
        before.insert("location", "library".into());

        let mut after = FieldSummary::new();
        after.insert("status", "approved".into());
        after.insert("comments", "keep".into());
        after.insert("contact", "0114".into());

        let changes = diff_summaries(&before, &after);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].field, "contact");
        assert_eq!(changes[0].before, None);
        assert_eq!(changes[1].field, "location");
        assert_eq!(changes[1].after, None);
        assert_eq!(changes[2].field, "status");
        assert_eq!(changes[2].after.as_deref(), Some("approved"));
    }
}
