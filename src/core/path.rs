//! Reason-path resolution
//!
//! Resolves a partial categorisation (type, sub-type, reason-category,
//! reason - all optional) into the authoritative ordered path, deriving the
//! reason-category from link records when it is not given explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::ReferenceCatalog;
use super::domain::RefDomain;
use super::error::CoreError;
use super::identity::EntryCode;

/// Partial categorisation as requested or stored on an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorisation {
    pub absence_type: Option<EntryCode>,
    pub absence_sub_type: Option<EntryCode>,
    pub reason_category: Option<EntryCode>,
    pub reason: Option<EntryCode>,
}

impl Categorisation {
    pub fn is_empty(&self) -> bool {
        self.absence_type.is_none()
            && self.absence_sub_type.is_none()
            && self.reason_category.is_none()
            && self.reason.is_none()
    }

    fn code(&self, domain: RefDomain) -> Option<&EntryCode> {
        match domain {
            RefDomain::AbsenceType => self.absence_type.as_ref(),
            RefDomain::AbsenceSubType => self.absence_sub_type.as_ref(),
            RefDomain::ReasonCategory => self.reason_category.as_ref(),
            RefDomain::AbsenceReason => self.reason.as_ref(),
            _ => None,
        }
    }
}

/// One resolved step: a domain-tagged code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub domain: RefDomain,
    pub code: EntryCode,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.code)
    }
}

/// Ordered, domain-tagged categorisation path, length 0-4.
///
/// INVARIANT: domains appear in canonical order (type, sub-type,
/// reason-category, reason), each at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasonPath(Vec<PathStep>);

impl ReasonPath {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build from steps, enforcing canonical order and uniqueness.
    pub fn from_steps(steps: Vec<PathStep>) -> Result<Self, CoreError> {
        let mut last: Option<usize> = None;
        for step in &steps {
            let pos = step.domain.path_position().ok_or_else(|| {
                super::error::ValidationFailure {
                    field: "reason_path",
                    reason: format!("domain {} cannot appear in a path", step.domain),
                }
            })?;
            if let Some(prev) = last
                && pos <= prev
            {
                return Err(super::error::ValidationFailure {
                    field: "reason_path",
                    reason: format!("domain {} out of canonical order", step.domain),
                }
                .into());
            }
            last = Some(pos);
        }
        Ok(Self(steps))
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn code(&self, domain: RefDomain) -> Option<&EntryCode> {
        self.0
            .iter()
            .find(|step| step.domain == domain)
            .map(|step| &step.code)
    }

    /// Re-express the path as a categorisation request.
    pub fn to_categorisation(&self) -> Categorisation {
        Categorisation {
            absence_type: self.code(RefDomain::AbsenceType).cloned(),
            absence_sub_type: self.code(RefDomain::AbsenceSubType).cloned(),
            reason_category: self.code(RefDomain::ReasonCategory).cloned(),
            reason: self.code(RefDomain::AbsenceReason).cloned(),
        }
    }
}

impl fmt::Display for ReasonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.0 {
            if !first {
                write!(f, ">")?;
            }
            write!(f, "{step}")?;
            first = false;
        }
        Ok(())
    }
}

/// Resolve a partial categorisation into the authoritative path.
///
/// 1. Every requested code must exist in its domain.
/// 2. A missing reason-category is derived: from the sub-type's links when
///    they name exactly one category, otherwise from the reason's upstream
///    links when they name exactly one. Ambiguity means "no category".
/// 3. The path carries: the type (if present); the sub-type (if present and
///    implied by the type); the category (explicit or derived); the reason
///    only when the category links into the reason domain for it, or as the
///    bare-reason fallback when nothing else resolved.
pub fn resolve_path(
    requested: &Categorisation,
    catalog: &ReferenceCatalog,
) -> Result<ReasonPath, CoreError> {
    for domain in RefDomain::PATH_ORDER {
        if let Some(code) = requested.code(domain) {
            catalog.require(domain, code)?;
        }
    }

    // Explicit category wins over any link derivation.
    let category = match &requested.reason_category {
        Some(explicit) => Some(explicit.clone()),
        None => derive_category(requested, catalog),
    };

    let mut steps = Vec::with_capacity(4);
    if let Some(absence_type) = &requested.absence_type {
        steps.push(PathStep {
            domain: RefDomain::AbsenceType,
            code: absence_type.clone(),
        });
        if let Some(sub_type) = &requested.absence_sub_type
            && catalog
                .linked(RefDomain::AbsenceType, absence_type, RefDomain::AbsenceSubType)
                .contains(sub_type)
        {
            steps.push(PathStep {
                domain: RefDomain::AbsenceSubType,
                code: sub_type.clone(),
            });
        }
    }
    if let Some(category) = &category {
        steps.push(PathStep {
            domain: RefDomain::ReasonCategory,
            code: category.clone(),
        });
    }
    if let Some(reason) = &requested.reason {
        let category_carries_reason = category.as_ref().is_some_and(|category| {
            catalog
                .linked(RefDomain::ReasonCategory, category, RefDomain::AbsenceReason)
                .contains(reason)
        });
        // Bare-reason fallback: absence of any structured category still
        // yields a minimal reason-only path.
        if category_carries_reason || steps.is_empty() {
            steps.push(PathStep {
                domain: RefDomain::AbsenceReason,
                code: reason.clone(),
            });
        }
    }

    ReasonPath::from_steps(steps)
}

/// Derive a reason-category when none was requested.
///
/// Exactly-one is the bar everywhere: multiple candidate derivations are
/// treated as "no category resolved", never tie-broken.
fn derive_category(
    requested: &Categorisation,
    catalog: &ReferenceCatalog,
) -> Option<EntryCode> {
    if let Some(sub_type) = &requested.absence_sub_type {
        let candidates =
            catalog.linked(RefDomain::AbsenceSubType, sub_type, RefDomain::ReasonCategory);
        if candidates.len() == 1 {
            return Some(candidates[0].clone());
        }
    }
    if let Some(reason) = &requested.reason {
        let upstream =
            catalog.linked_from(RefDomain::ReasonCategory, RefDomain::AbsenceReason, reason);
        if upstream.len() == 1 {
            return Some(upstream[0].clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{ReferenceEntry, ReferenceLink};

    fn code(s: &str) -> EntryCode {
        EntryCode::parse(s).unwrap()
    }

    fn fixture_catalog() -> ReferenceCatalog {
        let mut catalog = ReferenceCatalog::new();
        let entries = [
            (RefDomain::AbsenceType, "SR"),
            (RefDomain::AbsenceType, "PP"),
            (RefDomain::AbsenceSubType, "RDR"),
            (RefDomain::AbsenceSubType, "ROR"),
            (RefDomain::ReasonCategory, "PW"),
            (RefDomain::ReasonCategory, "FB"),
            (RefDomain::AbsenceReason, "R15"),
            (RefDomain::AbsenceReason, "R20"),
            (RefDomain::AbsenceReason, "C5"),
        ];
        for (domain, c) in entries {
            catalog.insert_entry(ReferenceEntry {
                domain,
                code: code(c),
                description: c.to_string(),
                sequence: 0,
                active: true,
            });
        }
        let links = [
            (RefDomain::AbsenceType, "SR", RefDomain::AbsenceSubType, "RDR"),
            (RefDomain::AbsenceType, "SR", RefDomain::AbsenceSubType, "ROR"),
            (RefDomain::AbsenceSubType, "RDR", RefDomain::ReasonCategory, "PW"),
            (RefDomain::ReasonCategory, "PW", RefDomain::AbsenceReason, "R15"),
            (RefDomain::ReasonCategory, "PW", RefDomain::AbsenceReason, "R20"),
        ];
        for (fd, fc, td, tc) in links {
            catalog
                .insert_link(ReferenceLink {
                    from_domain: fd,
                    from_code: code(fc),
                    to_domain: td,
                    to_code: code(tc),
                })
                .unwrap();
        }
        catalog
    }

    fn requested(
        absence_type: Option<&str>,
        sub_type: Option<&str>,
        category: Option<&str>,
        reason: Option<&str>,
    ) -> Categorisation {
        Categorisation {
            absence_type: absence_type.map(code),
            absence_sub_type: sub_type.map(code),
            reason_category: category.map(code),
            reason: reason.map(code),
        }
    }

    #[test]
    fn derives_category_from_sub_type_link() {
        let catalog = fixture_catalog();
        let path = resolve_path(
            &requested(Some("SR"), Some("RDR"), None, Some("R15")),
            &catalog,
        )
        .unwrap();
        let rendered: Vec<String> = path.steps().iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "absence_type:SR",
                "absence_sub_type:RDR",
                "reason_category:PW",
                "absence_reason:R15",
            ]
        );
    }

    #[test]
    fn type_only_when_no_single_derivable_link() {
        let catalog = fixture_catalog();
        let path = resolve_path(&requested(Some("PP"), None, None, None), &catalog).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(
            path.code(RefDomain::AbsenceType).unwrap().as_str(),
            "PP"
        );
    }

    #[test]
    fn unknown_code_fails() {
        let catalog = fixture_catalog();
        let err = resolve_path(&requested(Some("XX"), None, None, None), &catalog).unwrap_err();
        assert!(matches!(err, CoreError::CategorisationNotFound(_)));
    }

    #[test]
    fn bare_reason_yields_length_one_path() {
        let catalog = fixture_catalog();
        // C5 has no upstream category link, so nothing structured resolves.
        let path = resolve_path(&requested(None, None, None, Some("C5")), &catalog).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(
            path.code(RefDomain::AbsenceReason).unwrap().as_str(),
            "C5"
        );
    }

    #[test]
    fn reason_upstream_links_derive_category() {
        let catalog = fixture_catalog();
        // R15 is linked from PW only, so the category is derivable from the
        // reason alone.
        let path = resolve_path(&requested(None, None, None, Some("R15")), &catalog).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(
            path.code(RefDomain::ReasonCategory).unwrap().as_str(),
            "PW"
        );
        assert_eq!(
            path.code(RefDomain::AbsenceReason).unwrap().as_str(),
            "R15"
        );
    }

    #[test]
    fn explicit_category_beats_link_derivation() {
        let catalog = fixture_catalog();
        let path = resolve_path(
            &requested(Some("SR"), Some("RDR"), Some("FB"), None),
            &catalog,
        )
        .unwrap();
        assert_eq!(
            path.code(RefDomain::ReasonCategory).unwrap().as_str(),
            "FB"
        );
    }

    #[test]
    fn sub_type_not_implied_by_type_is_dropped() {
        let catalog = fixture_catalog();
        // PP has no sub-type links, so RDR is not part of its authoritative path.
        let path = resolve_path(&requested(Some("PP"), Some("RDR"), None, None), &catalog).unwrap();
        assert!(path.code(RefDomain::AbsenceSubType).is_none());
    }

    #[test]
    fn resolution_is_idempotent() {
        let catalog = fixture_catalog();
        let first = resolve_path(
            &requested(Some("SR"), Some("RDR"), None, Some("R15")),
            &catalog,
        )
        .unwrap();
        let second = resolve_path(&first.to_categorisation(), &catalog).unwrap();
        assert_eq!(first, second);
    }
}
