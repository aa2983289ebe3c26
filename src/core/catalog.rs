//! Reference catalog
//!
//! Coded lookup entries per domain plus directed link records expressing
//! "entry X in domain A implies entry Y in domain B". Loaded once per
//! operation and treated as an immutable snapshot for its duration.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::domain::RefDomain;
use super::error::{CategorisationNotFound, CoreError, ValidationFailure};
use super::identity::EntryCode;

/// One coded lookup entry. Immutable once loaded for a reconciliation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub domain: RefDomain,
    pub code: EntryCode,
    pub description: String,
    pub sequence: u32,
    pub active: bool,
}

/// Directed edge between two entries, tagged by the target domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub from_domain: RefDomain,
    pub from_code: EntryCode,
    pub to_domain: RefDomain,
    pub to_code: EntryCode,
}

type EntryKey = (RefDomain, EntryCode);

/// Queryable set of entries and links.
#[derive(Clone, Debug, Default)]
pub struct ReferenceCatalog {
    entries: BTreeMap<EntryKey, ReferenceEntry>,
    /// (from, target-domain) -> target codes, insertion order preserved.
    links: BTreeMap<(EntryKey, RefDomain), Vec<EntryCode>>,
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Replaces any previous entry with the same key.
    pub fn insert_entry(&mut self, entry: ReferenceEntry) {
        self.entries
            .insert((entry.domain, entry.code.clone()), entry);
    }

    /// Insert a link. Both endpoints must already be present.
    pub fn insert_link(&mut self, link: ReferenceLink) -> Result<(), CoreError> {
        let from = (link.from_domain, link.from_code.clone());
        if !self.entries.contains_key(&from) {
            return Err(CategorisationNotFound {
                domain: link.from_domain,
                code: link.from_code.to_string(),
            }
            .into());
        }
        if !self
            .entries
            .contains_key(&(link.to_domain, link.to_code.clone()))
        {
            return Err(CategorisationNotFound {
                domain: link.to_domain,
                code: link.to_code.to_string(),
            }
            .into());
        }
        let targets = self.links.entry((from, link.to_domain)).or_default();
        if !targets.contains(&link.to_code) {
            targets.push(link.to_code);
        }
        Ok(())
    }

    pub fn get(&self, domain: RefDomain, code: &EntryCode) -> Option<&ReferenceEntry> {
        self.entries.get(&(domain, code.clone()))
    }

    /// Look up an entry, failing with `CategorisationNotFound` if absent.
    pub fn require(&self, domain: RefDomain, code: &EntryCode) -> Result<&ReferenceEntry, CoreError> {
        self.get(domain, code).ok_or_else(|| {
            CategorisationNotFound {
                domain,
                code: code.to_string(),
            }
            .into()
        })
    }

    /// Target codes of links from `(from_domain, from_code)` into `to_domain`.
    pub fn linked(
        &self,
        from_domain: RefDomain,
        from_code: &EntryCode,
        to_domain: RefDomain,
    ) -> &[EntryCode] {
        self.links
            .get(&((from_domain, from_code.clone()), to_domain))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Sources in `from_domain` that link to `(to_domain, to_code)`.
    ///
    /// Reverse walk of the link records; used for upstream derivation.
    pub fn linked_from(
        &self,
        from_domain: RefDomain,
        to_domain: RefDomain,
        to_code: &EntryCode,
    ) -> Vec<&EntryCode> {
        self.links
            .iter()
            .filter(|(((fd, _), td), targets)| {
                *fd == from_domain && *td == to_domain && targets.contains(to_code)
            })
            .map(|(((_, fc), _), _)| fc)
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Load a catalog from a JSON document on disk.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, CoreError> {
        let file = std::fs::File::open(path).map_err(|e| ValidationFailure {
            field: "catalog",
            reason: format!("cannot open {}: {e}", path.display()),
        })?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    /// Load a catalog from its JSON document form.
    pub fn from_json_reader(reader: impl Read) -> Result<Self, CoreError> {
        let file: CatalogFile = serde_json::from_reader(reader).map_err(|e| ValidationFailure {
            field: "catalog",
            reason: e.to_string(),
        })?;
        Self::from_file(file)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let file: CatalogFile = serde_json::from_str(json).map_err(|e| ValidationFailure {
            field: "catalog",
            reason: e.to_string(),
        })?;
        Self::from_file(file)
    }

    fn from_file(file: CatalogFile) -> Result<Self, CoreError> {
        let mut catalog = Self::new();
        for entry in file.entries {
            catalog.insert_entry(ReferenceEntry {
                domain: entry.domain,
                code: EntryCode::parse(&entry.code)?,
                description: entry.description,
                sequence: entry.sequence,
                active: entry.active,
            });
        }
        for link in file.links {
            catalog.insert_link(ReferenceLink {
                from_domain: link.from_domain,
                from_code: EntryCode::parse(&link.from_code)?,
                to_domain: link.to_domain,
                to_code: EntryCode::parse(&link.to_code)?,
            })?;
        }
        Ok(catalog)
    }
}

/// On-disk catalog document.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    entries: Vec<CatalogEntryIn>,
    #[serde(default)]
    links: Vec<CatalogLinkIn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntryIn {
    domain: RefDomain,
    code: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    sequence: u32,
    #[serde(default = "default_true")]
    active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogLinkIn {
    from_domain: RefDomain,
    from_code: String,
    to_domain: RefDomain,
    to_code: String,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(domain: RefDomain, code: &str) -> ReferenceEntry {
        ReferenceEntry {
            domain,
            code: EntryCode::parse(code).unwrap(),
            description: code.to_string(),
            sequence: 0,
            active: true,
        }
    }

    #[test]
    fn require_reports_domain_and_code() {
        let catalog = ReferenceCatalog::new();
        let err = catalog
            .require(RefDomain::AbsenceType, &EntryCode::parse("SR").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("SR"));
        assert!(err.to_string().contains("absence_type"));
    }

    #[test]
    fn link_endpoints_must_exist() {
        let mut catalog = ReferenceCatalog::new();
        catalog.insert_entry(entry(RefDomain::AbsenceSubType, "RDR"));
        let missing_target = catalog.insert_link(ReferenceLink {
            from_domain: RefDomain::AbsenceSubType,
            from_code: EntryCode::parse("RDR").unwrap(),
            to_domain: RefDomain::ReasonCategory,
            to_code: EntryCode::parse("PW").unwrap(),
        });
        assert!(missing_target.is_err());
    }

    #[test]
    fn linked_returns_targets_in_insertion_order() {
        let mut catalog = ReferenceCatalog::new();
        catalog.insert_entry(entry(RefDomain::AbsenceSubType, "RDR"));
        catalog.insert_entry(entry(RefDomain::ReasonCategory, "PW"));
        catalog.insert_entry(entry(RefDomain::ReasonCategory, "FB"));
        for code in ["PW", "FB"] {
            catalog
                .insert_link(ReferenceLink {
                    from_domain: RefDomain::AbsenceSubType,
                    from_code: EntryCode::parse("RDR").unwrap(),
                    to_domain: RefDomain::ReasonCategory,
                    to_code: EntryCode::parse(code).unwrap(),
                })
                .unwrap();
        }
        let rdr = EntryCode::parse("RDR").unwrap();
        let targets = catalog.linked(RefDomain::AbsenceSubType, &rdr, RefDomain::ReasonCategory);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].as_str(), "PW");
    }

    #[test]
    fn json_load_round_trip() {
        let json = r#"{
            "entries": [
                {"domain": "absence_type", "code": "SR", "description": "Standard ROTL", "sequence": 1},
                {"domain": "absence_sub_type", "code": "RDR", "description": "Resettlement day release", "sequence": 1}
            ],
            "links": [
                {"fromDomain": "absence_type", "fromCode": "SR", "toDomain": "absence_sub_type", "toCode": "RDR"}
            ]
        }"#;
        let catalog = ReferenceCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.entry_count(), 2);
        let sr = EntryCode::parse("SR").unwrap();
        assert_eq!(
            catalog.linked(RefDomain::AbsenceType, &sr, RefDomain::AbsenceSubType)[0].as_str(),
            "RDR"
        );
    }
}
