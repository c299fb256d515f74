//! Read-only registry of test-case definitions.

pub mod builtin;
pub mod loader;

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::errors::ApexError;
use crate::models::TestCase;

static TEST_CASE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^WSTG-[A-Z]{4}-\d{2}$").expect("valid test case id regex")
});

/// Test cases in insertion order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<TestCase>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in WSTG catalog.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for case in builtin::wstg_test_cases() {
            // Built-in ids are well-formed and unique.
            let _ = catalog.insert(case);
        }
        catalog
    }

    /// Built-in catalog plus any YAML extensions found in `dir`.
    pub fn load(extensions_dir: Option<&Path>) -> Result<Self, ApexError> {
        let mut catalog = Self::builtin();
        if let Some(dir) = extensions_dir {
            for ext in loader::load_extensions(dir)? {
                for case in ext.test_cases {
                    catalog.insert(case)?;
                }
            }
        }
        info!(test_cases = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Add a test case. A known id is replaced in place, keeping its position.
    pub fn insert(&mut self, case: TestCase) -> Result<(), ApexError> {
        if !TEST_CASE_ID.is_match(&case.id) {
            return Err(ApexError::Config(format!(
                "test case id '{}' is not a WSTG id (WSTG-XXXX-NN)",
                case.id
            )));
        }
        match self.index.get(&case.id) {
            Some(&pos) => {
                debug!(id = %case.id, "Overriding catalog entry");
                self.entries[pos] = case;
            }
            None => {
                self.index.insert(case.id.clone(), self.entries.len());
                self.entries.push(case);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::TesterRole;
    use crate::models::{Prerequisite, Priority};

    fn case(id: &str, priority: u8) -> TestCase {
        TestCase {
            id: id.into(),
            title: "t".into(),
            category: "c".into(),
            automatable: true,
            role: TesterRole::Recon,
            base_priority: Priority::new(priority).unwrap(),
            prerequisite: Prerequisite::None,
        }
    }

    #[test]
    fn test_builtin_lookup() {
        let catalog = Catalog::builtin();
        let sqli = catalog.get("WSTG-INPV-05").unwrap();
        assert_eq!(sqli.role, TesterRole::Fuzz);
        assert_eq!(catalog.iter().next().map(|c| c.id.as_str()), Some("WSTG-INFO-01"));
        assert!(catalog.get("WSTG-NOPE-01").is_none());
    }

    #[test]
    fn test_insert_rejects_malformed_id() {
        let mut catalog = Catalog::empty();
        assert!(catalog.insert(case("sql-injection", 3)).is_err());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_override_keeps_position() {
        let mut catalog = Catalog::empty();
        catalog.insert(case("WSTG-INFO-01", 2)).unwrap();
        catalog.insert(case("WSTG-INFO-02", 2)).unwrap();
        catalog.insert(case("WSTG-INFO-01", 5)).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.iter().next().map(|c| c.id.as_str()), Some("WSTG-INFO-01"));
        assert_eq!(catalog.get("WSTG-INFO-01").unwrap().base_priority, Priority::MAX);
    }

    #[test]
    fn test_load_with_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("errh.yaml"),
            "test_cases:\n  - id: WSTG-ERRH-01\n    title: Error Handling\n    category: Error Handling\n    role: recon-agent\n    base_priority: 4\n",
        )
        .unwrap();
        let catalog = Catalog::load(Some(dir.path())).unwrap();
        assert_eq!(catalog.len(), Catalog::builtin().len() + 1);
        assert_eq!(catalog.iter().last().unwrap().id, "WSTG-ERRH-01");
    }
}
