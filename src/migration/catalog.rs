//! Ordered, validated catalog of discovered migration scripts

use crate::migration::file::{discover_scripts, MigrationScript};
use crate::migration::MigrationError;
use std::path::Path;

/// The ordered sequence of all migration scripts discovered for one run
///
/// Versions are unique and ascending; both invariants are enforced at load
/// time, before any execution begins. The catalog never touches the database.
#[derive(Debug, Clone)]
pub struct Catalog {
    scripts: Vec<MigrationScript>,
}

impl Catalog {
    /// Load and validate the catalog from a script directory
    ///
    /// Rebuilt on every invocation: a cheap, stateless read of the directory.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Catalog` for unreadable directories, bad file
    /// names, duplicate versions and unpaired down scripts. These are author
    /// errors; the caller must not retry automatically.
    pub fn load(scripts_dir: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let scripts = discover_scripts(scripts_dir.as_ref())?;
        Self::from_scripts(scripts)
    }

    /// Build a catalog from already-parsed scripts, enforcing invariants
    pub fn from_scripts(mut scripts: Vec<MigrationScript>) -> Result<Self, MigrationError> {
        scripts.sort_by_key(|s| s.version);

        for pair in scripts.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(MigrationError::Catalog {
                    file: pair[1].path.display().to_string(),
                    reason: format!(
                        "duplicate version {} (also claimed by {})",
                        pair[1].version,
                        pair[0].path.display()
                    ),
                });
            }
        }

        Ok(Self { scripts })
    }

    /// All scripts, ascending by version
    pub fn scripts(&self) -> &[MigrationScript] {
        &self.scripts
    }

    /// Look up a script by version
    pub fn get(&self, version: i64) -> Option<&MigrationScript> {
        self.scripts
            .binary_search_by_key(&version, |s| s.version)
            .ok()
            .map(|idx| &self.scripts[idx])
    }

    /// Whether a script with this version exists
    pub fn contains(&self, version: i64) -> bool {
        self.get(version).is_some()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::test_support::script;

    #[test]
    fn test_from_scripts_sorts_ascending() {
        let catalog = Catalog::from_scripts(vec![
            script(20240303000000, "third"),
            script(20240101000000, "first"),
            script(20240202000000, "second"),
        ])
        .unwrap();

        let versions: Vec<i64> = catalog.scripts().iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![20240101000000, 20240202000000, 20240303000000]);
    }

    #[test]
    fn test_from_scripts_rejects_duplicate_versions() {
        let err = Catalog::from_scripts(vec![
            script(20240101000000, "first"),
            script(20240101000000, "other"),
        ])
        .unwrap_err();

        match err {
            MigrationError::Catalog { reason, .. } => {
                assert!(reason.contains("duplicate version"));
            }
            other => panic!("expected Catalog error, got {other:?}"),
        }
    }

    #[test]
    fn test_get_and_contains() {
        let catalog = Catalog::from_scripts(vec![
            script(20240101000000, "first"),
            script(20240202000000, "second"),
        ])
        .unwrap();

        assert!(catalog.contains(20240101000000));
        assert!(!catalog.contains(20240102000000));
        assert_eq!(catalog.get(20240202000000).unwrap().name, "second");
    }
}
