//! Migration-specific error types

use crate::SqlError;

/// Migration-specific errors
///
/// Every variant carries the offending version, name or file so an operator
/// can diagnose a failed run from the error alone.
#[derive(Debug)]
pub enum MigrationError {
    /// Database execution error
    Database(SqlError),
    /// Bad migration authoring: unreadable directory, unparseable file name,
    /// duplicate version, orphaned down script
    Catalog { file: String, reason: String },
    /// Another runner holds the migration lock
    LockBusy(String),
    /// A migration's statements failed during execution
    Execution {
        version: i64,
        name: String,
        error: String,
    },
    /// Ledger contains a version with no script in the catalog
    Drift { version: i64, name: String },
    /// Down requested on a migration without a down script
    Irreversible { version: i64, name: String },
    /// Migration already recorded in the ledger
    AlreadyApplied { version: i64, name: String },
    /// Script content changed after the migration was applied
    ChecksumMismatch {
        version: i64,
        name: String,
        stored: String,
        current: String,
    },
    /// Run cancelled by the caller before or between migration steps
    Cancelled,
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::Database(e) => write!(f, "Database error: {}", e),
            MigrationError::Catalog { file, reason } => {
                write!(f, "Invalid migration catalog: {}: {}", file, reason)
            }
            MigrationError::LockBusy(msg) => {
                write!(
                    f,
                    "Migration lock busy: {}\n\
                     Another process may be running migrations. If this persists, check for:\n\
                     - Stuck migration process\n\
                     - Database connection issues\n\
                     - A stale lock row in the floodgate_migrations table",
                    msg
                )
            }
            MigrationError::Execution {
                version,
                name,
                error,
            } => {
                write!(
                    f,
                    "Migration '{}' (version {}) failed during execution: {}",
                    name, version, error
                )
            }
            MigrationError::Drift { version, name } => {
                write!(
                    f,
                    "Ledger entry '{}' (version {}) has no matching script in the catalog.\n\
                     The script was deleted or renamed after being applied.",
                    name, version
                )
            }
            MigrationError::Irreversible { version, name } => {
                write!(
                    f,
                    "Migration '{}' (version {}) has no down script and cannot be reverted",
                    name, version
                )
            }
            MigrationError::AlreadyApplied { version, name } => {
                write!(
                    f,
                    "Migration '{}' (version {}) has already been applied",
                    name, version
                )
            }
            MigrationError::ChecksumMismatch {
                version,
                name,
                stored,
                current,
            } => {
                write!(
                    f,
                    "Migration '{}' (version {}) has been modified after being applied.\n\
                     Stored checksum: {}\n\
                     Current checksum: {}\n\
                     This indicates the migration file was edited after deployment.",
                    name, version, stored, current
                )
            }
            MigrationError::Cancelled => {
                write!(f, "Migration run cancelled by caller")
            }
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<SqlError> for MigrationError {
    fn from(error: SqlError) -> Self {
        MigrationError::Database(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_names_file() {
        let err = MigrationError::Catalog {
            file: "m123_bad.up.sql".to_string(),
            reason: "version is not a 14-digit timestamp".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("m123_bad.up.sql"));
        assert!(display.contains("14-digit"));
    }

    #[test]
    fn test_execution_error_carries_version_and_name() {
        let err = MigrationError::Execution {
            version: 20240120120000,
            name: "create_accounts".to_string(),
            error: "relation already exists".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("create_accounts"));
        assert!(display.contains("20240120120000"));
        assert!(display.contains("relation already exists"));
    }

    #[test]
    fn test_drift_and_irreversible_display() {
        let drift = MigrationError::Drift {
            version: 20240101000000,
            name: "ghost".to_string(),
        };
        assert!(drift.to_string().contains("no matching script"));

        let irr = MigrationError::Irreversible {
            version: 20240101000000,
            name: "one_way".to_string(),
        };
        assert!(irr.to_string().contains("cannot be reverted"));
    }
}
