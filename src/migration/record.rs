//! `LedgerEntry` - Represents rows in the `floodgate_migrations` ledger table

use chrono::{DateTime, Utc};

/// A row in the `floodgate_migrations` ledger table
///
/// One entry per successfully applied migration. Entries are created by
/// successful up steps, deleted by successful down steps, and otherwise live
/// for the lifetime of the target database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Migration version (timestamp: YYYYMMDDHHMMSS)
    pub version: i64,

    /// Human-readable migration name
    pub name: String,

    /// `SHA-256` checksum of the up script content
    pub checksum: String,

    /// When the migration was applied (UTC)
    pub applied_at: DateTime<Utc>,

    /// Execution time in milliseconds (`None` if not recorded)
    pub execution_time_ms: Option<i64>,
}

impl LedgerEntry {
    /// Create a new `LedgerEntry`
    #[must_use]
    pub fn new(
        version: i64,
        name: String,
        checksum: String,
        applied_at: DateTime<Utc>,
        execution_time_ms: Option<i64>,
    ) -> Self {
        Self {
            version,
            name,
            checksum,
            applied_at,
            execution_time_ms,
        }
    }

    /// Create a `LedgerEntry` from a database row
    ///
    /// Expected column order: `version`, `name`, `checksum`, `applied_at`, `execution_time_ms`
    ///
    /// # Errors
    ///
    /// Returns `SqlError::Parse` if the timestamp column cannot be parsed.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, crate::SqlError> {
        let version: i64 = row.get(0);
        let name: String = row.get(1);
        let checksum: String = row.get(2);

        // `PostgreSQL` `TIMESTAMP` is returned as a string in `may_postgres`
        let applied_at_str: String = row.get(3);
        let applied_at = parse_timestamp(&applied_at_str)?;

        let execution_time_ms: Option<i64> = row.get(4);

        Ok(Self {
            version,
            name,
            checksum,
            applied_at,
            execution_time_ms,
        })
    }
}

/// Parse a ledger timestamp, trying the formats `may_postgres` emits
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, crate::SqlError> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];

    for format in formats {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(crate::SqlError::Parse(format!(
        "Failed to parse timestamp '{value}': unrecognized format"
    )))
}
