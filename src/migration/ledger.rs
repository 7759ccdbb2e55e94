//! Applied-state ledger: the `floodgate_migrations` table

use crate::migration::{LedgerEntry, MigrationError};
use crate::SqlExecutor;
use sea_query::{ColumnDef, Index, IndexCreateStatement, PostgresQueryBuilder, Table, TableCreateStatement};

/// Name of the ledger table; fixed to avoid collision with user schema
pub const LEDGER_TABLE: &str = "floodgate_migrations";

/// Durable record of which migrations have been applied
///
/// The execution engine is the sole writer; the status reporter only reads.
/// Implementations must keep `record` safe against duplicate versions even
/// when the engine's own planning should already prevent them.
pub trait Ledger {
    /// Idempotently create the ledger table if absent; safe to call on every run
    fn ensure_schema(&self) -> Result<(), MigrationError>;

    /// All applied migrations, ascending by version
    fn applied_entries(&self) -> Result<Vec<LedgerEntry>, MigrationError>;

    /// Insert one row; fails on duplicate version
    fn record(&self, entry: &LedgerEntry) -> Result<(), MigrationError>;

    /// Delete one row; fails if the version is absent
    fn forget(&self, version: i64) -> Result<(), MigrationError>;
}

/// Build the `floodgate_migrations` table definition
///
/// Columns:
/// - `version` (primary key, timestamp)
/// - `name` (human-readable)
/// - `checksum` (SHA-256 of the up script)
/// - `applied_at` (UTC timestamp)
/// - `execution_time_ms` (nullable)
///
/// The layout is persisted state and must remain stable across versions.
pub fn create_ledger_table() -> TableCreateStatement {
    Table::create()
        .table(LEDGER_TABLE)
        .if_not_exists()
        .col(
            ColumnDef::new("version")
                .big_integer()
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new("name")
                .string()
                .string_len(255)
                .not_null(),
        )
        .col(
            ColumnDef::new("checksum")
                .string()
                .string_len(64)
                .not_null(),
        )
        .col(
            ColumnDef::new("applied_at")
                .timestamp()
                .not_null(),
        )
        .col(
            ColumnDef::new("execution_time_ms")
                .big_integer()
                .null(),
        )
        .to_owned()
}

/// Index on `applied_at` for faster status queries
pub fn create_ledger_table_index() -> IndexCreateStatement {
    Index::create()
        .name("idx_floodgate_migrations_applied_at")
        .if_not_exists()
        .table(LEDGER_TABLE)
        .col(sea_query::Expr::col("applied_at"))
        .to_owned()
}

/// PostgreSQL ledger over a [`SqlExecutor`]
pub struct PgLedger<'a> {
    executor: &'a dyn SqlExecutor,
}

impl<'a> PgLedger<'a> {
    pub fn new(executor: &'a dyn SqlExecutor) -> Self {
        Self { executor }
    }
}

impl Ledger for PgLedger<'_> {
    fn ensure_schema(&self) -> Result<(), MigrationError> {
        let table_sql = create_ledger_table().build(PostgresQueryBuilder);
        self.executor.execute(&table_sql, &[])?;

        let index_sql = create_ledger_table_index().build(PostgresQueryBuilder);
        self.executor.execute(&index_sql, &[])?;

        Ok(())
    }

    /// Query applied migrations from the ledger
    ///
    /// Excludes the lock record (version = -1) from results.
    fn applied_entries(&self) -> Result<Vec<LedgerEntry>, MigrationError> {
        let sql = r#"
            SELECT version, name, checksum, applied_at, execution_time_ms
            FROM floodgate_migrations
            WHERE version > 0
            ORDER BY version ASC
        "#;

        let rows = self.executor.query_all(sql, &[])?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(LedgerEntry::from_row(&row).map_err(MigrationError::Database)?);
        }

        Ok(entries)
    }

    fn record(&self, entry: &LedgerEntry) -> Result<(), MigrationError> {
        let sql = r#"
            INSERT INTO floodgate_migrations (version, name, checksum, applied_at, execution_time_ms)
            VALUES ($1, $2, $3, $4, $5)
        "#;

        // Format timestamp as PostgreSQL timestamp string
        let timestamp_str = entry.applied_at.format("%Y-%m-%d %H:%M:%S%.f").to_string();

        self.executor
            .execute(
                sql,
                &[
                    &entry.version,
                    &entry.name,
                    &entry.checksum,
                    &timestamp_str,
                    &entry.execution_time_ms,
                ],
            )
            .map_err(|e| {
                // The primary key backs up the engine's own planning
                if e.to_string().contains("duplicate key") {
                    MigrationError::AlreadyApplied {
                        version: entry.version,
                        name: entry.name.clone(),
                    }
                } else {
                    MigrationError::Database(e)
                }
            })?;

        Ok(())
    }

    fn forget(&self, version: i64) -> Result<(), MigrationError> {
        let sql = "DELETE FROM floodgate_migrations WHERE version = $1";

        let rows_affected = self.executor.execute(sql, &[&version])?;

        if rows_affected == 0 {
            return Err(MigrationError::Database(crate::SqlError::Query(format!(
                "no ledger entry for version {version}"
            ))));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_ddl_has_stable_layout() {
        let sql = create_ledger_table().build(PostgresQueryBuilder);
        assert!(sql.contains("floodgate_migrations"));
        for column in ["version", "name", "checksum", "applied_at", "execution_time_ms"] {
            assert!(sql.contains(column), "missing column {column} in: {sql}");
        }
    }

    #[test]
    fn test_ledger_index_targets_applied_at() {
        let sql = create_ledger_table_index().build(PostgresQueryBuilder);
        assert!(sql.contains("idx_floodgate_migrations_applied_at"));
        assert!(sql.contains("applied_at"));
    }
}
