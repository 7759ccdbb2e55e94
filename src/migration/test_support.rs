//! Shared fakes and fixtures for migration engine tests

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::migration::checksum::checksum;
use crate::migration::ledger::Ledger;
use crate::migration::lock::LockCoordinator;
use crate::migration::{LedgerEntry, MigrationError, MigrationScript};
use crate::{SqlError, SqlExecutor};
use chrono::{DateTime, TimeZone, Utc};
use may_postgres::types::ToSql;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub(crate) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A reversible in-memory script with a deterministic checksum
pub(crate) fn script(version: i64, name: &str) -> MigrationScript {
    let up_sql = format!("CREATE TABLE {name} (id BIGINT);");
    MigrationScript {
        version,
        name: name.to_string(),
        path: PathBuf::from(format!("m{version:014}_{name}.up.sql")),
        checksum: checksum(&up_sql),
        up_sql,
        down_sql: Some(format!("DROP TABLE {name};")),
    }
}

/// Ledger entry matching a script, as a successful apply would have written it
pub(crate) fn entry_for(script: &MigrationScript) -> LedgerEntry {
    LedgerEntry::new(
        script.version,
        script.name.clone(),
        script.checksum.clone(),
        fixed_time(),
        Some(1),
    )
}

/// Write a script directory: (version, name, up_sql, down_sql)
pub(crate) fn scripts_dir(specs: &[(i64, &str, &str, Option<&str>)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (version, name, up, down) in specs {
        fs::write(dir.path().join(format!("m{version:014}_{name}.up.sql")), up).unwrap();
        if let Some(down) = down {
            fs::write(
                dir.path().join(format!("m{version:014}_{name}.down.sql")),
                down,
            )
            .unwrap();
        }
    }
    dir
}

/// Clock returning a fixed instant
pub(crate) struct ManualClock {
    pub now: DateTime<Utc>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self { now: fixed_time() }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// In-memory ledger
#[derive(Default)]
pub(crate) struct FakeLedger {
    entries: RefCell<Vec<LedgerEntry>>,
}

impl FakeLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed(&self, entries: Vec<LedgerEntry>) {
        *self.entries.borrow_mut() = entries;
    }

    pub(crate) fn versions(&self) -> Vec<i64> {
        let mut versions: Vec<i64> =
            self.entries.borrow().iter().map(|e| e.version).collect();
        versions.sort_unstable();
        versions
    }

    pub(crate) fn entry(&self, version: i64) -> Option<LedgerEntry> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.version == version)
            .cloned()
    }
}

impl Ledger for FakeLedger {
    fn ensure_schema(&self) -> Result<(), MigrationError> {
        Ok(())
    }

    fn applied_entries(&self) -> Result<Vec<LedgerEntry>, MigrationError> {
        let mut entries = self.entries.borrow().clone();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    fn record(&self, entry: &LedgerEntry) -> Result<(), MigrationError> {
        let mut entries = self.entries.borrow_mut();
        if entries.iter().any(|e| e.version == entry.version) {
            return Err(MigrationError::AlreadyApplied {
                version: entry.version,
                name: entry.name.clone(),
            });
        }
        entries.push(entry.clone());
        Ok(())
    }

    fn forget(&self, version: i64) -> Result<(), MigrationError> {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| e.version != version);
        if entries.len() == before {
            return Err(MigrationError::Database(SqlError::Query(format!(
                "no ledger entry for version {version}"
            ))));
        }
        Ok(())
    }
}

/// In-memory lock; `seize` simulates another runner holding it
#[derive(Default)]
pub(crate) struct FakeLock {
    held_by_us: Cell<bool>,
    held_elsewhere: Cell<bool>,
}

impl FakeLock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seize(&self) {
        self.held_elsewhere.set(true);
    }

    pub(crate) fn held(&self) -> bool {
        self.held_by_us.get() || self.held_elsewhere.get()
    }
}

impl LockCoordinator for FakeLock {
    fn try_acquire(&self) -> Result<bool, MigrationError> {
        if self.held() {
            return Ok(false);
        }
        self.held_by_us.set(true);
        Ok(true)
    }

    fn release(&self) -> Result<(), MigrationError> {
        self.held_by_us.set(false);
        Ok(())
    }

    fn is_held(&self) -> Result<bool, MigrationError> {
        Ok(self.held())
    }
}

/// Executor that records scripts and transaction statements instead of running them
#[derive(Default)]
pub(crate) struct FakeExecutor {
    batches: RefCell<Vec<String>>,
    statements: RefCell<Vec<String>>,
    fail_on: RefCell<Option<String>>,
    cancel_on: RefCell<Option<(String, CancelToken)>>,
}

impl FakeExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail any batch whose script contains `marker`
    pub(crate) fn fail_on(&self, marker: &str) {
        *self.fail_on.borrow_mut() = Some(marker.to_string());
    }

    pub(crate) fn clear_failure(&self) {
        *self.fail_on.borrow_mut() = None;
    }

    /// Cancel `token` once a batch containing `marker` has executed,
    /// simulating a caller that cancels mid-run
    pub(crate) fn cancel_on(&self, marker: &str, token: CancelToken) {
        *self.cancel_on.borrow_mut() = Some((marker.to_string(), token));
    }

    pub(crate) fn batches(&self) -> Vec<String> {
        self.batches.borrow().clone()
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }
}

impl SqlExecutor for FakeExecutor {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, SqlError> {
        self.statements.borrow_mut().push(query.to_string());
        Ok(1)
    }

    fn query_one(&self, _query: &str, _params: &[&dyn ToSql]) -> Result<may_postgres::Row, SqlError> {
        Err(SqlError::Other(
            "query_one is not supported by FakeExecutor".to_string(),
        ))
    }

    fn query_all(&self, _query: &str, _params: &[&dyn ToSql]) -> Result<Vec<may_postgres::Row>, SqlError> {
        Ok(Vec::new())
    }

    fn batch(&self, script: &str) -> Result<(), SqlError> {
        if let Some(marker) = self.fail_on.borrow().as_ref() {
            if script.contains(marker.as_str()) {
                return Err(SqlError::Query(format!(
                    "forced failure on statement containing '{marker}'"
                )));
            }
        }

        self.batches.borrow_mut().push(script.to_string());

        if let Some((marker, token)) = self.cancel_on.borrow().as_ref() {
            if script.contains(marker.as_str()) {
                token.cancel();
            }
        }

        Ok(())
    }
}
