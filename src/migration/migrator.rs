//! Migrator - Core migration execution engine

use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::migration::status::{build_report, StatusReport};
use crate::migration::{
    lock, Catalog, Ledger, LedgerEntry, LockCoordinator, MigrationError, MigrationScript,
};
use crate::SqlExecutor;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default maximum wait for the migration lock
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one mutating run
///
/// Produced fresh per invocation and never persisted. A run that fails midway
/// still lists everything that committed before the failure, so callers can
/// resume from the first still-pending version after fixing the cause.
#[derive(Debug)]
pub struct RunResult {
    /// Migrations applied (up) or reverted (down), in execution order
    pub completed: Vec<MigrationScript>,

    /// The failure that stopped the run, if any
    pub error: Option<MigrationError>,
}

impl RunResult {
    /// Whether the run finished without error
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, keeping the completed list on success
    ///
    /// # Errors
    ///
    /// Returns the run's error; the partial completed list is dropped, so
    /// callers that need it should inspect the fields instead.
    pub fn into_result(self) -> Result<Vec<MigrationScript>, MigrationError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.completed),
        }
    }
}

/// Core migration execution engine
///
/// The `Migrator` orchestrates script discovery, validation, locking,
/// execution and ledger bookkeeping. It never writes to a terminal or exits
/// the process; every outcome is reported as a structured value.
///
/// State within a run always moves through: lock acquisition, catalog load,
/// ledger read, per-item execution, unconditional lock release.
pub struct Migrator<'a> {
    scripts_dir: PathBuf,
    executor: &'a dyn SqlExecutor,
    ledger: &'a dyn Ledger,
    lock: &'a dyn LockCoordinator,
    clock: &'a dyn Clock,
    lock_timeout: Duration,
}

impl<'a> Migrator<'a> {
    /// Create a new Migrator over the given collaborators
    ///
    /// `scripts_dir` is enumerated afresh on every run. The executor runs the
    /// scripts themselves plus transaction control; ledger and lock own their
    /// respective tables.
    pub fn new(
        scripts_dir: impl AsRef<Path>,
        executor: &'a dyn SqlExecutor,
        ledger: &'a dyn Ledger,
        lock: &'a dyn LockCoordinator,
    ) -> Self {
        Self {
            scripts_dir: scripts_dir.as_ref().to_path_buf(),
            executor,
            ledger,
            lock,
            clock: &SystemClock,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Replace the wall clock, for deterministic `applied_at` values in tests
    #[must_use]
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Change the bounded wait for the migration lock (default 60s)
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Apply pending migrations in ascending version order
    ///
    /// `steps` limits how many migrations run; `None` applies all pending.
    /// Execution stops at the first failure; migrations already committed in
    /// this run stay committed and are listed in the result.
    pub fn up(&self, cancel: &CancelToken, steps: Option<usize>) -> RunResult {
        let mut completed = Vec::new();
        let error = self.run_up(cancel, steps, &mut completed).err();
        RunResult { completed, error }
    }

    /// Revert applied migrations in descending version order
    ///
    /// `steps` defaults to 1 when `None` - the opposite default from
    /// [`up`](Self::up), because reverting everything is rarely intended.
    pub fn down(&self, cancel: &CancelToken, steps: Option<usize>) -> RunResult {
        let mut completed = Vec::new();
        let error = self.run_down(cancel, steps, &mut completed).err();
        RunResult { completed, error }
    }

    /// Compute the pending list without executing or recording anything
    ///
    /// Performs only a read-only lock check; a held lock is logged because the
    /// returned plan may be stale by the time another runner releases it.
    ///
    /// # Errors
    ///
    /// Returns catalog, drift and checksum errors exactly as `up` would.
    pub fn dry_run(&self) -> Result<Vec<MigrationScript>, MigrationError> {
        self.ledger.ensure_schema()?;

        if self.lock.is_held()? {
            log::warn!("migration lock is currently held; the pending set may change");
        }

        let catalog = Catalog::load(&self.scripts_dir)?;
        let applied = self.ledger.applied_entries()?;
        let pending = reconcile(&catalog, &applied)?;

        Ok(pending.into_iter().cloned().collect())
    }

    /// Merge catalog and ledger into a status report
    ///
    /// Read-only and lock-free; drift entries are flagged, not dropped.
    ///
    /// # Errors
    ///
    /// Returns catalog errors, and `ChecksumMismatch` when an applied script
    /// was edited after deployment.
    pub fn status(&self) -> Result<StatusReport, MigrationError> {
        self.ledger.ensure_schema()?;

        let catalog = Catalog::load(&self.scripts_dir)?;
        let applied = self.ledger.applied_entries()?;

        build_report(&catalog, &applied)
    }

    /// Validate that every applied migration still has an unmodified script
    ///
    /// # Errors
    ///
    /// Returns `Drift` or `ChecksumMismatch` on the first inconsistency.
    pub fn validate(&self) -> Result<(), MigrationError> {
        self.ledger.ensure_schema()?;

        let catalog = Catalog::load(&self.scripts_dir)?;
        let applied = self.ledger.applied_entries()?;
        reconcile(&catalog, &applied).map(|_| ())
    }

    fn run_up(
        &self,
        cancel: &CancelToken,
        steps: Option<usize>,
        completed: &mut Vec<MigrationScript>,
    ) -> Result<(), MigrationError> {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }

        self.ledger.ensure_schema()?;
        let _guard = lock::acquire(self.lock, self.lock_timeout)?;

        let catalog = Catalog::load(&self.scripts_dir)?;
        let applied = self.ledger.applied_entries()?;
        let pending = reconcile(&catalog, &applied)?;

        let take = steps.unwrap_or(pending.len()).min(pending.len());
        if take == 0 {
            log::debug!("no pending migrations to apply");
            return Ok(());
        }

        for script in pending.into_iter().take(take) {
            if cancel.is_cancelled() {
                return Err(MigrationError::Cancelled);
            }
            self.apply(script)?;
            completed.push(script.clone());
        }

        log::info!("applied {} migration(s)", completed.len());
        Ok(())
    }

    fn run_down(
        &self,
        cancel: &CancelToken,
        steps: Option<usize>,
        completed: &mut Vec<MigrationScript>,
    ) -> Result<(), MigrationError> {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }

        self.ledger.ensure_schema()?;
        let _guard = lock::acquire(self.lock, self.lock_timeout)?;

        let catalog = Catalog::load(&self.scripts_dir)?;
        let applied = self.ledger.applied_entries()?;
        reconcile(&catalog, &applied)?;

        // Newest first
        let mut entries: Vec<&LedgerEntry> = applied.iter().collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.version));

        let steps = steps.unwrap_or(1);

        for entry in entries.into_iter().take(steps) {
            if cancel.is_cancelled() {
                return Err(MigrationError::Cancelled);
            }

            let script = catalog
                .get(entry.version)
                .ok_or_else(|| MigrationError::Drift {
                    version: entry.version,
                    name: entry.name.clone(),
                })?;

            // Fail before this item mutates anything; earlier items in the
            // batch stay reverted
            let down_sql =
                script
                    .down_sql
                    .as_deref()
                    .ok_or_else(|| MigrationError::Irreversible {
                        version: script.version,
                        name: script.name.clone(),
                    })?;

            self.revert(script, down_sql)?;
            completed.push(script.clone());
        }

        log::info!("reverted {} migration(s)", completed.len());
        Ok(())
    }

    /// Execute one up script and its ledger write in a single transaction
    fn apply(&self, script: &MigrationScript) -> Result<(), MigrationError> {
        let start = Instant::now();

        self.executor.execute("BEGIN", &[])?;

        let result = self
            .executor
            .batch(&script.up_sql)
            .map_err(|e| MigrationError::Execution {
                version: script.version,
                name: script.name.clone(),
                error: e.to_string(),
            })
            .and_then(|()| {
                let execution_time = start.elapsed().as_millis() as i64;
                let entry = LedgerEntry::new(
                    script.version,
                    script.name.clone(),
                    script.checksum.clone(),
                    self.clock.now(),
                    Some(execution_time),
                );
                self.ledger.record(&entry)
            });

        match result {
            Ok(()) => {
                self.executor.execute("COMMIT", &[])?;
                log::info!(
                    "applied migration '{}' (version {}) in {}ms",
                    script.name,
                    script.version,
                    start.elapsed().as_millis()
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.executor.execute("ROLLBACK", &[]) {
                    log::warn!("rollback after failed migration also failed: {rollback_err}");
                }
                Err(e)
            }
        }
    }

    /// Execute one down script and its ledger delete in a single transaction
    fn revert(&self, script: &MigrationScript, down_sql: &str) -> Result<(), MigrationError> {
        let start = Instant::now();

        self.executor.execute("BEGIN", &[])?;

        let result = self
            .executor
            .batch(down_sql)
            .map_err(|e| MigrationError::Execution {
                version: script.version,
                name: script.name.clone(),
                error: e.to_string(),
            })
            .and_then(|()| self.ledger.forget(script.version));

        match result {
            Ok(()) => {
                self.executor.execute("COMMIT", &[])?;
                log::info!(
                    "reverted migration '{}' (version {}) in {}ms",
                    script.name,
                    script.version,
                    start.elapsed().as_millis()
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.executor.execute("ROLLBACK", &[]) {
                    log::warn!("rollback after failed revert also failed: {rollback_err}");
                }
                Err(e)
            }
        }
    }
}

/// Cross-check catalog and ledger, returning the pending scripts ascending
///
/// Hard-fails on drift (applied version with no script) and on checksum
/// mismatches, keeping mutating runs fail-closed.
fn reconcile<'c>(
    catalog: &'c Catalog,
    applied: &[LedgerEntry],
) -> Result<Vec<&'c MigrationScript>, MigrationError> {
    let mut applied_versions = HashSet::with_capacity(applied.len());

    for entry in applied {
        let script = catalog
            .get(entry.version)
            .ok_or_else(|| MigrationError::Drift {
                version: entry.version,
                name: entry.name.clone(),
            })?;

        if script.checksum != entry.checksum {
            return Err(MigrationError::ChecksumMismatch {
                version: entry.version,
                name: entry.name.clone(),
                stored: entry.checksum.clone(),
                current: script.checksum.clone(),
            });
        }

        applied_versions.insert(entry.version);
    }

    Ok(catalog
        .scripts()
        .iter()
        .filter(|s| !applied_versions.contains(&s.version))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::test_support::{
        entry_for, fixed_time, script, scripts_dir, FakeExecutor, FakeLedger, FakeLock,
        ManualClock,
    };

    const V1: i64 = 20240101000000;
    const V2: i64 = 20240202000000;
    const V3: i64 = 20240303000000;

    fn three_reversible() -> tempfile::TempDir {
        scripts_dir(&[
            (V1, "first", "CREATE TABLE first (id BIGINT);", Some("DROP TABLE first;")),
            (V2, "second", "CREATE TABLE second (id BIGINT);", Some("DROP TABLE second;")),
            (V3, "third", "CREATE TABLE third (id BIGINT);", Some("DROP TABLE third;")),
        ])
    }

    fn seed_all_applied(dir: &tempfile::TempDir, ledger: &FakeLedger) {
        let catalog = Catalog::load(dir.path()).unwrap();
        ledger.seed(catalog.scripts().iter().map(entry_for).collect());
    }

    #[test]
    fn test_up_applies_all_pending_in_ascending_order() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.up(&CancelToken::new(), None);
        assert!(result.is_success(), "unexpected error: {:?}", result.error);

        let versions: Vec<i64> = result.completed.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![V1, V2, V3]);
        assert_eq!(ledger.versions(), vec![V1, V2, V3]);
        assert_eq!(
            executor.batches(),
            vec![
                "CREATE TABLE first (id BIGINT);",
                "CREATE TABLE second (id BIGINT);",
                "CREATE TABLE third (id BIGINT);",
            ]
        );
        // One transaction per step
        let commits = executor.statements().iter().filter(|s| *s == "COMMIT").count();
        assert_eq!(commits, 3);
        assert!(!lock.held(), "lock must be released after the run");
    }

    #[test]
    fn test_up_steps_bounds_the_batch() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.up(&CancelToken::new(), Some(1));
        assert!(result.is_success());
        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].version, V1);
        assert_eq!(ledger.versions(), vec![V1]);
    }

    #[test]
    fn test_up_zero_steps_is_a_no_op() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.up(&CancelToken::new(), Some(0));
        assert!(result.is_success());
        assert!(result.completed.is_empty());
        assert!(executor.batches().is_empty());
    }

    #[test]
    fn test_up_after_full_apply_is_empty() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        assert!(migrator.up(&CancelToken::new(), None).is_success());
        let second = migrator.up(&CancelToken::new(), None);
        assert!(second.is_success());
        assert!(second.completed.is_empty());
        assert_eq!(ledger.versions(), vec![V1, V2, V3]);
    }

    #[test]
    fn test_partial_failure_keeps_committed_prefix_and_resumes() {
        let dir = scripts_dir(&[
            (V1, "first", "CREATE TABLE first (id BIGINT);", None),
            (V2, "second", "CREATE TABLE second (id BIGINT); -- BOOM", None),
            (V3, "third", "CREATE TABLE third (id BIGINT);", None),
        ]);
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        executor.fail_on("BOOM");
        let result = migrator.up(&CancelToken::new(), None);

        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].version, V1);
        match result.error {
            Some(MigrationError::Execution { version, ref name, .. }) => {
                assert_eq!(version, V2);
                assert_eq!(name, "second");
            }
            ref other => panic!("expected Execution error for V2, got {other:?}"),
        }
        // Ledger reflects exactly what committed
        assert_eq!(ledger.versions(), vec![V1]);
        assert!(executor.statements().contains(&"ROLLBACK".to_string()));
        assert!(!lock.held(), "lock must be released after a failed run");

        // Operator fixes the script; the engine resumes from the first pending
        executor.clear_failure();
        let resumed = migrator.up(&CancelToken::new(), None);
        assert!(resumed.is_success());
        let versions: Vec<i64> = resumed.completed.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![V2, V3]);
        assert_eq!(ledger.versions(), vec![V1, V2, V3]);
    }

    #[test]
    fn test_down_defaults_to_one_step() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        seed_all_applied(&dir, &ledger);
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.down(&CancelToken::new(), None);
        assert!(result.is_success());
        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].version, V3);
        assert_eq!(ledger.versions(), vec![V1, V2]);
        assert_eq!(executor.batches(), vec!["DROP TABLE third;"]);
    }

    #[test]
    fn test_down_reverts_newest_first() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        seed_all_applied(&dir, &ledger);
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.down(&CancelToken::new(), Some(2));
        assert!(result.is_success());
        let versions: Vec<i64> = result.completed.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![V3, V2]);
        assert_eq!(ledger.versions(), vec![V1]);
        assert_eq!(
            executor.batches(),
            vec!["DROP TABLE third;", "DROP TABLE second;"]
        );
    }

    #[test]
    fn test_down_fails_on_irreversible_before_touching_it() {
        let dir = scripts_dir(&[
            (V1, "first", "CREATE TABLE first (id BIGINT);", Some("DROP TABLE first;")),
            (V2, "second", "CREATE TABLE second (id BIGINT);", None),
            (V3, "third", "CREATE TABLE third (id BIGINT);", Some("DROP TABLE third;")),
        ]);
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        seed_all_applied(&dir, &ledger);
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.down(&CancelToken::new(), Some(3));

        // V3 reverted, then V2 fails before any of its statements execute
        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].version, V3);
        assert!(matches!(
            result.error,
            Some(MigrationError::Irreversible { version: V2, .. })
        ));
        assert_eq!(ledger.versions(), vec![V1, V2]);
        assert_eq!(executor.batches(), vec!["DROP TABLE third;"]);
    }

    #[test]
    fn test_up_fails_closed_on_drift() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        // An applied version whose script no longer exists
        ledger.seed(vec![entry_for(&script(20231231000000, "ghost"))]);
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.up(&CancelToken::new(), None);
        assert!(result.completed.is_empty());
        assert!(matches!(
            result.error,
            Some(MigrationError::Drift { version: 20231231000000, .. })
        ));
        assert!(executor.batches().is_empty());
        assert!(!lock.held());
    }

    #[test]
    fn test_lock_busy_aborts_without_applying() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        lock.seize();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock)
            .with_lock_timeout(Duration::from_secs(0));

        let result = migrator.up(&CancelToken::new(), None);
        assert!(result.completed.is_empty());
        assert!(matches!(result.error, Some(MigrationError::LockBusy(_))));
        assert!(executor.batches().is_empty());
        assert!(ledger.versions().is_empty());
    }

    #[test]
    fn test_cancel_before_lock_acquisition() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = migrator.up(&cancel, None);

        assert!(matches!(result.error, Some(MigrationError::Cancelled)));
        assert!(result.completed.is_empty());
        assert!(!lock.held(), "lock must not be acquired after cancellation");
        assert!(executor.batches().is_empty());
    }

    #[test]
    fn test_cancel_between_steps_not_mid_script() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let cancel = CancelToken::new();
        executor.cancel_on("first", cancel.clone());
        let result = migrator.up(&cancel, None);

        // The in-flight step finished and was recorded; later steps never ran
        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].version, V1);
        assert!(matches!(result.error, Some(MigrationError::Cancelled)));
        assert_eq!(ledger.versions(), vec![V1]);
        assert_eq!(executor.batches().len(), 1);
        assert!(!lock.held());
    }

    #[test]
    fn test_dry_run_is_pure_and_idempotent() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let catalog = Catalog::load(dir.path()).unwrap();
        ledger.seed(vec![entry_for(&catalog.scripts()[0])]);
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let first = migrator.dry_run().unwrap();
        let second = migrator.dry_run().unwrap();

        let versions: Vec<i64> = first.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![V2, V3]);
        assert_eq!(first, second);
        assert!(executor.batches().is_empty(), "dry run must execute nothing");
        assert_eq!(ledger.versions(), vec![V1], "dry run must record nothing");
    }

    #[test]
    fn test_status_is_idempotent_and_flags_drift() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let catalog = Catalog::load(dir.path()).unwrap();
        ledger.seed(vec![
            entry_for(&catalog.scripts()[0]),
            entry_for(&script(20231231000000, "ghost")),
        ]);
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let report = migrator.status().unwrap();
        assert!(report.has_drift());
        assert_eq!(report.applied_count(), 2);
        assert_eq!(report.pending_count(), 2);

        let again = migrator.status().unwrap();
        assert_eq!(report.entries.len(), again.entries.len());
    }

    #[test]
    fn test_validate_detects_checksum_mismatch() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let catalog = Catalog::load(dir.path()).unwrap();
        let mut stale = entry_for(&catalog.scripts()[0]);
        stale.checksum = "deadbeef".to_string();
        ledger.seed(vec![stale]);
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        assert!(matches!(
            migrator.validate(),
            Err(MigrationError::ChecksumMismatch { version: V1, .. })
        ));
    }

    #[test]
    fn test_applied_at_comes_from_injected_clock() {
        let dir = three_reversible();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let clock = ManualClock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock).with_clock(&clock);

        assert!(migrator.up(&CancelToken::new(), Some(1)).is_success());
        let entry = ledger.entry(V1).unwrap();
        assert_eq!(entry.applied_at, fixed_time());
    }

    #[test]
    fn test_catalog_error_surfaces_before_any_mutation() {
        let dir = scripts_dir(&[
            (V1, "first", "CREATE TABLE first (id BIGINT);", None),
        ]);
        std::fs::write(dir.path().join("m123_broken.up.sql"), "SELECT 1;").unwrap();
        let executor = FakeExecutor::new();
        let ledger = FakeLedger::new();
        let lock = FakeLock::new();
        let migrator = Migrator::new(dir.path(), &executor, &ledger, &lock);

        let result = migrator.up(&CancelToken::new(), None);
        assert!(matches!(result.error, Some(MigrationError::Catalog { .. })));
        assert!(result.completed.is_empty());
        assert!(executor.batches().is_empty());
        assert!(ledger.versions().is_empty());
    }
}
