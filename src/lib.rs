//! # Floodgate
//!
//! Advisory-locked schema migration engine for PostgreSQL on the `may` runtime.
//!
//! See [README on GitHub](https://github.com/microscaler/floodgate) for full architecture.

pub mod cancel;
pub mod clock;
pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;

pub use cancel::CancelToken;
pub use clock::{Clock, SystemClock};
pub use config::MigratorConfig;
pub use connection::connect;
pub use executor::{MayPostgresExecutor, SqlError, SqlExecutor};
pub use migration::{
    Catalog, Ledger, LedgerEntry, LockCoordinator, MigrationError, MigrationScript, Migrator,
    PgLedger, PgRowLock, RunResult, StatusEntry, StatusReport,
};
