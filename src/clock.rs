//! Injectable time source for `applied_at` timestamps

use chrono::{DateTime, Utc};

/// Source of the timestamps recorded in the ledger.
///
/// Production code uses [`SystemClock`]; tests inject a fixed clock so
/// `applied_at` values are deterministic.
pub trait Clock {
    /// Current time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time via `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
