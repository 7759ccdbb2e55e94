//! Point-in-time status view over catalog and ledger

use crate::migration::{Catalog, LedgerEntry, MigrationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Status of a single migration, merged from catalog and ledger
#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    /// Migration version
    pub version: i64,

    /// Migration name
    pub name: String,

    /// Whether the ledger records this migration as applied
    pub applied: bool,

    /// When the migration was applied (`None` for pending migrations)
    pub applied_at: Option<DateTime<Utc>>,

    /// Drift: the ledger records this version but no script exists for it
    pub drift: bool,
}

/// Read-only view of applied and pending migrations
///
/// Produced without locking; tolerates concurrent runs, though the output may
/// be instantaneously stale.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// One entry per migration, ascending by version; drift entries included
    pub entries: Vec<StatusEntry>,
}

impl StatusReport {
    /// Number of applied migrations (drift entries included)
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|e| e.applied).count()
    }

    /// Number of pending migrations
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.applied).count()
    }

    /// Check if all discovered migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count() == 0
    }

    /// Whether any ledger entry lost its script
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.entries.iter().any(|e| e.drift)
    }

    /// Get the latest applied migration version
    #[must_use]
    pub fn latest_applied_version(&self) -> Option<i64> {
        self.entries
            .iter()
            .filter(|e| e.applied)
            .map(|e| e.version)
            .max()
    }

    /// Get the next pending migration version
    #[must_use]
    pub fn next_pending_version(&self) -> Option<i64> {
        self.entries
            .iter()
            .filter(|e| !e.applied)
            .map(|e| e.version)
            .min()
    }
}

/// Merge the catalog and the ledger into a status report
///
/// A ledger entry whose version is absent from the catalog is reported as a
/// drift entry rather than omitted. A checksum mismatch between a ledger
/// entry and its script is an error: the script was edited after deployment.
pub(crate) fn build_report(
    catalog: &Catalog,
    applied: &[LedgerEntry],
) -> Result<StatusReport, MigrationError> {
    let by_version: HashMap<i64, &LedgerEntry> =
        applied.iter().map(|e| (e.version, e)).collect();

    let mut entries = Vec::with_capacity(catalog.len() + applied.len());

    for script in catalog.scripts() {
        match by_version.get(&script.version) {
            Some(entry) => {
                if entry.checksum != script.checksum {
                    return Err(MigrationError::ChecksumMismatch {
                        version: script.version,
                        name: script.name.clone(),
                        stored: entry.checksum.clone(),
                        current: script.checksum.clone(),
                    });
                }
                entries.push(StatusEntry {
                    version: script.version,
                    name: script.name.clone(),
                    applied: true,
                    applied_at: Some(entry.applied_at),
                    drift: false,
                });
            }
            None => entries.push(StatusEntry {
                version: script.version,
                name: script.name.clone(),
                applied: false,
                applied_at: None,
                drift: false,
            }),
        }
    }

    for entry in applied {
        if !catalog.contains(entry.version) {
            entries.push(StatusEntry {
                version: entry.version,
                name: entry.name.clone(),
                applied: true,
                applied_at: Some(entry.applied_at),
                drift: true,
            });
        }
    }

    entries.sort_by_key(|e| e.version);

    Ok(StatusReport { entries })
}
