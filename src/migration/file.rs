//! Migration script discovery and parsing

use crate::migration::checksum::checksum;
use crate::migration::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name pattern: `m{YYYYMMDDHHMMSS}_{name}.up.sql` / `.down.sql`
static SCRIPT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^m(\d{14})_(.+)\.(up|down)\.sql$").unwrap());

/// Whether a file holds the forward or the reverse statement sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Up,
    Down,
}

/// A migration loaded from the script directory
///
/// Immutable once loaded for a run. A missing `down_sql` marks the migration
/// as non-reversible.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MigrationScript {
    /// Migration version (timestamp: YYYYMMDDHHMMSS)
    pub version: i64,

    /// Human-readable migration name
    pub name: String,

    /// Path to the up script
    pub path: PathBuf,

    /// Forward statement sequence
    pub up_sql: String,

    /// Reverse statement sequence, absent for non-reversible migrations
    pub down_sql: Option<String>,

    /// SHA-256 checksum of the up script content
    pub checksum: String,
}

/// Parse a script file name into version, name and kind
///
/// Expected format: `m{YYYYMMDDHHMMSS}_{name}.up.sql` or `.down.sql`
///
/// # Example
/// - `m20240120120000_create_accounts.up.sql` -> (20240120120000, "create_accounts", Up)
///
/// # Errors
///
/// Returns `MigrationError::Catalog` naming the file when it does not match
/// the expected pattern. Callers must not retry: this is an author error.
pub fn parse_filename(filename: &str) -> Result<(i64, String, ScriptKind), MigrationError> {
    let caps = SCRIPT_NAME_RE.captures(filename).ok_or_else(|| {
        MigrationError::Catalog {
            file: filename.to_string(),
            reason: "file name does not match pattern m{YYYYMMDDHHMMSS}_{name}.up.sql/.down.sql"
                .to_string(),
        }
    })?;

    let version_str = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let name = caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();
    let kind = match caps.get(3).map(|m| m.as_str()) {
        Some("up") => ScriptKind::Up,
        _ => ScriptKind::Down,
    };

    let version = version_str
        .parse::<i64>()
        .map_err(|e| MigrationError::Catalog {
            file: filename.to_string(),
            reason: format!("version is not a valid timestamp: {e}"),
        })?;

    Ok((version, name, kind))
}

struct ScriptHalf {
    name: String,
    path: PathBuf,
    sql: String,
}

/// Discover all migration scripts in a directory
///
/// Scans for files matching `m{YYYYMMDDHHMMSS}_{name}.up.sql`, pairs each with
/// its optional `.down.sql` counterpart, and returns the scripts sorted by
/// version (ascending). Files without a `.sql` extension are ignored.
///
/// # Errors
///
/// Returns `MigrationError::Catalog` when:
/// - the directory is missing or unreadable
/// - a `.sql` file name does not match the expected pattern
/// - two files claim the same version
/// - a down script has no up counterpart, or its name disagrees with the up script
pub fn discover_scripts(scripts_dir: &Path) -> Result<Vec<MigrationScript>, MigrationError> {
    if !scripts_dir.is_dir() {
        return Err(MigrationError::Catalog {
            file: scripts_dir.display().to_string(),
            reason: "migration directory does not exist or is not a directory".to_string(),
        });
    }

    let entries = fs::read_dir(scripts_dir).map_err(|e| MigrationError::Catalog {
        file: scripts_dir.display().to_string(),
        reason: format!("failed to read migration directory: {e}"),
    })?;

    let mut ups: BTreeMap<i64, ScriptHalf> = BTreeMap::new();
    let mut downs: BTreeMap<i64, ScriptHalf> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::Catalog {
            file: scripts_dir.display().to_string(),
            reason: format!("failed to read directory entry: {e}"),
        })?;

        let path = entry.path();

        // Only .sql files participate; editors and VCS drop other files here
        if path.extension().and_then(|s| s.to_str()) != Some("sql") {
            continue;
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MigrationError::Catalog {
                file: path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            })?
            .to_string();

        let (version, name, kind) = parse_filename(&filename)?;

        let sql = fs::read_to_string(&path).map_err(|e| MigrationError::Catalog {
            file: filename.clone(),
            reason: format!("failed to read script: {e}"),
        })?;

        let half = ScriptHalf { name, path, sql };
        let bucket = match kind {
            ScriptKind::Up => &mut ups,
            ScriptKind::Down => &mut downs,
        };

        if let Some(previous) = bucket.insert(version, half) {
            return Err(MigrationError::Catalog {
                file: filename,
                reason: format!(
                    "duplicate version {} (also claimed by {})",
                    version,
                    previous.path.display()
                ),
            });
        }
    }

    let mut scripts = Vec::with_capacity(ups.len());

    for (version, up) in ups {
        let down_sql = match downs.remove(&version) {
            Some(down) => {
                if down.name != up.name {
                    return Err(MigrationError::Catalog {
                        file: down.path.display().to_string(),
                        reason: format!(
                            "down script name '{}' does not match up script name '{}'",
                            down.name, up.name
                        ),
                    });
                }
                Some(down.sql)
            }
            None => None,
        };

        let checksum = checksum(&up.sql);
        scripts.push(MigrationScript {
            version,
            name: up.name,
            path: up.path,
            up_sql: up.sql,
            down_sql,
            checksum,
        });
    }

    // Any down script left over has no up counterpart
    if let Some((version, orphan)) = downs.into_iter().next() {
        return Err(MigrationError::Catalog {
            file: orphan.path.display().to_string(),
            reason: format!("down script for version {} has no up counterpart", version),
        });
    }

    Ok(scripts)
}
