//! Checksum calculation for migration scripts

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 checksum of a script's content
///
/// Used to detect migration scripts that were modified after being applied
/// to the database.
///
/// # Returns
///
/// Returns the hexadecimal SHA-256 hash of the content.
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();

    format!("{:x}", hash)
}
