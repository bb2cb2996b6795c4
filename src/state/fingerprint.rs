//! Content fingerprints.

use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 of `content`.
///
/// Used only to detect changes between runs, not as a security boundary.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
