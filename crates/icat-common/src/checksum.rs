//! Checksum strings
//!
//! The catalog reports checksums as `<scheme>:<digest>` (for example
//! `sha2:Xw9...=`). Comparisons only look at the digest part.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

/// Scheme prefix used for SHA-256 checksums
pub const SHA2_SCHEME: &str = "sha2";

/// Compute the catalog's SHA-256 checksum string for `data`
#[must_use]
pub fn sha2_checksum(data: &[u8]) -> String {
    format!("{SHA2_SCHEME}:{}", STANDARD.encode(Sha256::digest(data)))
}

/// The digest part of a checksum string: everything after the first `:`,
/// or the whole string when there is no scheme prefix
#[must_use]
pub fn digest_part(checksum: &str) -> &str {
    checksum
        .split_once(':')
        .map_or(checksum, |(_, digest)| digest)
}

/// Compare two checksum strings by digest
#[must_use]
pub fn digests_match(stored: &str, expected: &str) -> bool {
    !stored.is_empty() && digest_part(stored) == digest_part(expected)
}
