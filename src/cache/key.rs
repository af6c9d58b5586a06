//! Cache key derivation
//!
//! Turns an operation name plus its call arguments into a short, fixed-length
//! identifier that is safe to use in a filename. The same (name, arguments)
//! pair always hashes to the same key, so repeated calls land on the same
//! cache entry across process restarts.

use md5::{Digest, Md5};
use serde::Serialize;

/// Number of digest bytes kept for the key (8 hex characters).
const KEY_BYTES: usize = 4;

/// A derived cache key: 8 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the key as a string slice suitable for filename use.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives a cache key from an operation name and its arguments.
///
/// The arguments are canonicalized with `serde_json::to_string`, concatenated
/// with the operation name, and MD5-hashed; the digest is truncated to 8 hex
/// characters. This is a cache key, not a security boundary, so a short
/// non-cryptographic-strength identifier is fine.
///
/// # Caller contract
///
/// Determinism only holds when the argument type serializes stably and
/// order-independently: primitives, tuples, structs, and `BTreeMap` are safe;
/// `HashMap` iteration order is unspecified and may produce a different key
/// for the same logical value on another run. This layer does not normalize
/// argument order; doing so would silently change the keys of callers that
/// already serialize stably.
///
/// # Errors
///
/// Returns the underlying `serde_json` error when the argument type cannot be
/// serialized (e.g. a map with non-string keys). Callers generally treat that
/// as "uncacheable" rather than a failure.
pub fn derive<A: Serialize>(name: &str, args: &A) -> Result<CacheKey, serde_json::Error> {
    let canonical = serde_json::to_string(args)?;
    let mut hasher = Md5::new();
    hasher.update(name.as_bytes());
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    Ok(CacheKey(hex::encode(&digest[..KEY_BYTES])))
}
