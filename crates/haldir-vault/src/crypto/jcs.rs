//! JSON Canonicalization Scheme (RFC 8785) implementation.
//!
//! Every hash and signature in the vault is computed over canonical bytes.
//! Uses `serde_jcs` which guarantees:
//!
//! - Lexicographic key ordering (UTF-16 code units, per RFC 8785)
//! - No insignificant whitespace
//! - UTF-8 encoding
//! - IEEE 754 number normalization (1.0 → 1, -0 → 0)

use anyhow::{Context, Result};
use serde::Serialize;

/// Serialize a value to JCS (RFC 8785) canonical JSON bytes.
///
/// Two semantically equal values always produce identical bytes, which is
/// the only defense against equivalent-but-bytewise-different payloads
/// breaking signature verification or hash binding.
///
/// # Example
///
/// ```
/// use haldir_vault::crypto::jcs;
/// use serde_json::json;
///
/// let value = json!({"version": 2, "name": "fetcher"});
/// let bytes = jcs::to_vec(&value).unwrap();
/// assert_eq!(bytes, br#"{"name":"fetcher","version":2}"#);
/// ```
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_jcs::to_vec(value).context("failed to serialize canonical json")
}

/// Serialize to JCS canonical JSON string.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    serde_jcs::to_string(value).context("failed to serialize canonical json string")
}
