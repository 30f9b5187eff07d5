//! SHA-256 content digests with the `sha256:` textual prefix.
//!
//! The prefix is part of the on-disk contract. Comparisons parse it first
//! and then compare the raw 32-byte digests in constant time.

use sha2::{Digest, Sha256};
use std::io::Read;

/// Textual prefix carried by every digest the engine emits or accepts.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Hash in-memory bytes to `sha256:<64 lowercase hex>`.
pub fn sha256_hex_bytes(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// Hash a reader in 8 KiB chunks to `sha256:<64 lowercase hex>`.
///
/// Files up to the engine's 100 MiB per-file limit are never resident in
/// memory.
pub fn sha256_hex_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("sha256:{:x}", hasher.finalize()))
}

/// Parse a `sha256:<64 lowercase hex>` digest into its raw 32 bytes.
///
/// Rejects uppercase hex: the on-disk form is lowercase only, and accepting
/// both would make one digest have two textual spellings.
pub fn parse_digest(digest: &str) -> Option<[u8; 32]> {
    let hex_part = digest.strip_prefix(DIGEST_PREFIX)?;
    if hex_part.len() != 64
        || !hex_part
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return None;
    }

    let mut out = [0_u8; 32];
    hex::decode_to_slice(hex_part, &mut out).ok()?;
    Some(out)
}

/// Compare two prefixed digests, constant-time over the digest bytes.
///
/// Malformed digests compare unequal to everything, including themselves.
pub fn digests_equal(a: &str, b: &str) -> bool {
    match (parse_digest(a), parse_digest(b)) {
        (Some(a), Some(b)) => bytes_equal_ct(&a, &b),
        _ => false,
    }
}

/// Constant-time byte equality. Lengths are public; content is not.
pub fn bytes_equal_ct(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0_u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
