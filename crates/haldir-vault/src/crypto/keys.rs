//! Ed25519 key handling: generation, PEM/SPKI codecs, key ids, signatures.
//!
//! A key id is the first 32 hex characters (128 bits) of SHA-256 over the
//! raw SPKI public-key DER. It is stable across PEM reformatting because it
//! is derived from the DER, never from the PEM text.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 signatures are exactly 64 bytes; anything else is a decode error.
pub const SIGNATURE_LEN: usize = 64;

/// Generate a fresh Ed25519 signing key.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::thread_rng())
}

/// Compute a key id from SPKI-encoded public key DER bytes.
pub fn compute_key_id(spki_der: &[u8]) -> String {
    let hash = Sha256::digest(spki_der);
    hex::encode(&hash[..16])
}

/// Compute the key id of a verifying key.
pub fn key_id_of(key: &VerifyingKey) -> Result<String> {
    Ok(compute_key_id(&key_to_spki_der(key)?))
}

/// Convert a verifying key to SPKI DER bytes.
pub fn key_to_spki_der(key: &VerifyingKey) -> Result<Vec<u8>> {
    let doc = key
        .to_public_key_der()
        .map_err(|e| anyhow!("failed to encode public key as SPKI DER: {}", e))?;
    Ok(doc.as_bytes().to_vec())
}

/// Encode a verifying key as SPKI PEM.
pub fn public_key_to_pem(key: &VerifyingKey) -> Result<String> {
    key.to_public_key_pem(pkcs8::LineEnding::LF)
        .map_err(|e| anyhow!("failed to encode public key PEM: {}", e))
}

/// Decode a verifying key from SPKI PEM.
pub fn public_key_from_pem(pem: &str) -> Result<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem)
        .map_err(|e| anyhow!("invalid SPKI public key PEM: {}", e))
}

/// Encode a signing key as PKCS#8 PEM.
pub fn signing_key_to_pem(key: &SigningKey) -> Result<String> {
    let pem = key
        .to_pkcs8_pem(pkcs8::LineEnding::LF)
        .map_err(|e| anyhow!("failed to encode private key PEM: {}", e))?;
    Ok(pem.to_string())
}

/// Decode a signing key from PKCS#8 PEM.
pub fn signing_key_from_pem(pem: &str) -> Result<SigningKey> {
    SigningKey::from_pkcs8_pem(pem).map_err(|e| anyhow!("invalid PKCS#8 private key PEM: {}", e))
}

/// Sign bytes, returning the raw 64-byte Ed25519 signature.
pub fn sign(bytes: &[u8], key: &SigningKey) -> [u8; SIGNATURE_LEN] {
    key.sign(bytes).to_bytes()
}

/// Verify a raw 64-byte Ed25519 signature over bytes.
pub fn verify(bytes: &[u8], sig: &[u8; SIGNATURE_LEN], key: &VerifyingKey) -> bool {
    key.verify(bytes, &Signature::from_bytes(sig)).is_ok()
}

/// Base64url (unpadded) encode, used wherever signatures or payloads are
/// embedded in JSON.
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Base64url (unpadded) decode.
pub fn b64url_decode(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s)
        .context("invalid base64url encoding")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_32_lowercase_hex() {
        let key = generate_signing_key();
        let key_id = key_id_of(&key.verifying_key()).unwrap();

        assert_eq!(key_id.len(), 32);
        assert!(key_id
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn key_id_stable_across_pem_roundtrip() {
        let key = generate_signing_key();
        let verifying = key.verifying_key();
        let pem = public_key_to_pem(&verifying).unwrap();
        let restored = public_key_from_pem(&pem).unwrap();

        assert_eq!(
            key_id_of(&verifying).unwrap(),
            key_id_of(&restored).unwrap()
        );
    }

    #[test]
    fn signing_key_pem_roundtrip() {
        let key = generate_signing_key();
        let pem = signing_key_to_pem(&key).unwrap();
        let restored = signing_key_from_pem(&pem).unwrap();

        let msg = b"attestation bytes";
        assert_eq!(sign(msg, &key), sign(msg, &restored));
    }

    #[test]
    fn sign_verify_roundtrip() {
        let key = generate_signing_key();
        let sig = sign(b"payload", &key);

        assert!(verify(b"payload", &sig, &key.verifying_key()));
        assert!(!verify(b"tampered", &sig, &key.verifying_key()));
    }

    #[test]
    fn wrong_key_does_not_verify() {
        let key = generate_signing_key();
        let other = generate_signing_key();
        let sig = sign(b"payload", &key);

        assert!(!verify(b"payload", &sig, &other.verifying_key()));
    }

    #[test]
    fn signatures_are_deterministic() {
        let key = generate_signing_key();
        assert_eq!(sign(b"same input", &key), sign(b"same input", &key));
    }

    #[test]
    fn b64url_is_unpadded() {
        let encoded = b64url_encode(b"a");
        assert!(!encoded.contains('='));
        assert_eq!(b64url_decode(&encoded).unwrap(), b"a");
    }

    #[test]
    fn b64url_rejects_standard_alphabet_extras() {
        assert!(b64url_decode("a+b/").is_err());
    }
}
