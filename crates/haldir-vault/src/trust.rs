//! Caller-supplied trusted keyring.
//!
//! The engine builds no PKI: verification trusts exactly the keys the
//! caller registers here. The keyring is a plain map because every sign or
//! verify invocation is request-scoped.

use crate::crypto::keys;
use ed25519_dalek::VerifyingKey;
use std::collections::BTreeMap;

/// Keyring errors.
#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error("invalid public key PEM: {reason}")]
    InvalidPem { reason: String },

    #[error("key id mismatch: claimed {claimed}, computed {computed}")]
    KeyIdMismatch { claimed: String, computed: String },
}

/// Trusted verifying keys, keyed by key id.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: BTreeMap<String, VerifyingKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a verifying key, deriving its key id. Returns the id.
    pub fn add_key(&mut self, key: VerifyingKey) -> Result<String, KeyringError> {
        let key_id = keys::key_id_of(&key).map_err(|e| KeyringError::InvalidPem {
            reason: e.to_string(),
        })?;
        self.keys.insert(key_id.clone(), key);
        Ok(key_id)
    }

    /// Register a PEM public key under a claimed key id.
    ///
    /// The id is recomputed from the SPKI DER and the claim must match;
    /// this prevents pinning a key under somebody else's identifier.
    pub fn add_pem(&mut self, claimed_key_id: &str, pem: &str) -> Result<String, KeyringError> {
        let key = keys::public_key_from_pem(pem).map_err(|e| KeyringError::InvalidPem {
            reason: e.to_string(),
        })?;
        let computed = keys::key_id_of(&key).map_err(|e| KeyringError::InvalidPem {
            reason: e.to_string(),
        })?;

        if computed != claimed_key_id {
            tracing::warn!(
                claimed = %claimed_key_id,
                computed = %computed,
                "rejecting keyring entry with mismatched key id"
            );
            return Err(KeyringError::KeyIdMismatch {
                claimed: claimed_key_id.to_string(),
                computed,
            });
        }

        self.keys.insert(computed.clone(), key);
        Ok(computed)
    }

    /// Look up a trusted key by id.
    pub fn get(&self, key_id: &str) -> Option<&VerifyingKey> {
        self.keys.get(key_id)
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Iterate over registered key ids.
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{generate_signing_key, key_id_of, public_key_to_pem};

    #[test]
    fn add_key_derives_id() {
        let key = generate_signing_key().verifying_key();
        let mut ring = Keyring::new();
        let id = ring.add_key(key).unwrap();

        assert_eq!(id, key_id_of(&key).unwrap());
        assert!(ring.contains(&id));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn add_pem_checks_claimed_id() {
        let key = generate_signing_key().verifying_key();
        let pem = public_key_to_pem(&key).unwrap();
        let id = key_id_of(&key).unwrap();

        let mut ring = Keyring::new();
        assert_eq!(ring.add_pem(&id, &pem).unwrap(), id);

        let err = ring.add_pem("0000deadbeef0000deadbeef0000dead", &pem);
        assert!(matches!(err, Err(KeyringError::KeyIdMismatch { .. })));
    }

    #[test]
    fn add_pem_rejects_garbage() {
        let mut ring = Keyring::new();
        let err = ring.add_pem("abc", "not a pem");
        assert!(matches!(err, Err(KeyringError::InvalidPem { .. })));
        assert!(ring.is_empty());
    }

    #[test]
    fn unknown_id_misses() {
        let ring = Keyring::new();
        assert!(ring.get("feedfacefeedfacefeedfacefeedface").is_none());
    }
}
