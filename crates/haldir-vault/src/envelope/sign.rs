//! Envelope construction: the atomic signing operation and co-signing.

use crate::attestation::{Attestation, SkillRef, ATTESTATION_PAYLOAD_TYPE};
use crate::crypto::{hash, jcs, keys, pae};
use crate::envelope::{
    EnvelopeSignature, SignatureEnvelope, ATTESTATION_FILE, ENVELOPE_SCHEMA_VERSION,
    INTEGRITY_FILE, PERMISSIONS_FILE, SIGNATURE_FILE,
};
use crate::limits::WalkLimits;
use crate::manifest::IntegrityManifest;
use crate::permissions::Permissions;
use crate::trust::Keyring;
use crate::walk::{walk_skill_dir, HardlinkMode, VAULT_DIR};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use std::fs;
use std::path::Path;

/// What a signing operation produced.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub attestation: Attestation,
    pub key_id: String,
}

/// Sign a skill directory, writing the four envelope artifacts to its
/// vault.
///
/// Signing is strict regardless of context: symlinks, hard links, and
/// limit breaches abort before anything is written.
pub fn sign_skill(
    root: &Path,
    skill: &SkillRef,
    permissions: &Permissions,
    signing_key: &SigningKey,
) -> Result<SignOutcome> {
    sign_skill_at(root, skill, permissions, signing_key, Utc::now())
}

/// [`sign_skill`] with an explicit timestamp, recorded as both the
/// manifest's `generated_at` and the attestation's `signed_at`. Signing is
/// deterministic given the same directory contents, key, and timestamp.
pub fn sign_skill_at(
    root: &Path,
    skill: &SkillRef,
    permissions: &Permissions,
    signing_key: &SigningKey,
    at: DateTime<Utc>,
) -> Result<SignOutcome> {
    let files = walk_skill_dir(root, &WalkLimits::default(), HardlinkMode::Reject)
        .context("skill directory failed safety checks")?;

    // Everything is computed before anything is written
    let manifest = IntegrityManifest::generate(&files, at)?;
    let manifest_bytes = jcs::to_vec(&manifest)?;
    let integrity_hash = hash::sha256_hex_bytes(&manifest_bytes);

    let permissions_bytes = jcs::to_vec(permissions)?;
    let permissions_hash = hash::sha256_hex_bytes(&permissions_bytes);

    let attestation = Attestation {
        schema_version: crate::attestation::ATTESTATION_SCHEMA_VERSION,
        skill: skill.clone(),
        integrity_hash,
        permissions_hash,
        signed_at: at,
        critical: None,
    };
    let payload = jcs::to_vec(&attestation)?;

    let signed = keys::sign(
        &pae::build_pae(ATTESTATION_PAYLOAD_TYPE, &payload),
        signing_key,
    );
    let key_id = keys::key_id_of(&signing_key.verifying_key())?;

    let envelope = SignatureEnvelope {
        schema_version: ENVELOPE_SCHEMA_VERSION,
        payload_type: ATTESTATION_PAYLOAD_TYPE.to_string(),
        payload: keys::b64url_encode(&payload),
        signatures: vec![EnvelopeSignature {
            keyid: key_id.clone(),
            sig: keys::b64url_encode(&signed),
        }],
    };

    let vault = root.join(VAULT_DIR);
    fs::create_dir_all(&vault).context("failed to create vault directory")?;
    fs::write(vault.join(INTEGRITY_FILE), &manifest_bytes)?;
    // The permissions file is the publisher-facing copy; only its
    // canonicalized form is hashed, so it is written readable
    fs::write(
        vault.join(PERMISSIONS_FILE),
        serde_json::to_vec_pretty(permissions)?,
    )?;
    // Exact canonical signed bytes; byte identity with the envelope
    // payload is load-bearing for verification
    fs::write(vault.join(ATTESTATION_FILE), &payload)?;
    fs::write(
        vault.join(SIGNATURE_FILE),
        serde_json::to_vec_pretty(&envelope)?,
    )?;

    tracing::debug!(
        skill = %skill.name,
        version = %skill.version,
        key_id = %key_id,
        files = files.len(),
        "signed skill directory"
    );

    Ok(SignOutcome {
        attestation,
        key_id,
    })
}

/// Append a co-signature to an existing envelope.
///
/// The caller must supply a keyring sufficient to verify the existing
/// envelope; the attestation payload is reused and only the signatures
/// array grows. A keyid already present is rejected.
pub fn append_signature(
    root: &Path,
    trusted_keys: &Keyring,
    signing_key: &SigningKey,
) -> Result<SignOutcome> {
    let vault = root.join(VAULT_DIR);
    let envelope_bytes =
        fs::read(vault.join(SIGNATURE_FILE)).context("failed to read signature.json")?;
    let mut envelope: SignatureEnvelope =
        serde_json::from_slice(&envelope_bytes).context("failed to parse signature.json")?;

    if envelope.schema_version != ENVELOPE_SCHEMA_VERSION {
        bail!("unsupported envelope schema version {}", envelope.schema_version);
    }
    if envelope.payload_type != ATTESTATION_PAYLOAD_TYPE {
        bail!("unexpected payload type {}", envelope.payload_type);
    }

    let payload = keys::b64url_decode(&envelope.payload)?;
    let framed = pae::build_pae(ATTESTATION_PAYLOAD_TYPE, &payload);

    // The existing envelope must verify under the supplied keyring
    let verified = envelope.signatures.iter().any(|s| {
        let Some(key) = trusted_keys.get(&s.keyid) else {
            return false;
        };
        keys::b64url_decode(&s.sig)
            .ok()
            .and_then(|b| <[u8; 64]>::try_from(b).ok())
            .is_some_and(|sig| keys::verify(&framed, &sig, key))
    });
    if !verified {
        bail!("existing envelope does not verify under the supplied keyring");
    }

    // The on-disk attestation must be the signed bytes
    let attestation_bytes =
        fs::read(vault.join(ATTESTATION_FILE)).context("failed to read attestation.json")?;
    if !hash::bytes_equal_ct(&payload, &attestation_bytes) {
        bail!("attestation.json does not match the envelope payload");
    }
    let attestation: Attestation =
        serde_json::from_slice(&payload).context("failed to parse attestation payload")?;

    let key_id = keys::key_id_of(&signing_key.verifying_key())?;
    if envelope.signatures.iter().any(|s| s.keyid == key_id) {
        bail!("key {} has already signed this envelope", key_id);
    }

    let signed = keys::sign(&framed, signing_key);
    envelope.signatures.push(EnvelopeSignature {
        keyid: key_id.clone(),
        sig: keys::b64url_encode(&signed),
    });
    fs::write(
        vault.join(SIGNATURE_FILE),
        serde_json::to_vec_pretty(&envelope)?,
    )?;

    tracing::debug!(
        skill = %attestation.skill.name,
        key_id = %key_id,
        signatures = envelope.signatures.len(),
        "appended co-signature"
    );

    Ok(SignOutcome {
        attestation,
        key_id,
    })
}
