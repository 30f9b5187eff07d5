//! Envelope verification: the strict fail-closed check sequence.
//!
//! Checks run in a fixed order and the first failure is terminal. Later
//! checks depend on earlier ones having succeeded, and failing fast bounds
//! attacker-controlled work: nothing signed is trusted until its signature
//! verifies, and nothing on disk is read back until its declared path is
//! screened.

use crate::attestation::{
    Attestation, ATTESTATION_PAYLOAD_TYPE, ATTESTATION_SCHEMA_VERSION, KNOWN_CRITICAL_FIELDS,
};
use crate::crypto::{hash, keys, pae};
use crate::envelope::{
    SignatureEnvelope, ATTESTATION_FILE, ENVELOPE_SCHEMA_VERSION, INTEGRITY_FILE,
    PERMISSIONS_FILE, SIGNATURE_FILE,
};
use crate::manifest::{declared_path_is_safe, IntegrityManifest, INTEGRITY_ALGORITHM};
use crate::permissions::Permissions;
use crate::result::{ErrorCode, VerifyContext, VerifyIssue, VerifyOptions, VerifyReport};
use crate::revocation;
use crate::schema;
use crate::walk::{walk_skill_dir, HardlinkMode, WalkError, VAULT_DIR};
use chrono::Utc;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Verify a skill directory's envelope.
///
/// Never panics and never returns `Err`: terminal failures are values on
/// the report, with `valid = false` and `trustLevel = none`.
pub fn verify_skill(root: &Path, options: &VerifyOptions) -> VerifyReport {
    let mut warnings = Vec::new();
    match verify_inner(root, options, &mut warnings) {
        Ok(verified) => {
            tracing::debug!(
                skill = %verified.attestation.skill.name,
                key_id = %verified.key_id,
                warnings = warnings.len(),
                "verification succeeded"
            );
            VerifyReport::success(
                verified.attestation,
                verified.permissions,
                verified.key_id,
                warnings,
            )
        }
        Err(issue) => {
            tracing::debug!(code = %issue.code, "verification failed: {}", issue.message);
            VerifyReport::failure(issue, warnings)
        }
    }
}

struct Verified {
    attestation: Attestation,
    permissions: Permissions,
    key_id: String,
}

fn verify_inner(
    root: &Path,
    options: &VerifyOptions,
    warnings: &mut Vec<crate::result::VerifyWarning>,
) -> Result<Verified, VerifyIssue> {
    let vault = root.join(VAULT_DIR);

    // 1. The vault must exist at all
    if !vault.is_dir() {
        return Err(VerifyIssue::new(
            ErrorCode::NoEnvelope,
            "skill has no vault directory",
        ));
    }

    // 2. All four artifacts must be present
    for name in [INTEGRITY_FILE, PERMISSIONS_FILE, ATTESTATION_FILE, SIGNATURE_FILE] {
        if !vault.join(name).is_file() {
            return Err(VerifyIssue::new(
                ErrorCode::Incomplete,
                format!("vault is missing {}", name),
            )
            .with_file(name));
        }
    }

    // 3. Filesystem safety before any content is trusted
    let hardlinks = hardlink_mode(options);
    walk_skill_dir(root, &options.limits, hardlinks).map_err(walk_issue)?;

    // 4. Parse and schema-validate the envelope
    let envelope_bytes = fs::read(vault.join(SIGNATURE_FILE)).map_err(|e| {
        VerifyIssue::new(
            ErrorCode::InvalidEnvelope,
            format!("failed to read {}: {}", SIGNATURE_FILE, e),
        )
        .with_file(SIGNATURE_FILE)
    })?;
    let envelope_value: serde_json::Value = serde_json::from_slice(&envelope_bytes)
        .map_err(|e| invalid_envelope(format!("{} is not valid JSON: {}", SIGNATURE_FILE, e)))?;
    schema::validate_envelope(&envelope_value)
        .map_err(|e| invalid_envelope(format!("envelope schema: {}", e)))?;
    let envelope: SignatureEnvelope = serde_json::from_value(envelope_value)
        .map_err(|e| invalid_envelope(format!("envelope parse: {}", e)))?;

    // 5. Envelope schema version must be recognized
    if envelope.schema_version != ENVELOPE_SCHEMA_VERSION {
        return Err(VerifyIssue::new(
            ErrorCode::UnsupportedVersion,
            format!("unsupported envelope schema version {}", envelope.schema_version),
        ));
    }
    if envelope.payload_type != ATTESTATION_PAYLOAD_TYPE {
        return Err(invalid_envelope(format!(
            "unexpected payload type {}",
            envelope.payload_type
        )));
    }

    // 6. Select the first trusted signature that verifies
    let payload = keys::b64url_decode(&envelope.payload).map_err(|_| {
        VerifyIssue::new(ErrorCode::DecodeFailed, "envelope payload is not base64url")
    })?;
    let framed = pae::build_pae(ATTESTATION_PAYLOAD_TYPE, &payload);

    let mut matched_trusted_key = false;
    let mut verified_key_id: Option<String> = None;
    for signature in &envelope.signatures {
        let Some(key) = options.trusted_keys.get(&signature.keyid) else {
            continue;
        };
        matched_trusted_key = true;

        let sig_bytes = keys::b64url_decode(&signature.sig).map_err(|_| {
            VerifyIssue::new(
                ErrorCode::DecodeFailed,
                format!("signature by {} is not base64url", signature.keyid),
            )
        })?;
        let sig: [u8; keys::SIGNATURE_LEN] = sig_bytes.try_into().map_err(|_| {
            VerifyIssue::new(
                ErrorCode::DecodeFailed,
                format!("signature by {} is not 64 bytes", signature.keyid),
            )
        })?;

        if keys::verify(&framed, &sig, key) {
            verified_key_id = Some(signature.keyid.clone());
            break;
        }
    }
    if !matched_trusted_key {
        return Err(VerifyIssue::new(
            ErrorCode::UnknownKey,
            "no signature keyid matches a trusted key",
        ));
    }
    let key_id = verified_key_id.ok_or_else(|| {
        VerifyIssue::new(
            ErrorCode::BadSignature,
            "no matching signature verified cryptographically",
        )
    })?;

    // 7. Parse the attestation out of the signed bytes
    let attestation_value: serde_json::Value = serde_json::from_slice(&payload).map_err(|e| {
        VerifyIssue::new(
            ErrorCode::InvalidAttestation,
            format!("signed payload is not valid JSON: {}", e),
        )
    })?;
    schema::validate_attestation(&attestation_value).map_err(|e| {
        VerifyIssue::new(ErrorCode::InvalidAttestation, format!("attestation schema: {}", e))
    })?;
    let declared_version = attestation_value
        .get("schema_version")
        .and_then(serde_json::Value::as_u64);
    if declared_version != Some(u64::from(ATTESTATION_SCHEMA_VERSION)) {
        return Err(VerifyIssue::new(
            ErrorCode::UnsupportedVersion,
            format!(
                "unsupported attestation schema version {}",
                declared_version.unwrap_or(0)
            ),
        ));
    }
    if let Some(entries) = attestation_value.get("_critical").and_then(|v| v.as_array()) {
        for entry in entries {
            let name = entry.as_str().unwrap_or_default();
            if !KNOWN_CRITICAL_FIELDS.contains(&name) {
                return Err(VerifyIssue::new(
                    ErrorCode::UnknownCritical,
                    format!("unrecognized critical field {:?}", name),
                ));
            }
        }
    }
    let attestation: Attestation = serde_json::from_value(attestation_value).map_err(|e| {
        VerifyIssue::new(ErrorCode::InvalidAttestation, format!("attestation parse: {}", e))
    })?;

    // 8. The on-disk attestation must be byte-identical to the signed
    // payload, closing tampering of the unsigned copy
    let attestation_on_disk = fs::read(vault.join(ATTESTATION_FILE)).map_err(|e| {
        integrity_mismatch(format!("failed to read {}: {}", ATTESTATION_FILE, e))
            .with_file(ATTESTATION_FILE)
    })?;
    if !hash::bytes_equal_ct(&payload, &attestation_on_disk) {
        return Err(
            integrity_mismatch("attestation.json does not match the signed payload")
                .with_file(ATTESTATION_FILE),
        );
    }

    // 9. The integrity manifest must reproduce the signed hash
    let manifest_bytes = fs::read(vault.join(INTEGRITY_FILE)).map_err(|e| {
        integrity_mismatch(format!("failed to read {}: {}", INTEGRITY_FILE, e))
            .with_file(INTEGRITY_FILE)
    })?;
    if !hash::digests_equal(
        &hash::sha256_hex_bytes(&manifest_bytes),
        &attestation.integrity_hash,
    ) {
        return Err(
            integrity_mismatch("integrity.json does not match the attested hash")
                .with_file(INTEGRITY_FILE),
        );
    }
    let manifest_value: serde_json::Value = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| invalid_integrity(format!("{} is not valid JSON: {}", INTEGRITY_FILE, e)))?;
    schema::validate_integrity(&manifest_value)
        .map_err(|e| invalid_integrity(format!("integrity schema: {}", e)))?;
    let manifest: IntegrityManifest = serde_json::from_value(manifest_value)
        .map_err(|e| invalid_integrity(format!("integrity parse: {}", e)))?;
    if manifest.schema_version != crate::manifest::INTEGRITY_SCHEMA_VERSION {
        return Err(invalid_integrity(format!(
            "unsupported integrity schema version {}",
            manifest.schema_version
        )));
    }
    if manifest.algorithm != INTEGRITY_ALGORITHM {
        return Err(invalid_integrity(format!(
            "unsupported integrity algorithm {}",
            manifest.algorithm
        )));
    }

    // 10. Every declared file: screen the path, then read and compare
    for (declared, expected) in &manifest.files {
        if !declared_path_is_safe(declared) {
            return Err(
                integrity_mismatch("declared path fails traversal safety").with_file(declared),
            );
        }
        let reader = File::open(root.join(declared)).map(BufReader::new).map_err(|e| {
            integrity_mismatch(format!("failed to read declared file: {}", e))
                .with_file(declared)
        })?;
        let actual = hash::sha256_hex_reader(reader).map_err(|e| {
            integrity_mismatch(format!("failed to hash declared file: {}", e))
                .with_file(declared)
        })?;
        if !hash::digests_equal(&actual, expected) {
            return Err(integrity_mismatch("file hash mismatch").with_file(declared));
        }
    }

    // 11. No undeclared files: a fresh walk, so nothing added between
    // steps 3 and 10 slips by
    let on_disk = walk_skill_dir(root, &options.limits, hardlinks).map_err(walk_issue)?;
    for file in &on_disk {
        if !manifest.files.contains_key(&file.rel_path) {
            return Err(VerifyIssue::new(
                ErrorCode::ExtraFiles,
                format!("file not declared in integrity manifest: {}", file.rel_path),
            )
            .with_file(&file.rel_path));
        }
    }

    // 12. Permissions: canonicalize the parsed value, then hash. The disk
    // form need not be canonical, but its semantic content must match
    let permissions_bytes = fs::read(vault.join(PERMISSIONS_FILE)).map_err(|e| {
        invalid_envelope(format!("failed to read {}: {}", PERMISSIONS_FILE, e))
    })?;
    let permissions_value: serde_json::Value = serde_json::from_slice(&permissions_bytes)
        .map_err(|e| invalid_envelope(format!("{} is not valid JSON: {}", PERMISSIONS_FILE, e)))?;
    schema::validate_permissions(&permissions_value)
        .map_err(|e| invalid_envelope(format!("permissions schema: {}", e)))?;
    let permissions: Permissions = serde_json::from_value(permissions_value)
        .map_err(|e| invalid_envelope(format!("permissions parse: {}", e)))?;
    let canonical_permissions = crate::crypto::jcs::to_vec(&permissions)
        .map_err(|e| invalid_envelope(format!("permissions canonicalization: {}", e)))?;
    if !hash::digests_equal(
        &hash::sha256_hex_bytes(&canonical_permissions),
        &attestation.permissions_hash,
    ) {
        return Err(
            integrity_mismatch("permissions.json does not match the attested hash")
                .with_file(PERMISSIONS_FILE),
        );
    }

    // 13. Revocation, against the attested identity
    let now = Utc::now();
    match options.context {
        VerifyContext::Install => revocation::evaluate_install(
            &attestation.skill.name,
            &attestation.skill.version,
            options,
            now,
        )?,
        VerifyContext::Runtime => revocation::evaluate_runtime(
            &attestation.skill.name,
            &attestation.skill.version,
            options,
            warnings,
            now,
        )?,
    }

    Ok(Verified {
        attestation,
        permissions,
        key_id,
    })
}

fn hardlink_mode(options: &VerifyOptions) -> HardlinkMode {
    // The relaxation is honored only at runtime
    if options.context == VerifyContext::Runtime && options.skip_hardlink_check {
        HardlinkMode::Allow
    } else {
        HardlinkMode::Reject
    }
}

fn walk_issue(err: WalkError) -> VerifyIssue {
    let issue = VerifyIssue::new(err.error_code(), err.to_string());
    match err.path() {
        Some(path) => issue.with_file(path),
        None => issue,
    }
}

fn invalid_envelope(message: impl Into<String>) -> VerifyIssue {
    VerifyIssue::new(ErrorCode::InvalidEnvelope, message)
}

fn invalid_integrity(message: impl Into<String>) -> VerifyIssue {
    VerifyIssue::new(ErrorCode::InvalidIntegrity, message)
}

fn integrity_mismatch(message: impl Into<String>) -> VerifyIssue {
    VerifyIssue::new(ErrorCode::IntegrityMismatch, message)
}
