//! End-to-end envelope tests: sign a real directory, then verify it and
//! every tampering variation of it.

use haldir_vault::crypto::{hash, jcs, keys, pae};
use haldir_vault::{
    sign_skill, verify_skill, Attestation, EnvelopeSignature, ErrorCode, IntegrityManifest,
    Keyring, Permissions, SignatureEnvelope, SkillRef, TrustLevel, VerifyOptions, WarningCode,
    ATTESTATION_PAYLOAD_TYPE,
};
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn skill_ref() -> SkillRef {
    SkillRef::new("e2e-skill", "1.0.0", "tool")
}

/// A signed skill directory with a small realistic tree.
fn signed_skill() -> (tempfile::TempDir, ed25519_dalek::SigningKey) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", b"# Test Skill");
    write(dir.path(), "src/fetch.py", b"import urllib\n");
    write(dir.path(), "src/data/hosts.txt", b"api.example.com\n");

    let key = keys::generate_signing_key();
    sign_skill(dir.path(), &skill_ref(), &Permissions::default(), &key).unwrap();
    (dir, key)
}

fn keyring_for(key: &ed25519_dalek::SigningKey) -> Keyring {
    let mut ring = Keyring::new();
    ring.add_key(key.verifying_key()).unwrap();
    ring
}

#[test]
fn test_sign_then_verify_runtime_degraded() {
    // No revocation list at runtime: valid but degraded
    let (dir, key) = signed_skill();
    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));

    assert!(report.valid, "errors: {:?}", report.errors);
    assert_eq!(report.trust_level, TrustLevel::Degraded);
    assert!(report.has_warning(WarningCode::RevocationUnavailable));
    assert_eq!(
        report.key_id.as_deref(),
        Some(keys::key_id_of(&key.verifying_key()).unwrap().as_str())
    );
    assert_eq!(report.attestation.unwrap().skill.name, "e2e-skill");
    assert!(report.permissions.is_some());
}

#[test]
fn test_single_byte_tamper_detected() {
    let (dir, key) = signed_skill();
    write(dir.path(), "SKILL.md", b"# Tampered!!");

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert!(!report.valid);
    assert_eq!(report.trust_level, TrustLevel::None);
    assert_eq!(report.error_code(), Some(ErrorCode::IntegrityMismatch));
    assert_eq!(report.errors[0].file.as_deref(), Some("SKILL.md"));
}

#[test]
fn test_nested_file_tamper_detected() {
    let (dir, key) = signed_skill();
    let path = dir.path().join("src/data/hosts.txt");
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] ^= 0x01;
    fs::write(&path, bytes).unwrap();

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert_eq!(report.error_code(), Some(ErrorCode::IntegrityMismatch));
    assert_eq!(report.errors[0].file.as_deref(), Some("src/data/hosts.txt"));
}

#[test]
fn test_extra_file_detected() {
    let (dir, key) = signed_skill();
    write(dir.path(), "extra.txt", b"added after signing");

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert_eq!(report.error_code(), Some(ErrorCode::ExtraFiles));
    assert_eq!(report.errors[0].file.as_deref(), Some("extra.txt"));
}

#[test]
fn test_deleted_file_detected() {
    let (dir, key) = signed_skill();
    fs::remove_file(dir.path().join("src/fetch.py")).unwrap();

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert_eq!(report.error_code(), Some(ErrorCode::IntegrityMismatch));
    assert_eq!(report.errors[0].file.as_deref(), Some("src/fetch.py"));
}

#[cfg(unix)]
#[test]
fn test_symlink_injection_detected() {
    let (dir, key) = signed_skill();
    std::os::unix::fs::symlink("SKILL.md", dir.path().join("src/link.md")).unwrap();

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert_eq!(report.error_code(), Some(ErrorCode::Symlink));
}

#[cfg(unix)]
#[test]
fn test_hardlink_policy_by_context() {
    let outside = tempfile::tempdir().unwrap();
    let (dir, key) = signed_skill();
    // Link from outside the skill: link count rises without a new dir entry
    fs::hard_link(dir.path().join("SKILL.md"), outside.path().join("alias.md")).unwrap();

    let report = verify_skill(dir.path(), &VerifyOptions::install(keyring_for(&key)));
    assert_eq!(report.error_code(), Some(ErrorCode::Hardlink));

    // Runtime may relax the check explicitly; content is still verified
    let report = verify_skill(
        dir.path(),
        &VerifyOptions::runtime(keyring_for(&key)).with_skip_hardlink_check(true),
    );
    assert!(report.valid, "errors: {:?}", report.errors);

    // The relaxation is not honored at install
    let report = verify_skill(
        dir.path(),
        &VerifyOptions::install(keyring_for(&key)).with_skip_hardlink_check(true),
    );
    assert_eq!(report.error_code(), Some(ErrorCode::Hardlink));
}

#[test]
fn test_untrusted_signer_is_unknown_key() {
    // Trusting a different key yields E_UNKNOWN_KEY, not E_BAD_SIGNATURE:
    // the envelope's keyid never matched anything we trust
    let (dir, _key) = signed_skill();
    let stranger = keys::generate_signing_key();

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&stranger)));
    assert_eq!(report.error_code(), Some(ErrorCode::UnknownKey));
}

#[test]
fn test_matched_key_with_forged_signature_is_bad_signature() {
    let (dir, key) = signed_skill();
    let sig_path = dir.path().join(".vault/signature.json");
    let mut envelope: SignatureEnvelope =
        serde_json::from_slice(&fs::read(&sig_path).unwrap()).unwrap();
    // Keep the trusted keyid but replace the signature with a valid-length forgery
    let forger = keys::generate_signing_key();
    envelope.signatures[0].sig = keys::b64url_encode(&keys::sign(b"other bytes", &forger));
    fs::write(&sig_path, serde_json::to_vec(&envelope).unwrap()).unwrap();

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert_eq!(report.error_code(), Some(ErrorCode::BadSignature));
}

#[test]
fn test_multi_signature_second_key_suffices() {
    let (dir, publisher) = signed_skill();
    let auditor = keys::generate_signing_key();
    haldir_vault::append_signature(dir.path(), &keyring_for(&publisher), &auditor).unwrap();

    // Trusting only the co-signer verifies, and reports the co-signer's id
    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&auditor)));
    assert!(report.valid, "errors: {:?}", report.errors);
    assert_eq!(
        report.key_id.as_deref(),
        Some(keys::key_id_of(&auditor.verifying_key()).unwrap().as_str())
    );

    // Trusting neither signer fails closed
    let stranger = keys::generate_signing_key();
    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&stranger)));
    assert_eq!(report.error_code(), Some(ErrorCode::UnknownKey));
}

/// Build a complete, correctly signed envelope whose integrity manifest
/// declares a traversal path. The signature is genuine; only the declared
/// path is hostile.
#[test]
fn test_traversal_path_in_signed_manifest_rejected_before_read() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SKILL.md", b"# Test Skill");
    let key = keys::generate_signing_key();

    // A file outside the skill root that the hostile manifest points at
    let outside = tempfile::tempdir().unwrap();
    write(outside.path(), "outside.txt", b"outside");

    let manifest = serde_json::json!({
        "schema_version": 1,
        "algorithm": "sha256",
        "files": {
            "../outside.txt": hash::sha256_hex_bytes(b"outside"),
            "SKILL.md": hash::sha256_hex_bytes(b"# Test Skill"),
        },
        "generated_at": "2026-03-04T12:00:00Z"
    });
    let manifest_bytes = jcs::to_vec(&manifest).unwrap();

    let permissions = Permissions::default();
    let attestation = Attestation {
        schema_version: 1,
        skill: skill_ref(),
        integrity_hash: hash::sha256_hex_bytes(&manifest_bytes),
        permissions_hash: hash::sha256_hex_bytes(&jcs::to_vec(&permissions).unwrap()),
        signed_at: chrono::Utc::now(),
        critical: None,
    };
    let payload = jcs::to_vec(&attestation).unwrap();
    let framed = pae::build_pae(ATTESTATION_PAYLOAD_TYPE, &payload);
    let envelope = SignatureEnvelope {
        schema_version: 1,
        payload_type: ATTESTATION_PAYLOAD_TYPE.into(),
        payload: keys::b64url_encode(&payload),
        signatures: vec![EnvelopeSignature {
            keyid: keys::key_id_of(&key.verifying_key()).unwrap(),
            sig: keys::b64url_encode(&keys::sign(&framed, &key)),
        }],
    };

    let vault = dir.path().join(".vault");
    fs::create_dir_all(&vault).unwrap();
    fs::write(vault.join("integrity.json"), &manifest_bytes).unwrap();
    fs::write(
        vault.join("permissions.json"),
        serde_json::to_vec(&permissions).unwrap(),
    )
    .unwrap();
    fs::write(vault.join("attestation.json"), &payload).unwrap();
    fs::write(
        vault.join("signature.json"),
        serde_json::to_vec(&envelope).unwrap(),
    )
    .unwrap();

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert_eq!(report.error_code(), Some(ErrorCode::IntegrityMismatch));
    assert_eq!(report.errors[0].file.as_deref(), Some("../outside.txt"));
}

#[test]
fn test_sigstore_bundle_file_is_not_an_extra_file() {
    let (dir, key) = signed_skill();
    write(dir.path(), ".vault/sigstore-bundle.json", b"{}");

    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    assert!(report.valid, "errors: {:?}", report.errors);
}

#[test]
fn test_verification_does_not_mutate_the_skill() {
    let (dir, key) = signed_skill();
    let manifest: IntegrityManifest = serde_json::from_slice(
        &fs::read(dir.path().join(".vault/integrity.json")).unwrap(),
    )
    .unwrap();

    verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));

    let after: IntegrityManifest = serde_json::from_slice(
        &fs::read(dir.path().join(".vault/integrity.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest, after);
}

#[test]
fn test_report_serialization_shape() {
    let (dir, key) = signed_skill();
    let report = verify_skill(dir.path(), &VerifyOptions::runtime(keyring_for(&key)));
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["valid"], true);
    assert_eq!(json["trustLevel"], "degraded");
    assert!(json["keyId"].is_string());
    assert_eq!(json["warnings"][0]["code"], "W_REVOCATION_UNAVAILABLE");
    assert!(json["attestation"]["integrity_hash"]
        .as_str()
        .unwrap()
        .starts_with("sha256:"));
}
