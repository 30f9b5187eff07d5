//! Signed revocation lists and the install/runtime trust policies.
//!
//! A list is a self-authenticating artifact: monotonically sequenced,
//! expiring, and signed over its canonicalized payload with the
//! `signature` field removed. Install evaluation fails closed (stale trust
//! data is unsafe during a deliberate administrative action); runtime
//! evaluation fails open with degraded trust, honoring a previously-known
//! good list so transient distribution outages cannot hard-fail running
//! systems.

use crate::crypto::{jcs, keys};
use crate::limits::{CLOCK_SKEW_SECS, RUNTIME_GRACE_HOURS};
use crate::result::{
    ErrorCode, VerifyIssue, VerifyOptions, VerifyWarning, WarningCode,
};
use crate::schema;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

/// Supported revocation list schema versions.
pub const REVOCATION_SCHEMA_VERSION: u32 = 1;

/// Wildcard matching every version of a skill.
pub const VERSION_WILDCARD: &str = "*";

/// Severity of a revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One revoked skill: explicit versions or the `"*"` wildcard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RevocationEntry {
    pub name: String,
    pub versions: Vec<String>,
    pub revoked_at: DateTime<Utc>,
    pub reason: String,
    pub severity: RevocationSeverity,
}

/// Detached signature over the canonicalized list payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ListSignature {
    pub keyid: String,
    /// Base64url (unpadded) Ed25519 signature.
    pub sig: String,
}

/// A signed revocation list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RevocationList {
    pub schema_version: u32,
    pub sequence_number: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
    pub entries: Vec<RevocationEntry>,
    pub signature: ListSignature,
}

impl RevocationList {
    /// Parse a list from JSON bytes, schema-validating before the typed
    /// parse.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).context("revocation list is not valid JSON")?;
        schema::validate_revocation_list(&value)
            .context("revocation list failed schema validation")?;
        serde_json::from_value(value).context("failed to parse revocation list")
    }

    /// True when any entry names this skill and covers this version
    /// (explicitly or via the wildcard).
    pub fn is_revoked(&self, name: &str, version: &str) -> bool {
        self.entries.iter().any(|entry| {
            entry.name == name
                && entry
                    .versions
                    .iter()
                    .any(|v| v == VERSION_WILDCARD || v == version)
        })
    }
}

/// Unsigned list content; [`RevocationListDraft::sign`] completes it.
#[derive(Debug, Clone)]
pub struct RevocationListDraft {
    pub sequence_number: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
    pub entries: Vec<RevocationEntry>,
}

impl RevocationListDraft {
    /// A draft issued now, valid for `valid_for`, with `next_update`
    /// halfway through the window.
    pub fn new(sequence_number: u64, valid_for: Duration, entries: Vec<RevocationEntry>) -> Self {
        let issued_at = Utc::now();
        Self {
            sequence_number,
            issued_at,
            expires_at: issued_at + valid_for,
            next_update: issued_at + valid_for / 2,
            entries,
        }
    }

    /// Sign the draft, producing a distributable list.
    pub fn sign(self, signing_key: &SigningKey) -> Result<RevocationList> {
        let keyid = keys::key_id_of(&signing_key.verifying_key())?;
        let mut list = RevocationList {
            schema_version: REVOCATION_SCHEMA_VERSION,
            sequence_number: self.sequence_number,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            next_update: self.next_update,
            entries: self.entries,
            signature: ListSignature {
                keyid,
                sig: String::new(),
            },
        };

        let payload = signable_bytes(&list)?;
        list.signature.sig = keys::b64url_encode(&keys::sign(&payload, signing_key));
        Ok(list)
    }
}

/// Canonical bytes of the list with the `signature` field removed.
fn signable_bytes(list: &RevocationList) -> Result<Vec<u8>> {
    let mut value = serde_json::to_value(list).context("failed to serialize revocation list")?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("signature");
    }
    jcs::to_vec(&value)
}

/// Why a list failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum ListInvalid {
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),

    #[error("signing key {0} is not trusted")]
    UnknownKey(String),

    #[error("signature does not verify")]
    BadSignature,

    #[error("sequence number must be positive")]
    SequenceNotPositive,

    #[error("validity window is inverted or issued in the future")]
    ValidityWindow,
}

/// Structural validity: schema version supported, signing key trusted,
/// signature verifies, sequence positive, validity window sane. Expiry is
/// deliberately NOT checked here; install and runtime treat it differently.
fn validate_structure(
    list: &RevocationList,
    trusted_keys: &crate::trust::Keyring,
    now: DateTime<Utc>,
) -> Result<(), ListInvalid> {
    if list.schema_version != REVOCATION_SCHEMA_VERSION {
        return Err(ListInvalid::UnsupportedVersion(list.schema_version));
    }

    let key = trusted_keys
        .get(&list.signature.keyid)
        .ok_or_else(|| ListInvalid::UnknownKey(list.signature.keyid.clone()))?;

    let payload = signable_bytes(list).map_err(|_| ListInvalid::BadSignature)?;
    let sig_bytes = keys::b64url_decode(&list.signature.sig)
        .ok()
        .and_then(|b| <[u8; 64]>::try_from(b).ok())
        .ok_or(ListInvalid::BadSignature)?;
    if !keys::verify(&payload, &sig_bytes, key) {
        return Err(ListInvalid::BadSignature);
    }

    if list.sequence_number < 1 {
        return Err(ListInvalid::SequenceNotPositive);
    }

    let skew = Duration::seconds(CLOCK_SKEW_SECS);
    if list.issued_at >= list.expires_at || list.issued_at > now + skew {
        return Err(ListInvalid::ValidityWindow);
    }

    Ok(())
}

fn is_expired(list: &RevocationList, now: DateTime<Utc>, grace: Duration) -> bool {
    now > list.expires_at + Duration::seconds(CLOCK_SKEW_SECS) + grace
}

fn rolled_back(list: &RevocationList, cached_sequence_number: Option<u64>) -> bool {
    cached_sequence_number.is_some_and(|cached| list.sequence_number <= cached)
}

/// Install policy: fail closed.
///
/// A missing, invalid, expired, or rolled-back list is as fatal as an
/// actual revocation.
pub(crate) fn evaluate_install(
    name: &str,
    version: &str,
    options: &VerifyOptions,
    now: DateTime<Utc>,
) -> Result<(), VerifyIssue> {
    let Some(list) = options.revocation_list.as_ref() else {
        return Err(VerifyIssue::new(
            ErrorCode::RevocationStale,
            "no revocation list provided at install",
        ));
    };

    if let Err(reason) = validate_structure(list, &options.trusted_keys, now) {
        return Err(VerifyIssue::new(
            ErrorCode::RevocationStale,
            format!("revocation list is not valid: {}", reason),
        ));
    }

    if is_expired(list, now, Duration::zero()) {
        return Err(VerifyIssue::new(
            ErrorCode::RevocationStale,
            "revocation list has expired",
        ));
    }

    if rolled_back(list, options.cached_sequence_number) {
        return Err(VerifyIssue::new(
            ErrorCode::RevocationStale,
            format!(
                "revocation list sequence {} does not advance past cached {}",
                list.sequence_number,
                options.cached_sequence_number.unwrap_or(0)
            ),
        ));
    }

    if list.is_revoked(name, version) {
        return Err(revoked_issue(name, version));
    }

    Ok(())
}

/// Runtime policy: fail open with degraded trust.
///
/// A last-valid list is consulted only after it re-verifies under the
/// trusted keyring and is within the runtime grace period.
pub(crate) fn evaluate_runtime(
    name: &str,
    version: &str,
    options: &VerifyOptions,
    warnings: &mut Vec<VerifyWarning>,
    now: DateTime<Utc>,
) -> Result<(), VerifyIssue> {
    let grace = Duration::hours(RUNTIME_GRACE_HOURS);

    let fallback = options.last_valid_revocation_list.as_ref().filter(|list| {
        validate_structure(list, &options.trusted_keys, now).is_ok()
            && !is_expired(list, now, grace)
    });

    let check_fallback = |warnings: &mut Vec<VerifyWarning>,
                          warning: VerifyWarning|
     -> Result<(), VerifyIssue> {
        if let Some(last_valid) = fallback {
            if last_valid.is_revoked(name, version) {
                return Err(revoked_issue(name, version));
            }
        }
        tracing::warn!(code = %warning.code, "degraded trust: {}", warning.message);
        warnings.push(warning);
        Ok(())
    };

    let Some(list) = options.revocation_list.as_ref() else {
        return check_fallback(
            warnings,
            VerifyWarning::new(
                WarningCode::RevocationUnavailable,
                "no revocation list available at runtime",
            ),
        );
    };

    if let Err(reason) = validate_structure(list, &options.trusted_keys, now) {
        return check_fallback(
            warnings,
            VerifyWarning::new(
                WarningCode::RevocationSigInvalid,
                format!("revocation list did not verify: {}", reason),
            ),
        );
    }

    if rolled_back(list, options.cached_sequence_number) {
        return check_fallback(
            warnings,
            VerifyWarning::new(
                WarningCode::RevocationStale,
                format!(
                    "revocation list sequence {} does not advance past cached {}",
                    list.sequence_number,
                    options.cached_sequence_number.unwrap_or(0)
                ),
            ),
        );
    }

    if list.is_revoked(name, version) {
        return Err(revoked_issue(name, version));
    }

    if is_expired(list, now, grace) {
        return Err(VerifyIssue::new(
            ErrorCode::RevocationStale,
            "revocation list expired beyond the runtime grace period",
        ));
    }

    if is_expired(list, now, Duration::zero()) {
        let warning = VerifyWarning::new(
            WarningCode::RevocationStale,
            "revocation list expired within the runtime grace period",
        );
        tracing::warn!(code = %warning.code, "degraded trust: {}", warning.message);
        warnings.push(warning);
    }

    Ok(())
}

fn revoked_issue(name: &str, version: &str) -> VerifyIssue {
    VerifyIssue::new(
        ErrorCode::Revoked,
        format!("skill {}@{} is revoked", name, version),
    )
}
