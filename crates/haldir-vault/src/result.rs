//! Verification results: trust levels, stable error/warning codes, options.
//!
//! Errors never cross the public API as panics or `Err` returns; terminal
//! failures are values on the [`VerifyReport`]. Codes are stable; messages
//! are human-readable and never used for control flow.

use crate::attestation::Attestation;
use crate::limits::WalkLimits;
use crate::permissions::Permissions;
use crate::revocation::RevocationList;
use crate::trust::Keyring;
use serde::{Serialize, Serializer};

/// Trust level of a verified skill.
///
/// `Full` means all checks passed with fresh revocation data. `Degraded`
/// means verification passed but revocation data was stale or unavailable
/// at runtime. `None` means verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Full,
    Degraded,
    None,
}

/// Evaluation context. Install is fail-closed; runtime is fail-open with
/// degraded trust levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyContext {
    Install,
    Runtime,
}

/// Stable error codes for terminal verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoEnvelope,
    Incomplete,
    InvalidEnvelope,
    InvalidAttestation,
    InvalidIntegrity,
    UnsupportedVersion,
    UnknownKey,
    BadSignature,
    DecodeFailed,
    UnknownCritical,
    Symlink,
    Hardlink,
    Limits,
    IntegrityMismatch,
    ExtraFiles,
    Revoked,
    RevocationStale,
}

impl ErrorCode {
    /// The stable wire form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoEnvelope => "E_NO_ENVELOPE",
            Self::Incomplete => "E_INCOMPLETE",
            Self::InvalidEnvelope => "E_INVALID_ENVELOPE",
            Self::InvalidAttestation => "E_INVALID_ATTESTATION",
            Self::InvalidIntegrity => "E_INVALID_INTEGRITY",
            Self::UnsupportedVersion => "E_UNSUPPORTED_VERSION",
            Self::UnknownKey => "E_UNKNOWN_KEY",
            Self::BadSignature => "E_BAD_SIGNATURE",
            Self::DecodeFailed => "E_DECODE_FAILED",
            Self::UnknownCritical => "E_UNKNOWN_CRITICAL",
            Self::Symlink => "E_SYMLINK",
            Self::Hardlink => "E_HARDLINK",
            Self::Limits => "E_LIMITS",
            Self::IntegrityMismatch => "E_INTEGRITY_MISMATCH",
            Self::ExtraFiles => "E_EXTRA_FILES",
            Self::Revoked => "E_REVOKED",
            Self::RevocationStale => "E_REVOCATION_STALE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Stable warning codes for degraded-trust runtime verifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCode {
    RevocationUnavailable,
    RevocationStale,
    RevocationSigInvalid,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RevocationUnavailable => "W_REVOCATION_UNAVAILABLE",
            Self::RevocationStale => "W_REVOCATION_STALE",
            Self::RevocationSigInvalid => "W_REVOCATION_SIG_INVALID",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WarningCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A terminal verification failure.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct VerifyIssue {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl VerifyIssue {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// A non-terminal warning accumulated on a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyWarning {
    pub code: WarningCode,
    pub message: String,
}

impl VerifyWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Verification inputs. The keyring and revocation state are caller-owned;
/// the engine holds no global state across calls.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Trusted verifying keys, keyed by key id.
    pub trusted_keys: Keyring,

    /// Evaluation context (install fail-closed, runtime fail-open).
    pub context: VerifyContext,

    /// The current revocation list, if the caller has one.
    pub revocation_list: Option<RevocationList>,

    /// The last revocation list the caller successfully validated, used as
    /// a runtime fallback when the current list is missing or unverifiable.
    pub last_valid_revocation_list: Option<RevocationList>,

    /// Highest revocation sequence number previously accepted, for
    /// rollback detection. The engine reads it and reports the new value;
    /// persisting it is the caller's job.
    pub cached_sequence_number: Option<u64>,

    /// Skip the hard-link check. Honored only in runtime context.
    pub skip_hardlink_check: bool,

    /// Traversal resource limits.
    pub limits: WalkLimits,
}

impl VerifyOptions {
    /// Options for a fail-closed install-time verification.
    pub fn install(trusted_keys: Keyring) -> Self {
        Self::new(trusted_keys, VerifyContext::Install)
    }

    /// Options for a fail-open runtime verification.
    pub fn runtime(trusted_keys: Keyring) -> Self {
        Self::new(trusted_keys, VerifyContext::Runtime)
    }

    fn new(trusted_keys: Keyring, context: VerifyContext) -> Self {
        Self {
            trusted_keys,
            context,
            revocation_list: None,
            last_valid_revocation_list: None,
            cached_sequence_number: None,
            skip_hardlink_check: false,
            limits: WalkLimits::default(),
        }
    }

    pub fn with_revocation_list(mut self, list: RevocationList) -> Self {
        self.revocation_list = Some(list);
        self
    }

    pub fn with_last_valid_revocation_list(mut self, list: RevocationList) -> Self {
        self.last_valid_revocation_list = Some(list);
        self
    }

    pub fn with_cached_sequence_number(mut self, sequence_number: u64) -> Self {
        self.cached_sequence_number = Some(sequence_number);
        self
    }

    pub fn with_skip_hardlink_check(mut self, skip: bool) -> Self {
        self.skip_hardlink_check = skip;
        self
    }

    pub fn with_limits(mut self, limits: WalkLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// The consumer-facing verification result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub valid: bool,
    pub trust_level: TrustLevel,
    pub key_id: Option<String>,
    pub warnings: Vec<VerifyWarning>,
    pub errors: Vec<VerifyIssue>,
    pub attestation: Option<Attestation>,
    pub permissions: Option<Permissions>,
}

impl VerifyReport {
    pub(crate) fn failure(issue: VerifyIssue, warnings: Vec<VerifyWarning>) -> Self {
        Self {
            valid: false,
            trust_level: TrustLevel::None,
            key_id: None,
            warnings,
            errors: vec![issue],
            attestation: None,
            permissions: None,
        }
    }

    pub(crate) fn success(
        attestation: Attestation,
        permissions: Permissions,
        key_id: String,
        warnings: Vec<VerifyWarning>,
    ) -> Self {
        let trust_level = if warnings.is_empty() {
            TrustLevel::Full
        } else {
            TrustLevel::Degraded
        };
        Self {
            valid: true,
            trust_level,
            key_id: Some(key_id),
            warnings,
            errors: Vec::new(),
            attestation: Some(attestation),
            permissions: Some(permissions),
        }
    }

    /// The terminal error code, if verification failed.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.errors.first().map(|e| e.code)
    }

    /// True when any warning carries the given code.
    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}
