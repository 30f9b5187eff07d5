//! Tamper-evident signing and trust verification for skill bundles.
//!
//! A skill is a directory containing a declarative manifest, optional
//! code, and a declared permissions document. This crate produces and
//! verifies the cryptographic envelope binding the skill's file-level
//! content hashes and permissions to a publisher identity, and enforces
//! signed revocation lists with distinct install-time (fail-closed) and
//! runtime (fail-open) trust semantics.
//!
//! The engine is single-threaded and request-scoped: each sign or verify
//! invocation is independent, holds no global state, and never mutates the
//! skill directory during verification.

pub mod attestation;
pub mod crypto;
pub mod envelope;
pub mod limits;
pub mod manifest;
pub mod permissions;
pub mod result;
pub mod revocation;
pub mod schema;
pub mod trust;
pub mod walk;

// Convenience re-exports
pub use attestation::{Attestation, SkillRef, ATTESTATION_PAYLOAD_TYPE};
pub use envelope::{
    append_signature, sign_skill, sign_skill_at, verify_skill, EnvelopeSignature,
    SignatureEnvelope, SignOutcome,
};
pub use limits::{WalkLimits, WalkLimitsOverrides};
pub use manifest::IntegrityManifest;
pub use permissions::{
    AgentCapabilities, ExecPolicy, FilesystemPolicy, NetworkMode, NetworkPolicy, Permissions,
};
pub use result::{
    ErrorCode, TrustLevel, VerifyContext, VerifyIssue, VerifyOptions, VerifyReport,
    VerifyWarning, WarningCode,
};
pub use revocation::{
    RevocationEntry, RevocationList, RevocationListDraft, RevocationSeverity,
};
pub use trust::{Keyring, KeyringError};
