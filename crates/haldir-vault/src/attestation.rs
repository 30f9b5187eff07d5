//! The attestation: the signed statement binding a skill's integrity hash,
//! permissions hash, and identity metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload type used verbatim in PAE framing and in the envelope's
/// `payloadType` field.
pub const ATTESTATION_PAYLOAD_TYPE: &str = "application/vnd.haldir.attestation+json";

/// Supported attestation schema versions.
pub const ATTESTATION_SCHEMA_VERSION: u32 = 1;

/// Critical-field names the verifier recognizes. Empty: every entry in
/// `_critical` is unknown and fails verification.
pub const KNOWN_CRITICAL_FIELDS: &[&str] = &[];

/// Identity of the skill being attested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SkillRef {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SkillRef {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }
}

/// The signed payload.
///
/// `integrity_hash` is SHA-256 over the canonicalized integrity manifest
/// bytes; `permissions_hash` over the canonicalized permissions document.
/// The on-disk manifests MUST reproduce those hashes exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Attestation {
    pub schema_version: u32,
    pub skill: SkillRef,
    pub integrity_hash: String,
    pub permissions_hash: String,
    pub signed_at: DateTime<Utc>,
    /// Field names the verifier MUST recognize; unknown entries fail
    /// verification.
    #[serde(rename = "_critical", skip_serializing_if = "Option::is_none")]
    pub critical: Option<Vec<String>>,
}
