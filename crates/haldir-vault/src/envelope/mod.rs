//! The DSSE-style signature envelope and its vault layout.

mod sign;
mod verify;

pub use sign::{append_signature, sign_skill, sign_skill_at, SignOutcome};
pub use verify::verify_skill;

use serde::{Deserialize, Serialize};

/// Vault artifact filenames.
pub const INTEGRITY_FILE: &str = "integrity.json";
pub const PERMISSIONS_FILE: &str = "permissions.json";
pub const ATTESTATION_FILE: &str = "attestation.json";
pub const SIGNATURE_FILE: &str = "signature.json";

/// Reserved filename for keyless signing bundles. Recognized so its
/// presence in the vault is never an error; verification of such bundles
/// is delegated elsewhere.
pub const SIGSTORE_BUNDLE_FILE: &str = "sigstore-bundle.json";

/// Supported envelope schema versions.
pub const ENVELOPE_SCHEMA_VERSION: u32 = 1;

/// One signature over the envelope payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeSignature {
    pub keyid: String,
    /// Base64url (unpadded) 64-byte Ed25519 signature over the PAE.
    pub sig: String,
}

/// The DSSE-1 envelope stored as `signature.json`.
///
/// `payload` is the base64url form of the exact canonical attestation
/// bytes; those same bytes are stored verbatim as `attestation.json`, and
/// verification requires the two to be byte-equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SignatureEnvelope {
    pub schema_version: u32,
    #[serde(rename = "payloadType")]
    pub payload_type: String,
    pub payload: String,
    pub signatures: Vec<EnvelopeSignature>,
}
