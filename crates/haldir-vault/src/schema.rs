//! Structural validation of vault artifacts and revocation lists.
//!
//! Schemas are explicit validator functions over parsed JSON, run before
//! any cryptographic work on the artifact they cover. They check shape
//! only; version allow-lists and hash bindings are enforced by the
//! verifier, which needs to attach the right error codes.

use crate::crypto::hash;
use serde_json::{Map, Value};

/// A structural schema violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("{artifact} is not a JSON object")]
    NotAnObject { artifact: &'static str },

    #[error("missing field: {field}")]
    MissingField { field: &'static str },

    #[error("field {field} must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown field: {field}")]
    UnknownField { field: String },

    #[error("field {field} is not a sha256 digest")]
    BadDigest { field: String },

    #[error("field {field} must not be empty")]
    Empty { field: &'static str },
}

/// Validate a DSSE signature envelope.
pub fn validate_envelope(value: &Value) -> Result<(), SchemaViolation> {
    let map = as_object(value, "envelope")?;
    known_fields(map, &["schema_version", "payloadType", "payload", "signatures"])?;
    require_u64(map, "schema_version")?;
    require_str(map, "payloadType")?;
    require_str(map, "payload")?;

    let signatures = require_array(map, "signatures")?;
    if signatures.is_empty() {
        return Err(SchemaViolation::Empty { field: "signatures" });
    }
    for sig in signatures {
        let sig = as_object(sig, "envelope")?;
        known_fields(sig, &["keyid", "sig"])?;
        require_str(sig, "keyid")?;
        require_str(sig, "sig")?;
    }
    Ok(())
}

/// Validate the signed attestation payload. Unknown fields are rejected:
/// a verifier must never silently ignore content it co-signed.
pub fn validate_attestation(value: &Value) -> Result<(), SchemaViolation> {
    let map = as_object(value, "attestation")?;
    known_fields(
        map,
        &[
            "schema_version",
            "skill",
            "integrity_hash",
            "permissions_hash",
            "signed_at",
            "_critical",
        ],
    )?;
    require_u64(map, "schema_version")?;
    require_digest(map, "integrity_hash")?;
    require_digest(map, "permissions_hash")?;
    require_str(map, "signed_at")?;

    let skill = require_object(map, "skill")?;
    known_fields(skill, &["name", "version", "type"])?;
    require_str(skill, "name")?;
    require_str(skill, "version")?;
    require_str(skill, "type")?;

    if let Some(critical) = map.get("_critical") {
        let entries = critical.as_array().ok_or(SchemaViolation::WrongType {
            field: "_critical",
            expected: "an array of strings",
        })?;
        if !entries.iter().all(Value::is_string) {
            return Err(SchemaViolation::WrongType {
                field: "_critical",
                expected: "an array of strings",
            });
        }
    }
    Ok(())
}

/// Validate an integrity manifest.
pub fn validate_integrity(value: &Value) -> Result<(), SchemaViolation> {
    let map = as_object(value, "integrity manifest")?;
    known_fields(map, &["schema_version", "algorithm", "files", "generated_at"])?;
    require_u64(map, "schema_version")?;
    require_str(map, "algorithm")?;
    require_str(map, "generated_at")?;

    let files = require_object(map, "files")?;
    for (path, digest) in files {
        if !digest.as_str().is_some_and(|d| hash::parse_digest(d).is_some()) {
            return Err(SchemaViolation::BadDigest { field: path.clone() });
        }
    }
    Ok(())
}

/// Validate a permissions document.
pub fn validate_permissions(value: &Value) -> Result<(), SchemaViolation> {
    let map = as_object(value, "permissions")?;
    known_fields(
        map,
        &[
            "schema_version",
            "filesystem",
            "network",
            "exec",
            "agent_capabilities",
        ],
    )?;
    require_u64(map, "schema_version")?;

    if let Some(fs) = map.get("filesystem") {
        let fs = fs.as_object().ok_or(SchemaViolation::WrongType {
            field: "filesystem",
            expected: "an object",
        })?;
        known_fields(fs, &["read", "write"])?;
        for field in ["read", "write"] {
            if let Some(paths) = fs.get(field) {
                string_array(paths, "filesystem path list")?;
            }
        }
    }

    if let Some(network) = map.get("network") {
        let ok = match network {
            Value::String(s) => s == "none" || s == "all",
            Value::Array(_) => string_array(network, "network").is_ok(),
            _ => false,
        };
        if !ok {
            return Err(SchemaViolation::WrongType {
                field: "network",
                expected: "\"none\", \"all\", or a domain list",
            });
        }
    }

    if let Some(exec) = map.get("exec") {
        let ok = match exec {
            Value::Bool(_) => true,
            Value::Array(_) => string_array(exec, "exec").is_ok(),
            _ => false,
        };
        if !ok {
            return Err(SchemaViolation::WrongType {
                field: "exec",
                expected: "a boolean or a command list",
            });
        }
    }

    if let Some(caps) = map.get("agent_capabilities") {
        let caps = caps.as_object().ok_or(SchemaViolation::WrongType {
            field: "agent_capabilities",
            expected: "an object",
        })?;
        known_fields(
            caps,
            &["memory_read", "memory_write", "spawn_agents", "modify_system_prompt"],
        )?;
        if !caps.values().all(Value::is_boolean) {
            return Err(SchemaViolation::WrongType {
                field: "agent_capabilities",
                expected: "an object of booleans",
            });
        }
    }
    Ok(())
}

/// Validate a signed revocation list.
pub fn validate_revocation_list(value: &Value) -> Result<(), SchemaViolation> {
    let map = as_object(value, "revocation list")?;
    known_fields(
        map,
        &[
            "schema_version",
            "sequence_number",
            "issued_at",
            "expires_at",
            "next_update",
            "entries",
            "signature",
        ],
    )?;
    require_u64(map, "schema_version")?;
    require_u64(map, "sequence_number")?;
    require_str(map, "issued_at")?;
    require_str(map, "expires_at")?;
    require_str(map, "next_update")?;

    for entry in require_array(map, "entries")? {
        let entry = as_object(entry, "revocation entry")?;
        known_fields(entry, &["name", "versions", "revoked_at", "reason", "severity"])?;
        require_str(entry, "name")?;
        require_str(entry, "revoked_at")?;
        require_str(entry, "reason")?;
        let severity = require_str(entry, "severity")?;
        if !["low", "medium", "high", "critical"].contains(&severity) {
            return Err(SchemaViolation::WrongType {
                field: "severity",
                expected: "low|medium|high|critical",
            });
        }
        let versions = require_array(entry, "versions")?;
        if versions.is_empty() {
            return Err(SchemaViolation::Empty { field: "versions" });
        }
        if !versions.iter().all(Value::is_string) {
            return Err(SchemaViolation::WrongType {
                field: "versions",
                expected: "an array of strings",
            });
        }
    }

    let signature = require_object(map, "signature")?;
    known_fields(signature, &["keyid", "sig"])?;
    require_str(signature, "keyid")?;
    require_str(signature, "sig")?;
    Ok(())
}

fn as_object<'a>(
    value: &'a Value,
    artifact: &'static str,
) -> Result<&'a Map<String, Value>, SchemaViolation> {
    value
        .as_object()
        .ok_or(SchemaViolation::NotAnObject { artifact })
}

fn known_fields(map: &Map<String, Value>, allowed: &[&str]) -> Result<(), SchemaViolation> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(SchemaViolation::UnknownField { field: key.clone() });
        }
    }
    Ok(())
}

fn require<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, SchemaViolation> {
    map.get(field).ok_or(SchemaViolation::MissingField { field })
}

fn require_str<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SchemaViolation> {
    require(map, field)?.as_str().ok_or(SchemaViolation::WrongType {
        field,
        expected: "a string",
    })
}

fn require_u64(map: &Map<String, Value>, field: &'static str) -> Result<u64, SchemaViolation> {
    require(map, field)?.as_u64().ok_or(SchemaViolation::WrongType {
        field,
        expected: "an unsigned integer",
    })
}

fn require_array<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Vec<Value>, SchemaViolation> {
    require(map, field)?.as_array().ok_or(SchemaViolation::WrongType {
        field,
        expected: "an array",
    })
}

fn require_object<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Map<String, Value>, SchemaViolation> {
    require(map, field)?.as_object().ok_or(SchemaViolation::WrongType {
        field,
        expected: "an object",
    })
}

fn require_digest(map: &Map<String, Value>, field: &'static str) -> Result<(), SchemaViolation> {
    let digest = require_str(map, field)?;
    if hash::parse_digest(digest).is_none() {
        return Err(SchemaViolation::BadDigest {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn string_array(value: &Value, field: &'static str) -> Result<(), SchemaViolation> {
    let ok = value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string));
    if ok {
        Ok(())
    } else {
        Err(SchemaViolation::WrongType {
            field,
            expected: "an array of strings",
        })
    }
}
