//! Publisher-declared permissions for a skill.
//!
//! The document is authored by the publisher, hashed (in canonical form)
//! into the attestation, and never mutated after signing. Verifiers compare
//! the canonicalized parsed value, so the on-disk file need not be
//! canonical.

use serde::{Deserialize, Serialize};

/// Supported permissions schema versions.
pub const PERMISSIONS_SCHEMA_VERSION: u32 = 1;

/// The permissions document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Permissions {
    pub schema_version: u32,

    #[serde(default)]
    pub filesystem: FilesystemPolicy,

    #[serde(default)]
    pub network: NetworkPolicy,

    #[serde(default)]
    pub exec: ExecPolicy,

    #[serde(default)]
    pub agent_capabilities: AgentCapabilities,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            schema_version: PERMISSIONS_SCHEMA_VERSION,
            filesystem: FilesystemPolicy::default(),
            network: NetworkPolicy::default(),
            exec: ExecPolicy::default(),
            agent_capabilities: AgentCapabilities::default(),
        }
    }
}

/// Filesystem path allow-lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilesystemPolicy {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
}

/// Network policy: `"none"`, `"all"`, or an explicit domain list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NetworkPolicy {
    Mode(NetworkMode),
    Domains(Vec<String>),
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self::Mode(NetworkMode::None)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    None,
    All,
}

/// Exec policy: a blanket boolean or an explicit command list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ExecPolicy {
    Allowed(bool),
    Commands(Vec<String>),
}

impl Default for ExecPolicy {
    fn default() -> Self {
        Self::Allowed(false)
    }
}

/// Agent-runtime capabilities the skill declares it needs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AgentCapabilities {
    #[serde(default)]
    pub memory_read: bool,
    #[serde(default)]
    pub memory_write: bool,
    #[serde(default)]
    pub spawn_agents: bool,
    #[serde(default)]
    pub modify_system_prompt: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fully_closed() {
        let p = Permissions::default();
        assert_eq!(p.network, NetworkPolicy::Mode(NetworkMode::None));
        assert_eq!(p.exec, ExecPolicy::Allowed(false));
        assert!(!p.agent_capabilities.spawn_agents);
        assert!(p.filesystem.read.is_empty());
    }

    #[test]
    fn network_forms_parse() {
        let none: NetworkPolicy = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(none, NetworkPolicy::Mode(NetworkMode::None));

        let all: NetworkPolicy = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(all, NetworkPolicy::Mode(NetworkMode::All));

        let domains: NetworkPolicy =
            serde_json::from_str(r#"["api.example.com", "cdn.example.com"]"#).unwrap();
        assert_eq!(
            domains,
            NetworkPolicy::Domains(vec!["api.example.com".into(), "cdn.example.com".into()])
        );
    }

    #[test]
    fn exec_forms_parse() {
        let blanket: ExecPolicy = serde_json::from_str("true").unwrap();
        assert_eq!(blanket, ExecPolicy::Allowed(true));

        let commands: ExecPolicy = serde_json::from_str(r#"["git", "rg"]"#).unwrap();
        assert_eq!(commands, ExecPolicy::Commands(vec!["git".into(), "rg".into()]));
    }

    #[test]
    fn unknown_fields_rejected() {
        let doc = r#"{"schema_version": 1, "sudo": true}"#;
        assert!(serde_json::from_str::<Permissions>(doc).is_err());

        let caps = r#"{"memory_read": true, "root_access": true}"#;
        assert!(serde_json::from_str::<AgentCapabilities>(caps).is_err());
    }

    #[test]
    fn canonical_form_is_stable() {
        let doc = r#"{
            "network": ["b.com", "a.com"],
            "schema_version": 1,
            "exec": false,
            "filesystem": {"write": [], "read": ["./data"]},
            "agent_capabilities": {"memory_read": true}
        }"#;
        let parsed: Permissions = serde_json::from_str(doc).unwrap();
        let first = crate::crypto::jcs::to_vec(&parsed).unwrap();
        let second = crate::crypto::jcs::to_vec(&parsed.clone()).unwrap();
        assert_eq!(first, second);
        // Domain list order is meaning-bearing and survives canonicalization
        let text = String::from_utf8(first).unwrap();
        assert!(text.contains(r#"["b.com","a.com"]"#));
    }
}
