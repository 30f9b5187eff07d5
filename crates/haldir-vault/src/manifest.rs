//! Content-addressed integrity manifest: the `path → sha256:<hex>` map.

use crate::crypto::hash;
use crate::walk::{WalkedFile, VAULT_DIR};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path};

/// Supported integrity manifest schema versions.
pub const INTEGRITY_SCHEMA_VERSION: u32 = 1;

/// Hash algorithm identifier recorded in the manifest.
pub const INTEGRITY_ALGORITHM: &str = "sha256";

/// The integrity manifest.
///
/// Keys are root-relative forward-slash paths sorted by UTF-8 byte order
/// (the `BTreeMap` ordering); every on-disk file outside the vault appears
/// exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IntegrityManifest {
    pub schema_version: u32,
    pub algorithm: String,
    pub files: BTreeMap<String, String>,
    pub generated_at: DateTime<Utc>,
}

impl IntegrityManifest {
    /// Build a manifest from a walk result, streaming each file's content
    /// through the hasher.
    pub fn generate(files: &[WalkedFile], generated_at: DateTime<Utc>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for file in files {
            let reader = File::open(&file.abs_path)
                .map(BufReader::new)
                .with_context(|| format!("failed to open {}", file.rel_path))?;
            let digest = hash::sha256_hex_reader(reader)
                .with_context(|| format!("failed to hash {}", file.rel_path))?;
            map.insert(file.rel_path.clone(), digest);
        }

        Ok(Self {
            schema_version: INTEGRITY_SCHEMA_VERSION,
            algorithm: INTEGRITY_ALGORITHM.to_string(),
            files: map,
            generated_at,
        })
    }
}

/// Screen a manifest-declared path before any filesystem read.
///
/// The signed manifest is untrusted input: a key must be a plain relative
/// path made of normal components (no `..`, no absolute form, no current-dir
/// segments, no backslashes) and must not reach into the vault.
pub fn declared_path_is_safe(declared: &str) -> bool {
    if declared.is_empty() || declared.contains('\\') {
        return false;
    }
    if declared == VAULT_DIR || declared.starts_with(".vault/") {
        return false;
    }

    let path = Path::new(declared);
    if path.is_absolute() {
        return false;
    }
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
}
