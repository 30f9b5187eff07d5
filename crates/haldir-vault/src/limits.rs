//! Resource limits for skill directory traversal and trust evaluation.

use serde::Deserialize;

/// Maximum number of files in a skill directory.
pub const MAX_FILES: usize = 10_000;

/// Maximum size of a single file (100 MiB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum total size of all files (500 MiB).
pub const MAX_TOTAL_SIZE: u64 = 500 * 1024 * 1024;

/// Clock-skew tolerance for revocation timestamps (5 minutes).
pub const CLOCK_SKEW_SECS: i64 = 300;

/// Grace period for stale revocation data at runtime (24 hours).
pub const RUNTIME_GRACE_HOURS: i64 = 24;

/// Limits applied while walking a skill directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    pub max_files: usize,
    pub max_file_size: u64,
    pub max_total_size: u64,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_files: MAX_FILES,
            max_file_size: MAX_FILE_SIZE,
            max_total_size: MAX_TOTAL_SIZE,
        }
    }
}

/// Partial overrides for `WalkLimits`. Used for embedder config parsing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkLimitsOverrides {
    pub max_files: Option<usize>,
    pub max_file_size: Option<u64>,
    pub max_total_size: Option<u64>,
}

impl WalkLimits {
    /// Apply overrides onto these defaults. Only `Some` values override.
    pub fn apply(self, overrides: WalkLimitsOverrides) -> Self {
        Self {
            max_files: overrides.max_files.unwrap_or(self.max_files),
            max_file_size: overrides.max_file_size.unwrap_or(self.max_file_size),
            max_total_size: overrides.max_total_size.unwrap_or(self.max_total_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let limits = WalkLimits::default();
        assert_eq!(limits.max_files, 10_000);
        assert_eq!(limits.max_file_size, 100 * 1024 * 1024);
        assert_eq!(limits.max_total_size, 500 * 1024 * 1024);
    }

    #[test]
    fn overrides_apply_only_some() {
        let limits = WalkLimits::default().apply(WalkLimitsOverrides {
            max_files: Some(10),
            ..Default::default()
        });
        assert_eq!(limits.max_files, 10);
        assert_eq!(limits.max_file_size, MAX_FILE_SIZE);
    }

    #[test]
    fn overrides_reject_unknown_fields() {
        let err = serde_json::from_str::<WalkLimitsOverrides>(r#"{"max_entries": 5}"#);
        assert!(err.is_err());
    }
}
