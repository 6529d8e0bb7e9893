/*
 * Configuration for orphan file cleanup.
 *
 * An immutable config struct built once before execution. The action never
 * mutates it, so a single config can drive cleanup of many tables.
 */

use crate::RetryConfig;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default age threshold: only delete files older than 3 days.
///
/// A concurrent writer may have uploaded files that are not yet referenced
/// by any committed snapshot. The threshold keeps those out of reach.
pub const DEFAULT_OLDER_THAN_AGE_MS: i64 = 3 * 24 * 60 * 60 * 1000;

/// Configuration for an orphan file cleanup run.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(setter(into), default)]
pub struct CleanupConfig {
    /// Location to scan for orphan files. Defaults to the table root,
    /// covering both orphan data and orphan metadata files.
    pub location: Option<String>,

    /// Only files with a modification time strictly before this epoch-millis
    /// timestamp are deletion candidates. Defaults to now minus 3 days,
    /// resolved when the action executes.
    pub older_than_ms: Option<i64>,

    /// Concurrent directory listings during the storage walk (default: 8)
    pub scan_parallelism: usize,

    /// Concurrent per-file delete calls (default: 4). Unused when the
    /// storage backend handles the whole batch in one bulk call.
    pub delete_parallelism: usize,

    /// Concurrent manifest reads during metadata traversal (default: 8)
    pub manifest_parallelism: usize,

    /// URI scheme equivalences for path comparison. Two paths that differ
    /// only by aliased scheme refer to the same physical object.
    pub scheme_aliases: HashMap<String, String>,

    /// Retry behavior for transient storage failures
    pub retry: RetryConfig,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            location: None,
            older_than_ms: None,
            scan_parallelism: 8,
            delete_parallelism: 4,
            manifest_parallelism: 8,
            scheme_aliases: default_scheme_aliases(),
            retry: RetryConfig::for_storage(),
        }
    }
}

impl CleanupConfig {
    /// Resolves the effective age threshold for this run.
    pub fn resolve_older_than_ms(&self) -> i64 {
        self.older_than_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() - DEFAULT_OLDER_THAN_AGE_MS)
    }
}

/// Hadoop-era scheme variants that address the same physical objects.
pub fn default_scheme_aliases() -> HashMap<String, String> {
    HashMap::from([
        ("s3a".to_string(), "s3".to_string()),
        ("s3n".to_string(), "s3".to_string()),
        ("gcs".to_string(), "gs".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CleanupConfig::default();
        assert!(config.location.is_none());
        assert!(config.older_than_ms.is_none());
        assert_eq!(config.scan_parallelism, 8);
        assert_eq!(config.delete_parallelism, 4);
        assert_eq!(config.scheme_aliases.get("s3a"), Some(&"s3".to_string()));
    }

    #[test]
    fn test_default_threshold_is_three_days_ago() {
        let config = CleanupConfig::default();
        let now = chrono::Utc::now().timestamp_millis();
        let resolved = config.resolve_older_than_ms();
        let age = now - resolved;
        assert!((age - DEFAULT_OLDER_THAN_AGE_MS).abs() < 5_000);
    }

    #[test]
    fn test_explicit_threshold_wins() {
        let config = CleanupConfigBuilder::default()
            .older_than_ms(Some(12345i64))
            .build()
            .unwrap();
        assert_eq!(config.resolve_older_than_ms(), 12345);
    }

    #[test]
    fn test_builder() {
        let config = CleanupConfigBuilder::default()
            .location(Some("s3://bucket/warehouse/db/t".to_string()))
            .scan_parallelism(16usize)
            .build()
            .unwrap();
        assert_eq!(config.scan_parallelism, 16);
        assert_eq!(config.delete_parallelism, 4);
    }
}
