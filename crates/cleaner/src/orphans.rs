/*
 * Orphan set computation: present-on-disk minus referenced-by-metadata,
 * filtered by the age threshold.
 *
 * Pure functions over already-collected sets. Path membership uses
 * normalized equality so that scheme variants addressing the same
 * physical object compare equal.
 */

use crate::walker::PresentFile;
use orphan_common::default_scheme_aliases;
use std::collections::{HashMap, HashSet};
use url::Url;

/// A file eligible for deletion: present, unreferenced, and old enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCandidate {
    /// Normalized full path, as reported in the result
    pub path: String,
    /// Operator-relative path, as handed to the deleter
    pub rel_path: String,
    pub last_modified_ms: i64,
}

/// Normalizes paths to `scheme://authority/path` form for comparison.
///
/// Comparison is case-sensitive and trailing-slash-insensitive. The alias
/// table maps equivalent schemes onto one canonical spelling (`s3a://` and
/// `s3://` point at the same objects). Bare absolute paths are treated as
/// `file://` URIs.
#[derive(Debug, Clone)]
pub struct PathEquivalence {
    aliases: HashMap<String, String>,
}

impl PathEquivalence {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    /// The default alias table (`s3a`/`s3n` -> `s3`, `gcs` -> `gs`).
    pub fn standard() -> Self {
        Self::new(default_scheme_aliases())
    }

    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim_end_matches('/');

        if trimmed.starts_with('/') {
            return format!("file://{}", trimmed);
        }

        match Url::parse(trimmed) {
            Ok(url) => {
                let scheme = self
                    .aliases
                    .get(url.scheme())
                    .map(String::as_str)
                    .unwrap_or_else(|| url.scheme());
                let authority = url.host_str().unwrap_or("");
                let path = url.path().trim_end_matches('/');
                format!("{}://{}{}", scheme, authority, path)
            }
            // Not a URI and not absolute: compare verbatim
            Err(_) => trimmed.to_string(),
        }
    }
}

impl Default for PathEquivalence {
    fn default() -> Self {
        Self::standard()
    }
}

/// Computes the orphan candidates among `present`.
///
/// A file qualifies only when it is absent from `referenced` (under
/// normalized equality) AND its mtime is strictly before `older_than_ms`.
/// A file without an mtime is never a candidate.
pub fn orphan_candidates(
    present: &[PresentFile],
    referenced: &HashSet<String>,
    older_than_ms: i64,
    equivalence: &PathEquivalence,
) -> Vec<OrphanCandidate> {
    let referenced: HashSet<String> = referenced
        .iter()
        .map(|path| equivalence.normalize(path))
        .collect();

    let mut candidates = Vec::new();
    for file in present {
        let last_modified_ms = match file.last_modified_ms {
            Some(ts) => ts,
            // Unknown age cannot be proven old enough
            None => continue,
        };
        if last_modified_ms >= older_than_ms {
            continue;
        }
        let path = equivalence.normalize(&file.path);
        if referenced.contains(&path) {
            continue;
        }
        candidates.push(OrphanCandidate {
            path,
            rel_path: file.rel_path.clone(),
            last_modified_ms,
        });
    }
    candidates
}
