/*
 * Storage walker: enumerates every file physically present under the scan
 * location.
 *
 * The walk is breadth-first over directories, fanning listings out across
 * a bounded number of concurrent calls. A subtree that fails to list is
 * recorded and skipped; sibling subtrees are unaffected. No ordering is
 * guaranteed on emission.
 */

use futures::stream::{self, StreamExt, TryStreamExt};
use opendal::Operator;
use orphan_common::{retry_async, CleanupError, Result, RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A file observed under the scan root.
#[derive(Debug, Clone)]
pub struct PresentFile {
    /// Full path, scan prefix joined with the relative path
    pub path: String,
    /// Path relative to the operator root, usable for stat/delete calls
    pub rel_path: String,
    /// Modification time in epoch millis. None when the backend reports
    /// no mtime; such files are never treated as orphans.
    pub last_modified_ms: Option<i64>,
}

/// A subtree that could not be enumerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingFailure {
    pub path: String,
    pub cause: String,
}

/// Everything one walk produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<PresentFile>,
    pub failures: Vec<ListingFailure>,
}

struct DirListing {
    files: Vec<PresentFile>,
    dirs: Vec<String>,
}

/// Walks all files under a root storage location.
pub struct StorageWalker {
    op: Operator,
    prefix: String,
    parallelism: usize,
    retry: RetryConfig,
}

impl StorageWalker {
    /// Creates a walker over an operator rooted at the scan location.
    ///
    /// `prefix` is the full form of that location (no trailing slash),
    /// joined with relative entry paths to reconstruct full file paths.
    pub fn new(
        op: Operator,
        prefix: impl Into<String>,
        parallelism: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            op,
            prefix: prefix.into().trim_end_matches('/').to_string(),
            parallelism: parallelism.max(1),
            retry,
        }
    }

    /// Walks the whole scan location.
    ///
    /// The walk is eager: it drains every listable subtree into the
    /// returned outcome, since orphan computation needs the complete
    /// present set. Re-running the walk restarts it from scratch.
    pub async fn walk(&self) -> ScanOutcome {
        self.walk_from(vec!["/".to_string()]).await
    }

    async fn walk_from(&self, roots: Vec<String>) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut pending = roots;

        while !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            let listed: Vec<(String, Result<DirListing>)> = stream::iter(batch)
                .map(|dir| async move {
                    let result = self.list_dir(&dir).await;
                    (dir, result)
                })
                .buffer_unordered(self.parallelism)
                .collect()
                .await;

            for (dir, result) in listed {
                match result {
                    Ok(listing) => {
                        outcome.files.extend(listing.files);
                        pending.extend(listing.dirs);
                    }
                    Err(e) => {
                        warn!("Skipping unlistable subtree {}: {}", dir, e);
                        outcome.failures.push(ListingFailure {
                            path: self.join(&dir),
                            cause: e.to_string(),
                        });
                    }
                }
            }
        }

        debug!(
            files = outcome.files.len(),
            failures = outcome.failures.len(),
            "Storage walk of {} complete",
            self.prefix
        );
        outcome
    }

    async fn list_dir(&self, dir: &str) -> Result<DirListing> {
        retry_async(&self.retry, || self.list_dir_once(dir)).await
    }

    async fn list_dir_once(&self, dir: &str) -> Result<DirListing> {
        let mut lister = self
            .op
            .lister(dir)
            .await
            .map_err(|e| CleanupError::Listing(format!("list {}: {}", dir, e)))?;

        let mut files = Vec::new();
        let mut dirs = Vec::new();

        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|e| CleanupError::Listing(format!("list {}: {}", dir, e)))?
        {
            let rel_path = entry.path().to_string();
            // Some backends echo the listed directory itself
            if rel_path == dir || rel_path.trim_start_matches('/').is_empty() {
                continue;
            }

            if entry.metadata().mode().is_dir() {
                dirs.push(rel_path);
            } else {
                let last_modified_ms = match entry.metadata().last_modified() {
                    Some(ts) => Some(ts.timestamp_millis()),
                    None => self.stat_mtime(&rel_path).await,
                };
                files.push(PresentFile {
                    path: self.join(&rel_path),
                    rel_path,
                    last_modified_ms,
                });
            }
        }

        Ok(DirListing { files, dirs })
    }

    /// Fetches the mtime for entries whose listing omitted it. A stat
    /// failure leaves the mtime unknown, which keeps the file undeletable.
    async fn stat_mtime(&self, rel_path: &str) -> Option<i64> {
        match self.op.stat(rel_path).await {
            Ok(meta) => meta.last_modified().map(|ts| ts.timestamp_millis()),
            Err(e) => {
                warn!("Could not stat {}: {}", rel_path, e);
                None
            }
        }
    }

    fn join(&self, rel_path: &str) -> String {
        format!(
            "{}/{}",
            self.prefix,
            rel_path.trim_start_matches('/').trim_end_matches('/')
        )
    }
}
