/*
 * Deletion executor: removes orphan candidates.
 *
 * Dispatch rules:
 * - a caller-supplied delete function always gets one call per candidate,
 *   fanned out across the configured worker parallelism;
 * - otherwise, backends advertising batch support get a single bulk call
 *   with the whole candidate set;
 * - otherwise, one storage delete per candidate, fanned out.
 *
 * Each candidate's outcome is independent. Failures are recorded in the
 * result, never thrown mid-batch.
 */

use crate::orphans::OrphanCandidate;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use opendal::Operator;
use orphan_common::{retry_async, CleanupError, Result, RetryConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Capability to delete a single file, keyed by its full path.
///
/// Callers override this to customize deletion, e.g. collecting orphan
/// paths into a set instead of physically removing them.
#[async_trait]
pub trait DeleteFile: Send + Sync {
    async fn delete(&self, path: &str) -> Result<()>;
}

/// A candidate that could not be deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub path: String,
    pub cause: String,
}

/// Success/failure partition of one deletion batch.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<DeleteFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDispatch {
    /// One bulk call carrying the full candidate set
    Bulk,
    /// One call per candidate across the worker pool
    PerFile,
}

/// Picks the dispatch strategy for a batch.
pub fn dispatch_mode(has_custom_delete: bool, bulk_capable: bool) -> DeleteDispatch {
    if !has_custom_delete && bulk_capable {
        DeleteDispatch::Bulk
    } else {
        DeleteDispatch::PerFile
    }
}

/// Deletes orphan candidates against a storage operator, or through a
/// caller-supplied delete function.
pub struct DeletionExecutor {
    op: Operator,
    custom_delete: Option<Arc<dyn DeleteFile>>,
    parallelism: usize,
    retry: RetryConfig,
}

impl DeletionExecutor {
    pub fn new(
        op: Operator,
        custom_delete: Option<Arc<dyn DeleteFile>>,
        parallelism: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            op,
            custom_delete,
            parallelism: parallelism.max(1),
            retry,
        }
    }

    /// Deletes every candidate, returning the success/failure partition.
    pub async fn delete_all(&self, candidates: Vec<OrphanCandidate>) -> DeleteOutcome {
        if candidates.is_empty() {
            return DeleteOutcome::default();
        }

        let mode = dispatch_mode(
            self.custom_delete.is_some(),
            self.op.info().full_capability().batch,
        );
        let mut outcome = match mode {
            DeleteDispatch::Bulk => self.delete_bulk(candidates).await,
            DeleteDispatch::PerFile => self.delete_each(candidates).await,
        };

        // Deterministic output regardless of completion order
        outcome.deleted.sort();
        outcome.failed.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "Orphan deletion complete"
        );
        outcome
    }

    async fn delete_bulk(&self, candidates: Vec<OrphanCandidate>) -> DeleteOutcome {
        let rel_paths: Vec<String> = candidates.iter().map(|c| c.rel_path.clone()).collect();

        let result = retry_async(&self.retry, || {
            let rel_paths = rel_paths.clone();
            async move {
                self.op
                    .remove(rel_paths)
                    .await
                    .map_err(|e| CleanupError::Storage(format!("bulk delete: {}", e)))
            }
        })
        .await;

        match result {
            Ok(()) => DeleteOutcome {
                deleted: candidates.into_iter().map(|c| c.path).collect(),
                failed: Vec::new(),
            },
            Err(e) => {
                // The bulk transport reports failures in aggregate
                warn!("Bulk delete of {} candidates failed: {}", candidates.len(), e);
                DeleteOutcome {
                    deleted: Vec::new(),
                    failed: candidates
                        .into_iter()
                        .map(|c| DeleteFailure {
                            path: c.path,
                            cause: e.to_string(),
                        })
                        .collect(),
                }
            }
        }
    }

    async fn delete_each(&self, candidates: Vec<OrphanCandidate>) -> DeleteOutcome {
        let results: Vec<(OrphanCandidate, Result<()>)> = stream::iter(candidates)
            .map(|candidate| async move {
                let result = self.delete_one(&candidate).await;
                (candidate, result)
            })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        let mut outcome = DeleteOutcome::default();
        for (candidate, result) in results {
            match result {
                Ok(()) => outcome.deleted.push(candidate.path),
                Err(e) => {
                    warn!("Failed to delete {}: {}", candidate.path, e);
                    outcome.failed.push(DeleteFailure {
                        path: candidate.path,
                        cause: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    async fn delete_one(&self, candidate: &OrphanCandidate) -> Result<()> {
        match &self.custom_delete {
            // The custom function owns its own failure handling; call it once
            Some(delete) => delete.delete(&candidate.path).await,
            None => {
                retry_async(&self.retry, || async {
                    self.op
                        .delete(&candidate.rel_path)
                        .await
                        .map_err(|e| CleanupError::Storage(format!("delete {}: {}", candidate.rel_path, e)))
                })
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orphan_common::{build_operator, StorageConfig};
    use std::fs;
    use std::sync::Mutex;

    fn candidate(rel: &str, prefix: &str) -> OrphanCandidate {
        OrphanCandidate {
            path: format!("{}/{}", prefix, rel),
            rel_path: rel.to_string(),
            last_modified_ms: 0,
        }
    }

    #[test]
    fn test_dispatch_mode() {
        assert_eq!(dispatch_mode(false, true), DeleteDispatch::Bulk);
        assert_eq!(dispatch_mode(false, false), DeleteDispatch::PerFile);
        // A custom delete function always forces per-file dispatch
        assert_eq!(dispatch_mode(true, true), DeleteDispatch::PerFile);
        assert_eq!(dispatch_mode(true, false), DeleteDispatch::PerFile);
    }

    #[tokio::test]
    async fn test_per_file_deletion_on_local_fs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/x.parquet"), b"x").unwrap();
        fs::write(dir.path().join("data/y.parquet"), b"y").unwrap();

        let op = build_operator(&StorageConfig::local(dir.path().to_str().unwrap())).unwrap();
        let executor = DeletionExecutor::new(op, None, 2, RetryConfig::no_retry());

        let prefix = format!("file://{}", dir.path().display());
        let outcome = executor
            .delete_all(vec![
                candidate("data/x.parquet", &prefix),
                candidate("data/y.parquet", &prefix),
            ])
            .await;

        assert_eq!(outcome.deleted.len(), 2);
        assert!(outcome.failed.is_empty());
        assert!(!dir.path().join("data/x.parquet").exists());
        assert!(!dir.path().join("data/y.parquet").exists());
    }

    #[tokio::test]
    async fn test_bulk_delete_removes_the_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/x.parquet"), b"x").unwrap();
        fs::write(dir.path().join("data/y.parquet"), b"y").unwrap();
        fs::write(dir.path().join("data/z.parquet"), b"z").unwrap();

        let op = build_operator(&StorageConfig::local(dir.path().to_str().unwrap())).unwrap();
        let executor = DeletionExecutor::new(op, None, 2, RetryConfig::no_retry());

        let prefix = format!("file://{}", dir.path().display());
        let candidates = vec![
            candidate("data/x.parquet", &prefix),
            candidate("data/y.parquet", &prefix),
            candidate("data/z.parquet", &prefix),
        ];

        // One remove call carries the full candidate set
        let outcome = executor.delete_bulk(candidates).await;

        assert_eq!(outcome.deleted.len(), 3);
        assert!(outcome.failed.is_empty());
        assert!(!dir.path().join("data/x.parquet").exists());
        assert!(!dir.path().join("data/y.parquet").exists());
        assert!(!dir.path().join("data/z.parquet").exists());
    }

    #[tokio::test]
    async fn test_bulk_failure_shares_the_cause_across_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("full")).unwrap();
        fs::write(dir.path().join("full/kept"), b"k").unwrap();
        fs::write(dir.path().join("loose"), b"l").unwrap();

        let op = build_operator(&StorageConfig::local(dir.path().to_str().unwrap())).unwrap();
        let executor = DeletionExecutor::new(op, None, 2, RetryConfig::no_retry());

        let prefix = format!("file://{}", dir.path().display());
        // A non-empty directory cannot be removed, failing the batch call
        let outcome = executor
            .delete_bulk(vec![candidate("full/", &prefix), candidate("loose", &prefix)])
            .await;

        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].cause, outcome.failed[1].cause);
        assert!(outcome.failed[0].cause.contains("bulk delete"));
    }

    struct CollectingDeleter(Mutex<Vec<String>>);

    #[async_trait]
    impl DeleteFile for CollectingDeleter {
        async fn delete(&self, path: &str) -> Result<()> {
            self.0.lock().unwrap().push(path.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_custom_delete_function_intercepts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("orphan"), b"o").unwrap();

        let op = build_operator(&StorageConfig::local(dir.path().to_str().unwrap())).unwrap();
        let collector = Arc::new(CollectingDeleter(Mutex::new(Vec::new())));
        let executor = DeletionExecutor::new(
            op,
            Some(collector.clone()),
            2,
            RetryConfig::no_retry(),
        );

        let prefix = format!("file://{}", dir.path().display());
        let outcome = executor.delete_all(vec![candidate("orphan", &prefix)]).await;

        assert_eq!(outcome.deleted.len(), 1);
        // Collected, not physically removed
        assert!(dir.path().join("orphan").exists());
        assert_eq!(*collector.0.lock().unwrap(), vec![format!("{}/orphan", prefix)]);
    }

    struct FailingDeleter;

    #[async_trait]
    impl DeleteFile for FailingDeleter {
        async fn delete(&self, path: &str) -> Result<()> {
            if path.ends_with("bad") {
                Err(CleanupError::Deletion("simulated".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let op = build_operator(&StorageConfig::local(dir.path().to_str().unwrap())).unwrap();
        let executor = DeletionExecutor::new(
            op,
            Some(Arc::new(FailingDeleter)),
            2,
            RetryConfig::no_retry(),
        );

        let outcome = executor
            .delete_all(vec![
                candidate("good", "s3://b/t"),
                candidate("bad", "s3://b/t"),
                candidate("also-good", "s3://b/t"),
            ])
            .await;

        assert_eq!(outcome.deleted, vec!["s3://b/t/also-good", "s3://b/t/good"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].path, "s3://b/t/bad");
        assert!(outcome.failed[0].cause.contains("simulated"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let op = build_operator(&StorageConfig::local(dir.path().to_str().unwrap())).unwrap();
        let executor = DeletionExecutor::new(op, None, 2, RetryConfig::no_retry());

        let outcome = executor.delete_all(vec![]).await;
        assert!(outcome.deleted.is_empty());
        assert!(outcome.failed.is_empty());
    }
}
