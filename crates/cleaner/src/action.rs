/*
 * The orphan file cleanup action.
 *
 * Wires the phases in sequence: metadata listing and storage walking run
 * concurrently, then the orphan set is computed, then candidates are
 * deleted. Nothing persists between runs; every execute() recomputes the
 * reconciliation from scratch.
 */

use crate::deleter::{DeleteFailure, DeleteFile, DeletionExecutor};
use crate::lister::{MetadataFileLister, ReferencedFileLister};
use crate::orphans::{orphan_candidates, PathEquivalence};
use crate::walker::{ListingFailure, StorageWalker};
use iceberg::table::Table;
use opendal::Operator;
use orphan_common::{build_operator, parse_location, CleanupConfig, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Outcome of one cleanup run: exactly what was deleted and what failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Successfully deleted file paths, sorted
    pub deleted: Vec<String>,
    /// Candidates whose deletion failed, with causes
    pub failed: Vec<DeleteFailure>,
    /// Subtrees that could not be enumerated during the walk. Files under
    /// them were neither examined nor deleted.
    pub listing_failures: Vec<ListingFailure>,
    /// Number of orphan candidates found before deletion
    pub candidate_count: usize,
    pub duration_ms: u64,
}

/// Removes files physically present under a table's location that no
/// retained snapshot references and that are older than the threshold.
pub struct RemoveOrphanFilesAction<L: ReferencedFileLister> {
    lister: L,
    walker: StorageWalker,
    deleter: DeletionExecutor,
    equivalence: PathEquivalence,
    config: CleanupConfig,
}

impl RemoveOrphanFilesAction<MetadataFileLister> {
    /// Builds the action for a table, scanning the configured location
    /// (default: the table root, covering data and metadata files).
    pub fn for_table(table: Table, config: CleanupConfig) -> Result<Self> {
        Self::for_table_with(table, config, None)
    }

    /// Same as [`for_table`](Self::for_table) with a custom delete function.
    pub fn for_table_with(
        table: Table,
        config: CleanupConfig,
        custom_delete: Option<Arc<dyn DeleteFile>>,
    ) -> Result<Self> {
        let location = config
            .location
            .clone()
            .unwrap_or_else(|| table.metadata().location().to_string());
        let scan_location = parse_location(&location)?;
        let op = build_operator(&scan_location.config)?;
        let lister = MetadataFileLister::new(table, config.manifest_parallelism);
        Ok(Self::from_parts(
            lister,
            op,
            scan_location.prefix,
            config,
            custom_delete,
        ))
    }
}

impl<L: ReferencedFileLister> RemoveOrphanFilesAction<L> {
    /// Assembles the action from explicit parts. `op` must be rooted at the
    /// scan location and `prefix` is its full form (e.g. `s3://bucket/db/t`).
    pub fn from_parts(
        lister: L,
        op: Operator,
        prefix: impl Into<String>,
        config: CleanupConfig,
        custom_delete: Option<Arc<dyn DeleteFile>>,
    ) -> Self {
        let prefix = prefix.into();
        Self {
            walker: StorageWalker::new(
                op.clone(),
                prefix,
                config.scan_parallelism,
                config.retry.clone(),
            ),
            deleter: DeletionExecutor::new(
                op,
                custom_delete,
                config.delete_parallelism,
                config.retry.clone(),
            ),
            equivalence: PathEquivalence::new(config.scheme_aliases.clone()),
            config,
            lister,
        }
    }

    /// Executes the cleanup and returns the result.
    ///
    /// A metadata read failure aborts before any deletion. Listing and
    /// deletion failures are accumulated into the result instead.
    pub async fn execute(&self) -> Result<CleanupResult> {
        let start = Instant::now();
        let older_than_ms = self.config.resolve_older_than_ms();
        info!(older_than_ms, "Starting orphan file cleanup");

        // Metadata traversal and the storage walk are independent
        let (referenced, scan) = tokio::join!(
            self.lister.list_referenced_files(),
            self.walker.walk()
        );
        let referenced = referenced?;

        let candidates = orphan_candidates(
            &scan.files,
            &referenced.files,
            older_than_ms,
            &self.equivalence,
        );
        info!(
            present = scan.files.len(),
            referenced = referenced.len(),
            snapshots = referenced.snapshot_count,
            candidates = candidates.len(),
            "Orphan reconciliation complete"
        );

        let candidate_count = candidates.len();
        let outcome = self.deleter.delete_all(candidates).await;

        Ok(CleanupResult {
            deleted: outcome.deleted,
            failed: outcome.failed,
            listing_failures: scan.failures,
            candidate_count,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
