/*
 * Iceberg Orphan File Cleanup
 *
 * Reconciles the files physically present under a table's storage location
 * against the files referenced by the table's retained metadata, and
 * deletes the unreferenced ones that are older than a safety threshold.
 */

pub mod action;
pub mod deleter;
pub mod lister;
pub mod orphans;
pub mod walker;

pub use action::{CleanupResult, RemoveOrphanFilesAction};
pub use deleter::{
    dispatch_mode, DeleteDispatch, DeleteFailure, DeleteFile, DeleteOutcome, DeletionExecutor,
};
pub use lister::{MetadataFileLister, ReferencedFileLister, ReferencedFiles};
pub use orphans::{orphan_candidates, OrphanCandidate, PathEquivalence};
pub use walker::{ListingFailure, PresentFile, ScanOutcome, StorageWalker};

// Re-export the common crate's surface for callers
pub use orphan_common::{CleanupConfig, CleanupConfigBuilder, CleanupError, Result};

// Re-export RestCatalog for convenience
pub use iceberg_catalog_rest::RestCatalog;
