/*
 * Metadata file lister: walks a table's retained history to produce the
 * complete set of file paths the table still references.
 *
 * Covers, for every retained snapshot: the manifest-list file, every
 * manifest inside it, and every data/delete file each manifest entry
 * points to (including entries marked deleted, which remain reachable
 * until their snapshot expires). Also covers the current metadata file
 * and every previous metadata file in the metadata log.
 *
 * Any read failure here is fatal to the action: deleting against an
 * incomplete referenced set risks data loss.
 */

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use iceberg::spec::ManifestFile;
use iceberg::table::Table;
use orphan_common::Result;
use std::collections::HashSet;
use tracing::debug;

/// The set of file paths referenced by a table's retained metadata.
#[derive(Debug, Clone, Default)]
pub struct ReferencedFiles {
    pub files: HashSet<String>,
    pub snapshot_count: usize,
}

impl ReferencedFiles {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Source of the referenced-file set. The orchestrator only depends on
/// this trait, so tests can substitute a fixed set for a live table.
#[async_trait]
pub trait ReferencedFileLister: Send + Sync {
    async fn list_referenced_files(&self) -> Result<ReferencedFiles>;
}

/// Lists referenced files by traversing Iceberg table metadata.
pub struct MetadataFileLister {
    table: Table,
    manifest_parallelism: usize,
}

impl MetadataFileLister {
    pub fn new(table: Table, manifest_parallelism: usize) -> Self {
        Self {
            table,
            manifest_parallelism: manifest_parallelism.max(1),
        }
    }
}

#[async_trait]
impl ReferencedFileLister for MetadataFileLister {
    async fn list_referenced_files(&self) -> Result<ReferencedFiles> {
        let metadata = self.table.metadata();
        let file_io = self.table.file_io();

        let mut files = HashSet::new();

        if let Some(location) = self.table.metadata_location() {
            files.insert(location.to_string());
        }
        for log_entry in metadata.metadata_log() {
            files.insert(log_entry.metadata_file.clone());
        }

        let snapshots: Vec<_> = metadata.snapshots().cloned().collect();
        let snapshot_count = snapshots.len();

        for snapshot in &snapshots {
            files.insert(snapshot.manifest_list().to_string());

            let manifest_list = snapshot.load_manifest_list(file_io, metadata).await?;
            let manifest_files: Vec<ManifestFile> = manifest_list.entries().to_vec();
            for manifest_file in &manifest_files {
                files.insert(manifest_file.manifest_path.clone());
            }

            // Manifest contents are independent; read them concurrently
            let mut manifests = stream::iter(manifest_files)
                .map(|manifest_file| {
                    let file_io = file_io.clone();
                    async move { manifest_file.load_manifest(&file_io).await }
                })
                .buffer_unordered(self.manifest_parallelism);

            while let Some(manifest) = manifests.try_next().await? {
                for entry in manifest.entries() {
                    files.insert(entry.data_file().file_path().to_string());
                }
            }
        }

        debug!(
            referenced = files.len(),
            snapshots = snapshot_count,
            "Collected referenced files for {}",
            metadata.location()
        );

        Ok(ReferencedFiles {
            files,
            snapshot_count,
        })
    }
}
