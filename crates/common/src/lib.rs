/*
 * Iceberg Orphan File Cleanup - Common Types
 *
 * Shared errors, configuration, retry logic, and storage access used by
 * the cleaner crate.
 */

pub mod config;
pub mod error;
pub mod retry;
pub mod storage;

pub use config::{default_scheme_aliases, CleanupConfig, CleanupConfigBuilder};
pub use error::{CleanupError, Result, ResultExt};
pub use retry::{retry_async, RetryConfig};
pub use storage::{build_operator, parse_location, ScanLocation, StorageBackend, StorageConfig};
