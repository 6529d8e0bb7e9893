/*
 * Storage abstraction using opendal.
 *
 * Provides a uniform interface for scanning and deleting objects on S3,
 * GCS, Azure, and local storage. The cleanup action builds one operator
 * rooted at the scan location, so walk paths are relative to that root.
 */

use crate::{CleanupError, Result};
use opendal::Operator;
use std::collections::HashMap;
use url::Url;

/// Storage backend type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Gcs,
    Azure,
    Local,
}

/// Configuration for building a storage operator.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// The storage backend type
    pub backend: StorageBackend,
    /// Bucket or container name (unused for local storage)
    pub bucket: String,
    /// Root path within the bucket, or the absolute local directory
    pub root: String,
    /// Endpoint override (for S3-compatible services)
    pub endpoint: Option<String>,
    /// Region (for S3)
    pub region: Option<String>,
    /// Configuration options (credentials, etc.)
    pub options: HashMap<String, String>,
}

impl StorageConfig {
    /// Creates a local filesystem storage config rooted at a directory.
    pub fn local(root: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: String::new(),
            root: root.into(),
            endpoint: None,
            region: None,
            options: HashMap::new(),
        }
    }

    /// Creates an S3 storage config rooted at a path within a bucket.
    pub fn s3(bucket: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: bucket.into(),
            root: root.into(),
            endpoint: None,
            region: None,
            options: HashMap::new(),
        }
    }

    /// Creates a GCS storage config rooted at a path within a bucket.
    pub fn gcs(bucket: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Gcs,
            bucket: bucket.into(),
            root: root.into(),
            endpoint: None,
            region: None,
            options: HashMap::new(),
        }
    }

    /// Creates an Azure Blob storage config rooted at a path within a container.
    pub fn azure(container: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Azure,
            bucket: container.into(),
            root: root.into(),
            endpoint: None,
            region: None,
            options: HashMap::new(),
        }
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Adds a configuration option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Sets AWS credentials.
    pub fn with_aws_credentials(
        self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        let mut s = self
            .with_option("access_key_id", access_key_id)
            .with_option("secret_access_key", secret_access_key);
        if let Some(token) = session_token {
            s = s.with_option("session_token", token);
        }
        s
    }
}

/// A parsed scan location: the operator config plus the canonical prefix
/// used to turn operator-relative paths back into full file paths.
#[derive(Debug, Clone)]
pub struct ScanLocation {
    pub config: StorageConfig,
    /// The location with any trailing slash removed, e.g.
    /// `s3://bucket/warehouse/db/table`. Joined with relative walk paths.
    pub prefix: String,
}

/// Parses a table location URI into a storage config.
///
/// Supported forms: `s3://bucket/path` (also `s3a`/`s3n`), `gs://bucket/path`
/// (also `gcs`), `az://container/path` (also `azblob`), `file:///path`, and
/// bare absolute paths.
pub fn parse_location(location: &str) -> Result<ScanLocation> {
    let trimmed = location.trim_end_matches('/');

    if trimmed.starts_with('/') {
        return Ok(ScanLocation {
            config: StorageConfig::local(trimmed),
            prefix: trimmed.to_string(),
        });
    }

    let url = Url::parse(trimmed)
        .map_err(|e| CleanupError::Config(format!("Invalid location '{}': {}", location, e)))?;

    let bucket = url.host_str().unwrap_or_default().to_string();
    let path = if url.path().is_empty() { "/" } else { url.path() };

    let config = match url.scheme() {
        "s3" | "s3a" | "s3n" => StorageConfig::s3(bucket, path),
        "gs" | "gcs" => StorageConfig::gcs(bucket, path),
        "az" | "azblob" => StorageConfig::azure(bucket, path),
        "file" => StorageConfig::local(path),
        other => {
            return Err(CleanupError::Config(format!(
                "Unsupported location scheme '{}' in '{}'",
                other, location
            )))
        }
    };

    if config.backend != StorageBackend::Local && config.bucket.is_empty() {
        return Err(CleanupError::Config(format!(
            "Location '{}' has no bucket",
            location
        )));
    }

    Ok(ScanLocation {
        config,
        prefix: trimmed.to_string(),
    })
}

/// Builds an opendal Operator from storage configuration.
///
/// The operator is rooted at the configured path, so all paths handed to
/// it (walking, stat, delete) are relative to the scan location.
pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
    match config.backend {
        StorageBackend::S3 => build_s3_operator(config),
        StorageBackend::Gcs => build_gcs_operator(config),
        StorageBackend::Azure => build_azure_operator(config),
        StorageBackend::Local => build_local_operator(config),
    }
}

fn build_s3_operator(config: &StorageConfig) -> Result<Operator> {
    let mut builder = opendal::services::S3::default();

    builder = builder.bucket(&config.bucket).root(&config.root);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint(endpoint);
    }

    if let Some(region) = &config.region {
        builder = builder.region(region);
    }

    if let Some(access_key) = config.options.get("access_key_id") {
        builder = builder.access_key_id(access_key);
    }
    if let Some(secret_key) = config.options.get("secret_access_key") {
        builder = builder.secret_access_key(secret_key);
    }
    if let Some(session_token) = config.options.get("session_token") {
        builder = builder.session_token(session_token);
    }

    Operator::new(builder)
        .map(|op| op.finish())
        .map_err(|e| CleanupError::Storage(format!("Failed to build S3 operator: {}", e)))
}

fn build_gcs_operator(config: &StorageConfig) -> Result<Operator> {
    let mut builder = opendal::services::Gcs::default();

    builder = builder.bucket(&config.bucket).root(&config.root);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint(endpoint);
    }

    if let Some(credential) = config.options.get("credential") {
        builder = builder.credential(credential);
    }

    Operator::new(builder)
        .map(|op| op.finish())
        .map_err(|e| CleanupError::Storage(format!("Failed to build GCS operator: {}", e)))
}

fn build_azure_operator(config: &StorageConfig) -> Result<Operator> {
    let mut builder = opendal::services::Azblob::default();

    builder = builder.container(&config.bucket).root(&config.root);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint(endpoint);
    }

    if let Some(account_name) = config.options.get("account_name") {
        builder = builder.account_name(account_name);
    }
    if let Some(account_key) = config.options.get("account_key") {
        builder = builder.account_key(account_key);
    }

    Operator::new(builder)
        .map(|op| op.finish())
        .map_err(|e| CleanupError::Storage(format!("Failed to build Azure operator: {}", e)))
}

fn build_local_operator(config: &StorageConfig) -> Result<Operator> {
    let mut builder = opendal::services::Fs::default();

    builder = builder.root(&config.root);

    Operator::new(builder)
        .map(|op| op.finish())
        .map_err(|e| CleanupError::Storage(format!("Failed to build local operator: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_location() {
        let loc = parse_location("s3://my-bucket/warehouse/db/table/").unwrap();
        assert_eq!(loc.config.backend, StorageBackend::S3);
        assert_eq!(loc.config.bucket, "my-bucket");
        assert_eq!(loc.config.root, "/warehouse/db/table");
        assert_eq!(loc.prefix, "s3://my-bucket/warehouse/db/table");
    }

    #[test]
    fn test_parse_s3a_alias() {
        let loc = parse_location("s3a://bucket/path").unwrap();
        assert_eq!(loc.config.backend, StorageBackend::S3);
        // The prefix keeps the original scheme; comparison normalizes it
        assert_eq!(loc.prefix, "s3a://bucket/path");
    }

    #[test]
    fn test_parse_bare_path() {
        let loc = parse_location("/tmp/warehouse/t").unwrap();
        assert_eq!(loc.config.backend, StorageBackend::Local);
        assert_eq!(loc.config.root, "/tmp/warehouse/t");
        assert_eq!(loc.prefix, "/tmp/warehouse/t");
    }

    #[test]
    fn test_parse_file_url() {
        let loc = parse_location("file:///tmp/warehouse/t").unwrap();
        assert_eq!(loc.config.backend, StorageBackend::Local);
        assert_eq!(loc.config.root, "/tmp/warehouse/t");
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(parse_location("ftp://host/path").is_err());
    }

    #[test]
    fn test_s3_config_with_credentials() {
        let config = StorageConfig::s3("my-bucket", "/warehouse")
            .with_region("us-west-2")
            .with_aws_credentials("AKID", "SECRET", Some("TOKEN".to_string()));

        assert_eq!(config.backend, StorageBackend::S3);
        assert_eq!(config.bucket, "my-bucket");
        assert_eq!(config.region, Some("us-west-2".to_string()));
        assert_eq!(config.options.get("access_key_id"), Some(&"AKID".to_string()));
        assert_eq!(config.options.get("session_token"), Some(&"TOKEN".to_string()));
    }

    #[test]
    fn test_build_local_operator() {
        // This should succeed on any system
        let config = StorageConfig::local("/tmp");
        let result = build_operator(&config);
        assert!(result.is_ok());
    }
}
