//! Migration configuration.
//!
//! ```json
//! {
//!   "source": { "bucket": "images", "region": "auto", "endpoint": "https://old.example" },
//!   "target": { "bucket": "images", "region": "us-east-1", "endpoint": "https://new.example",
//!               "access_key": "...", "secret_key": "..." },
//!   "workers": 8
//! }
//! ```
//!
//! An endpoint of the form `file:///some/dir` addresses a directory instead
//! of an S3-compatible service; objects then live at `<dir>/<bucket>/<key>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::storage_info::BackendCoordinates;
use crate::store::{LocalStore, ObjectStore, StoreError};

pub const DEFAULT_WORKERS: usize = 4;
pub const FILE_ENDPOINT_PREFIX: &str = "file://";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("cannot open backend: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BucketConfig {
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

// Keeps secrets out of logs.
impl fmt::Debug for BucketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BucketConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), ..Default::default() }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = force;
        self
    }

    pub fn with_credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// The coordinates a retargeted descriptor records.
    pub fn coordinates(&self) -> BackendCoordinates {
        BackendCoordinates {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            force_path_style: self.force_path_style,
        }
    }

    /// Directory root when the endpoint is a `file://` URL.
    pub fn local_root(&self) -> Option<PathBuf> {
        self.endpoint
            .strip_prefix(FILE_ENDPOINT_PREFIX)
            .map(|dir| Path::new(dir).join(&self.bucket))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::Invalid("bucket must not be empty".into()));
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(ConfigError::Invalid(format!(
                "bucket {}: access_key and secret_key must be given together",
                self.bucket
            )));
        }
        Ok(())
    }

    /// Build the store this configuration addresses.
    pub fn open_store(&self) -> Result<Box<dyn ObjectStore>, ConfigError> {
        self.validate()?;
        if let Some(root) = self.local_root() {
            return Ok(Box::new(LocalStore::new(root)));
        }
        self.open_remote()
    }

    #[cfg(feature = "s3")]
    fn open_remote(&self) -> Result<Box<dyn ObjectStore>, ConfigError> {
        Ok(Box::new(crate::store::S3Store::new(self)?))
    }

    #[cfg(not(feature = "s3"))]
    fn open_remote(&self) -> Result<Box<dyn ObjectStore>, ConfigError> {
        Err(ConfigError::Invalid(format!(
            "endpoint {:?} needs the `s3` feature",
            self.endpoint
        )))
    }
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateConfig {
    pub source: BucketConfig,
    pub target: BucketConfig,
    /// Concurrent pipelines in batch mode.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Whole-pipeline retries after a transient failure.
    #[serde(default)]
    pub retries: u32,
}

impl MigrateConfig {
    pub fn new(source: BucketConfig, target: BucketConfig) -> Self {
        Self { source, target, workers: DEFAULT_WORKERS, retries: 0 }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        let cfg = Self::from_json(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()?;
        self.target.validate()?;
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        Ok(())
    }
}
