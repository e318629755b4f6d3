//! Remote archive rewriter.
//!
//! One migration is a strictly sequential pipeline against a read-only
//! source and a write-only target:
//!
//! ```text
//! Idle → HeaderFetched → DescriptorFetched → DescriptorRebuilt → Spliced → Uploaded → Done
//!   └──────────────┴──────────────┴──────────────┴──────────┴─────────┴→ Failed(kind)
//! ```
//!
//! Nothing is written until the final whole-object `put`, so every failure
//! before it leaves the target untouched and rerunning a key is safe.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::archive::{read_archive_info, ArchiveError};
use crate::codec::DecodeError;
use crate::header::{check_section, ArchiveHeader, HeaderError, SectionKind, HEADER_SIZE};
use crate::splice::{splice_section, SpliceError};
use crate::storage_info::{BackendCoordinates, DescriptorError, StorageInfo};
use crate::store::{ObjectStore, StoreError};

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedHeader,
    Decode,
    UnsupportedBackend,
    Splice,
    TransientIo,
    NotFound,
    AccessDenied,
    Backend,
}

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("malformed archive header: {0}")]
    MalformedHeader(#[from] HeaderError),
    #[error("storage info decode failed: {0}")]
    Decode(DescriptorError),
    #[error("unsupported storage backend type {0:?}")]
    UnsupportedBackend(String),
    #[error("section splice failed: {0}")]
    Splice(#[from] SpliceError),
    #[error("transient I/O failure: {0}")]
    TransientIo(String),
    #[error("object {0:?} not found")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl MigrateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrateError::MalformedHeader(_)    => ErrorKind::MalformedHeader,
            MigrateError::Decode(_)             => ErrorKind::Decode,
            MigrateError::UnsupportedBackend(_) => ErrorKind::UnsupportedBackend,
            MigrateError::Splice(_)             => ErrorKind::Splice,
            MigrateError::TransientIo(_)        => ErrorKind::TransientIo,
            MigrateError::NotFound(_)           => ErrorKind::NotFound,
            MigrateError::AccessDenied(_)       => ErrorKind::AccessDenied,
            MigrateError::Backend(_)            => ErrorKind::Backend,
        }
    }

    /// Only transient failures are worth rerunning the pipeline for.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientIo
    }
}

impl From<StoreError> for MigrateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => MigrateError::NotFound(key),
            StoreError::AccessDenied { .. } => MigrateError::AccessDenied(err.to_string()),
            StoreError::Transient { .. } => MigrateError::TransientIo(err.to_string()),
            StoreError::InvalidRange { start, end, .. } => {
                MigrateError::Splice(SpliceError::RangeUnavailable { start, end })
            }
            StoreError::Backend { .. } => MigrateError::Backend(err.to_string()),
        }
    }
}

impl From<DescriptorError> for MigrateError {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::Unsupported(tag) => MigrateError::UnsupportedBackend(tag),
            other => MigrateError::Decode(other),
        }
    }
}

impl From<ArchiveError> for MigrateError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Header(e) => MigrateError::MalformedHeader(e),
            ArchiveError::Layout(e) => MigrateError::Splice(SpliceError::Layout(e)),
            ArchiveError::Descriptor(e) => e.into(),
        }
    }
}

// ── State machine ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Idle,
    HeaderFetched,
    DescriptorFetched,
    DescriptorRebuilt,
    Spliced,
    Uploaded,
    Done,
    Failed(ErrorKind),
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Failed(kind) => write!(f, "Failed({kind:?})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub key: String,
    pub source_info: StorageInfo,
    pub target_info: StorageInfo,
    pub old_section_len: i64,
    pub new_section_len: i64,
    pub delta: i64,
    pub archive_len: u64,
    /// BLAKE3 of the rewritten archive, hex encoded.
    pub digest: String,
    pub uploaded: bool,
    pub attempts: u32,
    pub trace: Vec<MigrationState>,
}

#[derive(Error, Debug)]
#[error("migrating {key} failed after {stage}: {error}")]
pub struct MigrationFailure {
    pub key: String,
    /// Last state reached before the failure.
    pub stage: MigrationState,
    #[source]
    pub error: MigrateError,
    pub attempts: u32,
    pub trace: Vec<MigrationState>,
}

struct Pipeline<'a> {
    key: &'a str,
    state: MigrationState,
    trace: Vec<MigrationState>,
}

impl<'a> Pipeline<'a> {
    fn new(key: &'a str) -> Self {
        Self { key, state: MigrationState::Idle, trace: vec![MigrationState::Idle] }
    }

    fn advance(&mut self, next: MigrationState) {
        debug!(key = self.key, from = %self.state, to = %next, "migration state");
        self.state = next;
        self.trace.push(next);
    }

    fn fail(mut self, error: MigrateError) -> MigrationFailure {
        let stage = self.state;
        self.advance(MigrationState::Failed(error.kind()));
        MigrationFailure { key: self.key.to_owned(), stage, error, attempts: 1, trace: self.trace }
    }
}

// ── Migrator ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Run every stage except the upload.
    pub dry_run: bool,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Pause before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
    /// Concurrent pipelines in [`Migrator::migrate_all`].
    pub workers: usize,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            retries: 0,
            retry_backoff: Duration::from_millis(500),
            workers: crate::config::DEFAULT_WORKERS,
        }
    }
}

/// Rewrites archives from `source` into `target`, pointing their storage
/// descriptor at `coordinates` while keeping each descriptor's key.
pub struct Migrator<S, T> {
    source: S,
    target: T,
    coordinates: BackendCoordinates,
    options: MigrateOptions,
}

impl<S: ObjectStore, T: ObjectStore> Migrator<S, T> {
    pub fn new(source: S, target: T, coordinates: BackendCoordinates) -> Self {
        Self { source, target, coordinates, options: MigrateOptions::default() }
    }

    pub fn with_options(mut self, options: MigrateOptions) -> Self {
        self.options = options;
        self
    }

    /// Migrate one archive key, rerunning the whole pipeline from `Idle` on
    /// transient failures up to `options.retries` times.
    pub fn migrate(&self, key: &str) -> Result<MigrationReport, MigrationFailure> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.run_once(key) {
                Ok(mut report) => {
                    report.attempts = attempt;
                    info!(
                        key,
                        delta = report.delta,
                        bytes = report.archive_len,
                        digest = %report.digest,
                        uploaded = report.uploaded,
                        "archive migrated"
                    );
                    return Ok(report);
                }
                Err(failure) if failure.error.is_retryable() && attempt <= self.options.retries => {
                    warn!(key, attempt, error = %failure.error, "transient failure, retrying");
                    std::thread::sleep(self.options.retry_backoff * attempt);
                }
                Err(mut failure) => {
                    failure.attempts = attempt;
                    error!(key, stage = %failure.stage, error = %failure.error, "migration failed");
                    return Err(failure);
                }
            }
        }
    }

    /// Migrate many keys, one pipeline per key on a pool of
    /// `options.workers` threads.  Results are in input order.
    #[cfg(feature = "parallel")]
    pub fn migrate_all(&self, keys: &[String]) -> Vec<Result<MigrationReport, MigrationFailure>> {
        use rayon::prelude::*;

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.max(1))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "cannot build worker pool, migrating sequentially");
                return keys.iter().map(|k| self.migrate(k)).collect();
            }
        };
        pool.install(|| keys.par_iter().map(|k| self.migrate(k)).collect())
    }

    #[cfg(not(feature = "parallel"))]
    pub fn migrate_all(&self, keys: &[String]) -> Vec<Result<MigrationReport, MigrationFailure>> {
        keys.iter().map(|k| self.migrate(k)).collect()
    }

    fn run_once(&self, key: &str) -> Result<MigrationReport, MigrationFailure> {
        let mut pipeline = Pipeline::new(key);
        match self.run_stages(&mut pipeline) {
            Ok(report) => Ok(report),
            Err(e) => Err(pipeline.fail(e)),
        }
    }

    fn run_stages(&self, p: &mut Pipeline<'_>) -> Result<MigrationReport, MigrateError> {
        let key = p.key;
        debug!(key, source = %self.source.describe(), target = %self.target.describe(), "starting migration");

        // An empty object has no satisfiable range; report it as a short header.
        let head = match self.source.get_range(key, 0, HEADER_SIZE as u64 - 1) {
            Err(StoreError::InvalidRange { .. }) => Vec::new(),
            other => other?,
        };
        let header = ArchiveHeader::from_bytes(&head)?;
        p.advance(MigrationState::HeaderFetched);

        let tag = header.storage_info_type.name();
        if !StorageInfo::is_supported(&tag) {
            return Err(MigrateError::UnsupportedBackend(tag));
        }
        let old = header.section(SectionKind::StorageInfo);
        check_section(SectionKind::StorageInfo, old, u64::MAX).map_err(|source| {
            SpliceError::InvalidTarget { section: SectionKind::StorageInfo.name(), source }
        })?;
        if old.is_empty() {
            return Err(MigrateError::Decode(DescriptorError::Decode(DecodeError::NoValue)));
        }
        let start = old.pos as u64;
        let end = start + old.len as u64 - 1;
        let section = self.source.get_range(key, start, end)?;
        if section.len() as u64 != old.len as u64 {
            return Err(SpliceError::RangeUnavailable { start, end }.into());
        }
        let source_info = StorageInfo::from_section(&header.storage_info_type, &section)?;
        debug!(key, descriptor = ?source_info, "source descriptor");
        p.advance(MigrationState::DescriptorFetched);

        let target_info = source_info.retarget(&self.coordinates);
        let new_section = target_info.to_section();
        p.advance(MigrationState::DescriptorRebuilt);

        let full = self.source.get_full(key)?;
        let current = ArchiveHeader::from_bytes(&full)?;
        if current != header {
            return Err(MigrateError::TransientIo(format!(
                "source archive {key} changed between reads"
            )));
        }
        let spliced = splice_section(&full, &header, SectionKind::StorageInfo, &new_section)?;

        let check = read_archive_info(&spliced.bytes)?;
        if check.storage_info.key() != source_info.key() {
            return Err(SpliceError::KeyChanged {
                expected: source_info.key().to_owned(),
                found: check.storage_info.key().to_owned(),
            }
            .into());
        }
        p.advance(MigrationState::Spliced);

        let digest = hex::encode(blake3::hash(&spliced.bytes).as_bytes());
        let uploaded = if self.options.dry_run {
            info!(key, bytes = spliced.bytes.len(), "dry run, skipping upload");
            false
        } else {
            self.target.put(key, &spliced.bytes)?;
            p.advance(MigrationState::Uploaded);
            p.advance(MigrationState::Done);
            true
        };

        Ok(MigrationReport {
            key: key.to_owned(),
            source_info,
            target_info,
            old_section_len: old.len,
            new_section_len: spliced.header.storage_info_length,
            delta: spliced.delta,
            archive_len: spliced.bytes.len() as u64,
            digest,
            uploaded,
            attempts: 1,
            trace: p.trace.clone(),
        })
    }
}
