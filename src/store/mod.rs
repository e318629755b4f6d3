//! Object-storage collaborators.
//!
//! The rewriter needs exactly three operations from a backend: an inclusive
//! byte-range read, a full read, and an atomic whole-object write.  Any type
//! implementing [`ObjectStore`] qualifies.

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use thiserror::Error;

pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object {key:?} not found")]
    NotFound { key: String },
    #[error("access to {key:?} denied: {message}")]
    AccessDenied { key: String, message: String },
    #[error("transient failure on {key:?}: {message}")]
    Transient { key: String, message: String },
    #[error("range {start}-{end} not satisfiable for {key:?}")]
    InvalidRange { key: String, start: u64, end: u64 },
    #[error("backend error on {key:?}: {message}")]
    Backend { key: String, message: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}

pub trait ObjectStore: Send + Sync {
    /// Bytes `start..=end` of `key`.  A range running past the end of the
    /// object is clamped; one starting past the end is `InvalidRange`.
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError>;

    fn get_full(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace `key` with `data` as a single object write.  Readers observe
    /// either the previous object or the complete new one.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

impl<S: ObjectStore + ?Sized> ObjectStore for Box<S> {
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError> {
        (**self).get_range(key, start, end)
    }
    fn get_full(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get_full(key)
    }
    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, data)
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Slice an in-memory object with `ObjectStore::get_range` semantics.
pub(crate) fn clamp_range(key: &str, data: &[u8], start: u64, end: u64) -> Result<Vec<u8>, StoreError> {
    let len = data.len() as u64;
    if start > end || start >= len {
        return Err(StoreError::InvalidRange { key: key.to_owned(), start, end });
    }
    let stop = end.saturating_add(1).min(len);
    Ok(data[start as usize..stop as usize].to_vec())
}
