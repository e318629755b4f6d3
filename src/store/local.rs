use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use super::{ObjectStore, StoreError};

/// Directory-backed store: object `key` lives at `<root>/<key>`.
///
/// Writes go to a temporary file in the destination directory and are
/// renamed into place, so a reader never sees a partially written object.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_owned() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let clean = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StoreError::Backend {
                key: key.to_owned(),
                message: "key must be a relative path without '..' segments".into(),
            });
        }
        Ok(self.root.join(rel))
    }
}

fn map_io(key: &str, err: io::Error) -> StoreError {
    let key = key.to_owned();
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound { key },
        io::ErrorKind::PermissionDenied => StoreError::AccessDenied { key, message: err.to_string() },
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            StoreError::Transient { key, message: err.to_string() }
        }
        _ => StoreError::Backend { key, message: err.to_string() },
    }
}

impl ObjectStore for LocalStore {
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        let mut file = File::open(&path).map_err(|e| map_io(key, e))?;
        let len = file.metadata().map_err(|e| map_io(key, e))?.len();
        if start > end || start >= len {
            return Err(StoreError::InvalidRange { key: key.to_owned(), start, end });
        }
        let stop = end.saturating_add(1).min(len);
        file.seek(SeekFrom::Start(start)).map_err(|e| map_io(key, e))?;
        let mut buf = vec![0u8; (stop - start) as usize];
        file.read_exact(&mut buf).map_err(|e| map_io(key, e))?;
        Ok(buf)
    }

    fn get_full(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        fs::read(path).map_err(|e| map_io(key, e))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| map_io(key, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| map_io(key, e))?;
        tmp.write_all(data).map_err(|e| map_io(key, e))?;
        tmp.as_file().sync_all().map_err(|e| map_io(key, e))?;
        tmp.persist(&path).map_err(|e| map_io(key, e.error))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
