use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{clamp_range, ObjectStore, StoreError};

/// Process-local store.  Clones share the same objects.
///
/// Keys can be marked as failing to simulate backend outages; a failing key
/// answers every call with the configured error.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    name: String,
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failures: Arc<RwLock<HashMap<String, StoreError>>>,
    puts: Arc<RwLock<Vec<String>>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn insert(&self, key: impl Into<String>, data: Vec<u8>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(key.into(), data);
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys written through `put`, in call order.
    pub fn put_log(&self) -> Vec<String> {
        self.puts.read().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn fail_with(&self, key: impl Into<String>, err: StoreError) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(key.into(), err);
        }
    }

    pub fn clear_failure(&self, key: &str) {
        if let Ok(mut failures) = self.failures.write() {
            failures.remove(key);
        }
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        match self.failures.read().ok().and_then(|f| f.get(key).cloned()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn poisoned(key: &str) -> StoreError {
        StoreError::Backend { key: key.to_owned(), message: "store lock poisoned".into() }
    }
}

impl ObjectStore for MemoryStore {
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError> {
        self.check(key)?;
        let objects = self.objects.read().map_err(|_| Self::poisoned(key))?;
        let data = objects.get(key).ok_or_else(|| StoreError::NotFound { key: key.to_owned() })?;
        clamp_range(key, data, start, end)
    }

    fn get_full(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.check(key)?;
        let objects = self.objects.read().map_err(|_| Self::poisoned(key))?;
        objects.get(key).cloned().ok_or_else(|| StoreError::NotFound { key: key.to_owned() })
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.check(key)?;
        self.objects
            .write()
            .map_err(|_| Self::poisoned(key))?
            .insert(key.to_owned(), data.to_vec());
        self.puts.write().map_err(|_| Self::poisoned(key))?.push(key.to_owned());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.name)
    }
}
