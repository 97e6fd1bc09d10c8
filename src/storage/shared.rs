//! Shared storage handle
//!
//! Crawl tasks and the orchestrator all persist through one storage backend.
//! `SharedStorage` hands out cheap clones of a mutex-guarded backend; each call
//! holds the lock only for the duration of one closure and never across an
//! await point.

use crate::storage::traits::{Storage, StorageError, StorageResult};
use std::sync::{Arc, Mutex};

/// Cloneable, thread-safe handle to a storage backend
pub struct SharedStorage<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedStorage<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Storage> SharedStorage<S> {
    pub fn new(storage: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Runs `f` with exclusive access to the backend
    ///
    /// A poisoned lock is reported as `StorageError::LockPoisoned`.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> StorageResult<R>) -> StorageResult<R> {
        let mut guard = self.inner.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut guard)
    }
}
