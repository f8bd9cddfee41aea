//! Process-local mutual exclusion keyed by arbitrary strings.
//!
//! Collaborators that share knowledge of a key (see
//! [`searchform_core::keys::index_lock`]) serialize on it; different keys
//! never contend. Lock state for a key is created on first use and kept for
//! the life of the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::error::ProvisionerError;

#[derive(Debug, Default)]
pub struct KeyedMutex {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    acquire_timeout: Option<Duration>,
}

/// Proof of holding the lock for one key. The lock is released when the
/// guard is dropped, on every exit path.
///
/// Not reentrant: acquiring the same key again while holding this guard
/// waits on yourself.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyedMutex {
    /// `acquire_timeout` bounds how long [`KeyedMutex::acquire`] waits.
    /// `None` waits until the holder lets go, however long that takes.
    pub fn new(acquire_timeout: Option<Duration>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            acquire_timeout,
        }
    }

    /// Wait until no one else holds `key`, then hold it.
    pub async fn acquire(&self, key: &str) -> Result<KeyGuard, ProvisionerError> {
        let lock = self.get(key);
        tracing::trace!(key, "locking");

        let guard = match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| ProvisionerError::LockTimeout {
                    key: key.to_string(),
                    waited: limit,
                })?,
            None => lock.lock_owned().await,
        };

        tracing::trace!(key, "locked");
        Ok(KeyGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Returns the lock for `key`, no guarantee of its lock status.
    fn get(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        tracing::trace!(key = %self.key, "unlocking");
    }
}
