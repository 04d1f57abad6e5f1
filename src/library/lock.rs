//! System-wide scan exclusion.
//!
//! A [`ScanLock`] is created once and cloned into everything that may start
//! a scan. Acquisition never waits: a second scan is refused with
//! [`Error::ScanInProgress`] rather than queued. The returned
//! [`ScanGuard`] releases on drop, including on panic or when the scan
//! future is dropped mid-flight.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};

/// Shared, non-blocking scan mutex.
#[derive(Debug, Clone, Default)]
pub struct ScanLock {
    inner: Arc<Mutex<()>>,
}

/// Proof of holding the scan lock.
#[derive(Debug)]
pub struct ScanGuard {
    _guard: OwnedMutexGuard<()>,
}

impl ScanLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock if nobody holds it.
    pub fn try_acquire(&self) -> Option<ScanGuard> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| ScanGuard { _guard: guard })
    }

    /// Take the lock or fail with [`Error::ScanInProgress`].
    pub fn acquire(&self) -> Result<ScanGuard> {
        self.try_acquire().ok_or(Error::ScanInProgress)
    }

    #[cfg(test)]
    fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
