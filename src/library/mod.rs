//! Keeping the catalog in step with the files on disk.
//!
//! [`reconcile`] computes a [`ReconcilePlan`] without touching storage;
//! [`CatalogSync`] normalizes and applies it under the [`ScanLock`].

pub mod diff;
pub mod lock;
pub mod sync;

pub use diff::{ReconcilePlan, reconcile};
pub use lock::{ScanGuard, ScanLock};
pub use sync::{CatalogSync, ScanReport};
