//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while the
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors (e.g., [`EnrichmentError`]) for detailed handling
//! - [`ErrorKind`]: coarse classification the enrichment orchestrator uses
//!   to decide between retrying a batch and giving up
//!
//! [`EnrichmentError`]: crate::enrichment::EnrichmentError

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

// SQLite primary result codes (extended codes carry these in the low byte)
const SQLITE_PERM: i32 = 3;
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_READONLY: i32 = 8;
const SQLITE_AUTH: i32 = 23;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Tag reading error
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Enrichment/identification error
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] crate::enrichment::EnrichmentError),

    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage or media access was refused
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Input violated a catalog invariant (duplicate URI, bad row)
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// Another scan holds the scan lock
    #[error("A library scan is already in progress")]
    ScanInProgress,

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// How a caller should react to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Worth retrying later (busy database, I/O hiccup)
    Transient,
    /// Access refused; retrying will not help until the user acts
    PermissionDenied,
    /// Bad data; skip the offending record
    DataIntegrity,
    /// Anything else
    Permanent,
}

impl Error {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a permission error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Create a data integrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error. Context wrappers are looked through.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WithContext { source, .. } => source.kind(),
            Self::Io(e) => io_kind(e),
            Self::Database(e) => database_kind(e),
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::DataIntegrity(_) => ErrorKind::DataIntegrity,
            Self::Enrichment(e) if e.is_unauthorized() => ErrorKind::PermissionDenied,
            Self::Enrichment(e) if e.is_transient() => ErrorKind::Transient,
            Self::ScanInProgress => ErrorKind::Transient,
            Self::Metadata { .. } | Self::NotFound(_) | Self::Config(_) | Self::Enrichment(_) => {
                ErrorKind::Permanent
            }
        }
    }

    /// Shorthand for `kind() == ErrorKind::Transient`.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

fn io_kind(e: &std::io::Error) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        std::io::ErrorKind::NotFound => ErrorKind::Permanent,
        _ => ErrorKind::Transient,
    }
}

fn database_kind(e: &sqlx::Error) -> ErrorKind {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            ErrorKind::Transient
        }
        sqlx::Error::Io(io) => io_kind(io),
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() || db.is_foreign_key_violation() {
                return ErrorKind::DataIntegrity;
            }
            let primary = db
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| c & 0xff);
            match primary {
                Some(SQLITE_BUSY | SQLITE_LOCKED) => ErrorKind::Transient,
                Some(SQLITE_PERM | SQLITE_READONLY | SQLITE_AUTH) => ErrorKind::PermissionDenied,
                _ => ErrorKind::Permanent,
            }
        }
        sqlx::Error::RowNotFound | sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            ErrorKind::DataIntegrity
        }
        _ => ErrorKind::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentError;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("/path/to/file.mp3");
        assert!(err.to_string().contains("/path/to/file.mp3"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::data_integrity("duplicate uri").context("while applying scan");
        let msg = err.to_string();
        assert!(msg.contains("while applying scan"));
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    }

    #[test]
    fn test_metadata_error() {
        let err = Error::metadata("/music/song.mp3", "unsupported format");
        let msg = err.to_string();
        assert!(msg.contains("song.mp3"));
        assert!(msg.contains("unsupported format"));
    }

    #[test]
    fn test_io_kinds() {
        let denied = Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(denied.kind(), ErrorKind::PermissionDenied);

        let interrupted = Error::Io(std::io::Error::from(std::io::ErrorKind::Interrupted));
        assert!(interrupted.is_transient());
    }

    #[test]
    fn test_database_kinds() {
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert_eq!(
            Error::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::DataIntegrity
        );
    }

    #[test]
    fn test_enrichment_kinds() {
        let unauthorized = Error::from(EnrichmentError::Unauthorized("bad token".into()));
        assert_eq!(unauthorized.kind(), ErrorKind::PermissionDenied);

        let network = Error::from(EnrichmentError::Network("reset".into()));
        assert!(network.is_transient());

        let parse = Error::from(EnrichmentError::Parse("bad json".into()));
        assert_eq!(parse.kind(), ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn test_unique_violation_is_integrity() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (k TEXT UNIQUE)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (k) VALUES ('a')")
            .execute(&pool)
            .await
            .unwrap();
        let err = sqlx::query("INSERT INTO t (k) VALUES ('a')")
            .execute(&pool)
            .await
            .unwrap_err();
        assert_eq!(Error::Database(err).kind(), ErrorKind::DataIntegrity);
    }
}
