//! Error handling
//!
//! Every store, ledger and service operation returns a typed [`CoreError`].
//! Display strings are the user-facing messages; callers pick a status or
//! exit code from [`CoreError::kind`].
//!
//! Ownership failures and true not-found share one variant, so a
//! caller can never learn that somebody else's private resource exists.

use std::fmt;
use std::io;
use std::path::PathBuf;

use rusqlite::{ffi, ErrorCode};
use thiserror::Error;

/// Which uniqueness rule a conflicting write ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Another resource already uses this link
    LinkTaken,
    /// The user already recommended this resource
    AlreadyRecommended,
    /// The owner already has a collection with this name
    CollectionExists,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConflictKind::LinkTaken => "A resource exists with provided link",
            ConflictKind::AlreadyRecommended => "You have recommended this resource",
            ConflictKind::CollectionExists => "A collection with this name already exists",
        };
        f.write_str(msg)
    }
}

/// Errors surfaced by the core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or missing input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// The resource does not exist, or the caller may not see or change it
    #[error("Either this resource does not exist or you cannot access it")]
    NotFoundOrForbidden,

    /// The resource does not exist (recommendations do not check ownership)
    #[error("Resource does not exist")]
    NotFound,

    /// A uniqueness constraint fired
    #[error("{0}")]
    Conflict(ConflictKind),

    /// A lock could not be acquired in time, or the call was interrupted.
    /// The open transaction, if any, has been rolled back.
    #[error("Operation timed out while {0}")]
    Timeout(String),

    /// Any other storage failure
    #[error("Something went wrong while {context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to prepare the data directory
    #[error("Failed to create data directory '{path}': {source}")]
    DataDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse error category, used by callers to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFoundOrForbidden,
    NotFound,
    Conflict,
    Timeout,
    Internal,
}

impl CoreError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    /// Wrap a storage error that the call site did not expect
    ///
    /// Busy, locked and interrupted results become [`CoreError::Timeout`];
    /// everything else is internal.
    pub fn storage(source: rusqlite::Error, context: impl Into<String>) -> Self {
        let context = context.into();
        match source.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy)
            | Some(ErrorCode::DatabaseLocked)
            | Some(ErrorCode::OperationInterrupted) => CoreError::Timeout(context),
            _ => CoreError::Internal { context, source },
        }
    }

    /// Get the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFoundOrForbidden => ErrorKind::NotFoundOrForbidden,
            CoreError::NotFound => ErrorKind::NotFound,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Timeout(_) => ErrorKind::Timeout,
            CoreError::Internal { .. } | CoreError::DataDirectory { .. } => ErrorKind::Internal,
        }
    }

    /// Whether the caller's retry policy may try again
    ///
    /// The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Timeout(_))
    }
}

/// Columns named by a UNIQUE or PRIMARY KEY violation, if `err` is one
///
/// SQLite reports them as `"UNIQUE constraint failed: table.col[, table.col]"`;
/// the returned string is the part after the colon.
pub fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            msg.split_once(": ").map(|(_, columns)| columns.trim())
        }
        _ => None,
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
